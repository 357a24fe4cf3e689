//! Tinder export decoder
//!
//! Tinder exports carry a `User` section with the demographic snapshot, a
//! `Usage` section of parallel per-day count maps, and a `Messages` section
//! nesting messages under their match. Section and field names have drifted
//! between snake_case and camelCase across export versions; both spellings
//! decode.

use super::shapes::*;
use super::{
    CanonicalDemographics, CanonicalExport, CanonicalMatch, CanonicalMessage, CanonicalUsage,
    MessageDirection,
};
use crate::IngestResult;
use serde_json::{Map, Value};

const KNOWN_SECTIONS: &[&str] = &["User", "user", "Usage", "usage", "Messages", "messages"];

const KNOWN_USER_FIELDS: &[&str] = &[
    "birth_date",
    "birthDate",
    "gender",
    "gender_filter",
    "genderFilter",
    "interested_in",
    "interestedIn",
    "age_filter_min",
    "ageFilterMin",
    "age_filter_max",
    "ageFilterMax",
    "bio",
    "education",
    "city",
    "region",
    "country",
    "instagram",
    "jobs",
    "schools",
    "interests",
    "pos",
    "position",
];

/// Decode a Tinder export document
pub fn decode(root: &Map<String, Value>) -> IngestResult<CanonicalExport> {
    let user = as_object(require(root, &["User", "user"], "User")?, "User")?;

    let demographics = decode_user(user)?;
    let usage = decode_usage(root)?;
    let matches = decode_messages(root)?;

    // Preserve unrecognized top-level sections, and unrecognized fields of
    // the User object under a synthetic key
    let mut extra = collect_unknown(root, KNOWN_SECTIONS);
    let user_unknown = collect_unknown(user, KNOWN_USER_FIELDS);
    if !user_unknown.is_empty() {
        extra.insert("User._unrecognized".to_string(), Value::Object(user_unknown));
    }

    Ok(CanonicalExport {
        demographics,
        usage,
        matches,
        extra,
    })
}

fn decode_user(user: &Map<String, Value>) -> IngestResult<CanonicalDemographics> {
    let birth_date = parse_date(
        require(user, &["birth_date", "birthDate"], "User.birth_date")?,
        "User.birth_date",
    )?;
    let gender = decode_gender(require(user, &["gender"], "User.gender")?, "User.gender")?;
    let gender_filter = decode_gender(
        require(user, &["gender_filter", "genderFilter"], "User.gender_filter")?,
        "User.gender_filter",
    )?;
    let interested_in = decode_gender(
        require(user, &["interested_in", "interestedIn"], "User.interested_in")?,
        "User.interested_in",
    )?;
    let age_filter_min = as_count(
        require(user, &["age_filter_min", "ageFilterMin"], "User.age_filter_min")?,
        "User.age_filter_min",
    )?;
    let age_filter_max = as_count(
        require(user, &["age_filter_max", "ageFilterMax"], "User.age_filter_max")?,
        "User.age_filter_max",
    )?;

    let bio = match get_any(user, &["bio"]) {
        Some(v) => as_string(v, "User.bio").unwrap_or_default(),
        None => String::new(),
    };
    let education = match get_any(user, &["education"]) {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };

    let city = match get_any(user, &["city"]) {
        Some(v) => decode_place(v, "User.city")?,
        None => None,
    };
    let region = match get_any(user, &["region"]) {
        Some(v) => decode_place(v, "User.region")?,
        None => None,
    };
    let country = match get_any(user, &["country"]) {
        Some(v) => decode_place(v, "User.country")?,
        None => None,
    };

    // Instagram appears as a bare username or as an object around it
    let instagram = match get_any(user, &["instagram"]) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Object(obj)) => obj
            .get("username")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    };

    let jobs = match get_any(user, &["jobs"]) {
        Some(v) => decode_name_list(v, "User.jobs")?,
        None => Vec::new(),
    };
    let schools = match get_any(user, &["schools"]) {
        Some(v) => decode_name_list(v, "User.schools")?,
        None => Vec::new(),
    };
    let interests = match get_any(user, &["interests"]) {
        Some(v) => decode_name_list(v, "User.interests")?,
        None => Vec::new(),
    };

    let position = decode_position(user)?;

    Ok(CanonicalDemographics {
        birth_date,
        gender,
        gender_filter,
        interested_in,
        age_filter_min,
        age_filter_max,
        bio,
        education,
        city,
        region,
        country,
        instagram,
        jobs,
        schools,
        interests,
        position,
    })
}

/// Missing position defaults to (0, 0)
fn decode_position(user: &Map<String, Value>) -> IngestResult<(f64, f64)> {
    let pos = match get_any(user, &["pos", "position"]) {
        Some(Value::Object(obj)) => obj,
        _ => return Ok((0.0, 0.0)),
    };
    let lat = get_any(pos, &["lat", "latitude"])
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let lon = get_any(pos, &["lon", "lng", "longitude"])
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    Ok((lat, lon))
}

/// The Usage section is optional; a missing map means no observed days, not
/// an error
fn decode_usage(root: &Map<String, Value>) -> IngestResult<CanonicalUsage> {
    let usage = match get_any(root, &["Usage", "usage"]) {
        Some(v) => as_object(v, "Usage")?,
        None => return Ok(CanonicalUsage::default()),
    };

    let map_for = |keys: &[&str], path: &str| -> IngestResult<_> {
        match get_any(usage, keys) {
            Some(v) => decode_count_map(v, path),
            None => Ok(Default::default()),
        }
    };

    Ok(CanonicalUsage {
        app_opens: map_for(&["app_opens", "appOpens"], "Usage.app_opens")?,
        swipe_likes: map_for(&["swipes_likes", "swipe_likes", "swipeLikes"], "Usage.swipes_likes")?,
        swipe_passes: map_for(
            &["swipes_passes", "swipe_passes", "swipePasses"],
            "Usage.swipes_passes",
        )?,
        super_likes: map_for(&["superlikes", "super_likes", "superLikes"], "Usage.superlikes")?,
        matches: map_for(&["matches"], "Usage.matches")?,
        messages_sent: map_for(&["messages_sent", "messagesSent"], "Usage.messages_sent")?,
        messages_received: map_for(
            &["messages_received", "messagesReceived"],
            "Usage.messages_received",
        )?,
    })
}

fn decode_messages(root: &Map<String, Value>) -> IngestResult<Vec<CanonicalMatch>> {
    let section = match get_any(root, &["Messages", "messages"]) {
        Some(v) => v,
        None => return Ok(Vec::new()),
    };
    let entries = section
        .as_array()
        .ok_or_else(|| crate::IngestError::schema("Messages", "expected a list"))?;

    let mut matches = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let path = format!("Messages[{}]", i);
        let obj = as_object(entry, &path)?;

        let match_id = as_string(
            require(obj, &["match_id", "matchId", "id"], &format!("{}.match_id", path))?,
            &format!("{}.match_id", path),
        )?;

        let matched_at = match get_any(obj, &["matched_at", "matchedAt", "created_date"]) {
            Some(v) => Some(parse_timestamp(v, &format!("{}.matched_at", path))?),
            None => None,
        };

        let messages = decode_message_list(obj, &path)?;

        matches.push(CanonicalMatch {
            match_id,
            matched_at,
            messages,
        });
    }
    Ok(matches)
}

fn decode_message_list(
    match_obj: &Map<String, Value>,
    match_path: &str,
) -> IngestResult<Vec<CanonicalMessage>> {
    let list = match get_any(match_obj, &["messages"]) {
        Some(v) => v
            .as_array()
            .ok_or_else(|| crate::IngestError::schema(format!("{}.messages", match_path), "expected a list"))?,
        None => return Ok(Vec::new()),
    };

    let mut messages = Vec::with_capacity(list.len());
    for (i, entry) in list.iter().enumerate() {
        let path = format!("{}.messages[{}]", match_path, i);
        let obj = as_object(entry, &path)?;

        let sent_at = parse_timestamp(
            require(obj, &["sent_date", "sentDate", "timestamp"], &format!("{}.sent_date", path))?,
            &format!("{}.sent_date", path),
        )?;

        let content = match get_any(obj, &["message", "body", "content"]) {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };

        let raw_type = get_any(obj, &["type", "message_type"])
            .and_then(Value::as_str)
            .map(str::to_string);

        messages.push(CanonicalMessage {
            sent_at,
            direction: decode_direction(obj),
            raw_type,
            content,
        });
    }
    Ok(messages)
}

/// Direction from the message's own fields. An explicit `direction` wins;
/// otherwise a `from` of "you"/"me" marks an outbound message. Tinder only
/// exports the user's own side, so the default is Sent.
fn decode_direction(obj: &Map<String, Value>) -> MessageDirection {
    if let Some(direction) = get_any(obj, &["direction"]).and_then(Value::as_str) {
        if direction.eq_ignore_ascii_case("received") {
            return MessageDirection::Received;
        }
        return MessageDirection::Sent;
    }
    if let Some(from) = get_any(obj, &["from"]).and_then(Value::as_str) {
        if from.eq_ignore_ascii_case("you") || from.eq_ignore_ascii_case("me") {
            return MessageDirection::Sent;
        }
        return MessageDirection::Received;
    }
    MessageDirection::Sent
}

#[cfg(test)]
mod tests {
    use super::super::{normalize, Platform};
    use crate::IngestError;
    use serde_json::json;

    fn minimal_user() -> serde_json::Value {
        json!({
            "birth_date": "1995-03-14T00:00:00.000Z",
            "gender": "M",
            "gender_filter": "F",
            "interested_in": "F",
            "age_filter_min": 20,
            "age_filter_max": 35
        })
    }

    #[test]
    fn minimal_export_decodes_with_defaults() {
        let doc = json!({ "User": minimal_user() });
        let export = normalize(Platform::Tinder, &doc).unwrap();

        assert_eq!(export.demographics.gender, "M");
        assert_eq!(export.demographics.education, "");
        assert_eq!(export.demographics.position, (0.0, 0.0));
        assert!(export.usage.app_opens.is_empty());
        assert!(export.matches.is_empty());
    }

    #[test]
    fn missing_required_field_names_its_path() {
        let mut user = minimal_user();
        user.as_object_mut().unwrap().remove("age_filter_max");
        let doc = json!({ "User": user });

        let err = normalize(Platform::Tinder, &doc).unwrap_err();
        match err {
            IngestError::SchemaValidation { path, .. } => {
                assert_eq!(path, "User.age_filter_max");
            }
            other => panic!("expected SchemaValidation, got {:?}", other),
        }
    }

    #[test]
    fn numeric_gender_codes_decode() {
        let mut user = minimal_user();
        user["gender"] = json!(1);
        user["gender_filter"] = json!(0);
        let doc = json!({ "User": user });

        let export = normalize(Platform::Tinder, &doc).unwrap();
        assert_eq!(export.demographics.gender, "F");
        assert_eq!(export.demographics.gender_filter, "M");
    }

    #[test]
    fn unknown_sections_and_fields_are_preserved_opaquely() {
        let mut user = minimal_user();
        user["loop_videos"] = json!([{"url": "https://example.com/a.mp4"}]);
        let doc = json!({
            "User": user,
            "StudentVerifications": {"status": "none"}
        });

        let export = normalize(Platform::Tinder, &doc).unwrap();
        assert!(export.extra.contains_key("StudentVerifications"));
        let user_extra = export.extra["User._unrecognized"].as_object().unwrap();
        assert!(user_extra.contains_key("loop_videos"));
    }

    #[test]
    fn usage_and_messages_decode() {
        let doc = json!({
            "User": minimal_user(),
            "Usage": {
                "app_opens": {"2024-01-01": 5},
                "swipes_likes": {"2024-01-01": 10},
                "swipes_passes": {"2024-01-01": 30}
            },
            "Messages": [
                {
                    "match_id": "Match 1",
                    "messages": [
                        {"sent_date": "2024-01-01 10:00:00 UTC", "message": "hi", "type": "text"},
                        {"sent_date": "2024-01-01 10:05:00 UTC", "message": "gif!", "type": "gif", "direction": "received"}
                    ]
                }
            ]
        });

        let export = normalize(Platform::Tinder, &doc).unwrap();
        assert_eq!(export.usage.app_opens.len(), 1);
        assert_eq!(export.matches.len(), 1);
        assert_eq!(export.matches[0].messages.len(), 2);
        assert_eq!(
            export.matches[0].messages[1].direction,
            super::MessageDirection::Received
        );
    }

    #[test]
    fn camel_case_export_version_decodes() {
        let doc = json!({
            "User": {
                "birthDate": "1993-06-02",
                "gender": "F",
                "genderFilter": "M",
                "interestedIn": "M",
                "ageFilterMin": 25,
                "ageFilterMax": 40,
                "schools": [{"name": "MIT", "displayed": true}]
            },
            "Usage": { "appOpens": {"2023-05-05": 2} }
        });

        let export = normalize(Platform::Tinder, &doc).unwrap();
        assert_eq!(export.demographics.age_filter_min, 25);
        assert_eq!(export.demographics.schools, vec!["MIT"]);
        assert_eq!(export.usage.app_opens.len(), 1);
    }
}
