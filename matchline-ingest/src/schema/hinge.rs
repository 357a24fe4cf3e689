//! Hinge export decoder
//!
//! Hinge exports put the demographic snapshot under `account`, activity
//! counters under `activity`, and conversations under `matches` with their
//! messages in a `chats` list. Age filter bounds have appeared both flat
//! (`age_filter_min`/`age_filter_max`) and nested (`age_filter: {min, max}`);
//! both shapes decode.

use super::shapes::*;
use super::{
    CanonicalDemographics, CanonicalExport, CanonicalMatch, CanonicalMessage, CanonicalUsage,
    MessageDirection,
};
use crate::{IngestError, IngestResult};
use serde_json::{Map, Value};

const KNOWN_SECTIONS: &[&str] = &["account", "profile", "activity", "matches"];

const KNOWN_ACCOUNT_FIELDS: &[&str] = &[
    "birth_date",
    "dob",
    "gender",
    "gender_preference",
    "gender_filter",
    "interested_in",
    "age_filter",
    "age_filter_min",
    "age_filter_max",
    "bio",
    "vitals",
    "education",
    "city",
    "region",
    "country",
    "instagram",
    "jobs",
    "job_title",
    "schools",
    "interests",
    "location",
];

/// Decode a Hinge export document
pub fn decode(root: &Map<String, Value>) -> IngestResult<CanonicalExport> {
    let account = as_object(require(root, &["account", "profile"], "account")?, "account")?;

    let demographics = decode_account(account)?;
    let usage = decode_activity(root)?;
    let matches = decode_matches(root)?;

    let mut extra = collect_unknown(root, KNOWN_SECTIONS);
    let account_unknown = collect_unknown(account, KNOWN_ACCOUNT_FIELDS);
    if !account_unknown.is_empty() {
        extra.insert(
            "account._unrecognized".to_string(),
            Value::Object(account_unknown),
        );
    }

    Ok(CanonicalExport {
        demographics,
        usage,
        matches,
        extra,
    })
}

fn decode_account(account: &Map<String, Value>) -> IngestResult<CanonicalDemographics> {
    let birth_date = parse_date(
        require(account, &["birth_date", "dob"], "account.birth_date")?,
        "account.birth_date",
    )?;
    let gender = decode_gender(require(account, &["gender"], "account.gender")?, "account.gender")?;
    let gender_filter = decode_gender(
        require(
            account,
            &["gender_preference", "gender_filter"],
            "account.gender_preference",
        )?,
        "account.gender_preference",
    )?;
    let interested_in = decode_gender(
        require(
            account,
            &["interested_in", "gender_preference"],
            "account.interested_in",
        )?,
        "account.interested_in",
    )?;

    let (age_filter_min, age_filter_max) = decode_age_filter(account)?;

    let bio = get_any(account, &["bio", "vitals"])
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let education = get_any(account, &["education"])
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let city = match get_any(account, &["city"]) {
        Some(v) => decode_place(v, "account.city")?,
        None => None,
    };
    let region = match get_any(account, &["region"]) {
        Some(v) => decode_place(v, "account.region")?,
        None => None,
    };
    let country = match get_any(account, &["country"]) {
        Some(v) => decode_place(v, "account.country")?,
        None => None,
    };

    let jobs = match get_any(account, &["jobs", "job_title"]) {
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        Some(v @ Value::Array(_)) => decode_name_list(v, "account.jobs")?,
        _ => Vec::new(),
    };
    let schools = match get_any(account, &["schools"]) {
        Some(v) => decode_name_list(v, "account.schools")?,
        None => Vec::new(),
    };
    let interests = match get_any(account, &["interests"]) {
        Some(v) => decode_name_list(v, "account.interests")?,
        None => Vec::new(),
    };

    let position = match get_any(account, &["location"]) {
        Some(Value::Object(obj)) => (
            get_any(obj, &["latitude", "lat"]).and_then(Value::as_f64).unwrap_or(0.0),
            get_any(obj, &["longitude", "lon"]).and_then(Value::as_f64).unwrap_or(0.0),
        ),
        _ => (0.0, 0.0),
    };

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
        instagram: None,
        jobs,
        schools,
        interests,
        position,
    })
}

/// Flat bounds or a nested `age_filter: {min, max}` object, by structure
fn decode_age_filter(account: &Map<String, Value>) -> IngestResult<(i64, i64)> {
    if let Some(Value::Object(filter)) = get_any(account, &["age_filter"]) {
        let min = as_count(
            require(filter, &["min"], "account.age_filter.min")?,
            "account.age_filter.min",
        )?;
        let max = as_count(
            require(filter, &["max"], "account.age_filter.max")?,
            "account.age_filter.max",
        )?;
        return Ok((min, max));
    }
    let min = as_count(
        require(account, &["age_filter_min"], "account.age_filter_min")?,
        "account.age_filter_min",
    )?;
    let max = as_count(
        require(account, &["age_filter_max"], "account.age_filter_max")?,
        "account.age_filter_max",
    )?;
    Ok((min, max))
}

fn decode_activity(root: &Map<String, Value>) -> IngestResult<CanonicalUsage> {
    let activity = match get_any(root, &["activity"]) {
        Some(v) => as_object(v, "activity")?,
        None => return Ok(CanonicalUsage::default()),
    };

    let map_for = |keys: &[&str], path: &str| -> IngestResult<_> {
        match get_any(activity, keys) {
            Some(v) => decode_count_map(v, path),
            None => Ok(Default::default()),
        }
    };

    Ok(CanonicalUsage {
        app_opens: map_for(&["app_opens", "sessions"], "activity.app_opens")?,
        swipe_likes: map_for(&["likes_sent", "likes"], "activity.likes_sent")?,
        swipe_passes: map_for(&["passes", "skips"], "activity.passes")?,
        super_likes: map_for(&["roses_sent", "roses"], "activity.roses_sent")?,
        matches: map_for(&["matches"], "activity.matches")?,
        messages_sent: map_for(&["messages_sent"], "activity.messages_sent")?,
        messages_received: map_for(&["messages_received"], "activity.messages_received")?,
    })
}

fn decode_matches(root: &Map<String, Value>) -> IngestResult<Vec<CanonicalMatch>> {
    let entries = match get_any(root, &["matches"]) {
        Some(v) => v
            .as_array()
            .ok_or_else(|| IngestError::schema("matches", "expected a list"))?,
        None => return Ok(Vec::new()),
    };

    let mut matches = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let path = format!("matches[{}]", i);
        let obj = as_object(entry, &path)?;

        let match_id = as_string(
            require(obj, &["match_id", "id"], &format!("{}.match_id", path))?,
            &format!("{}.match_id", path),
        )?;
        let matched_at = match get_any(obj, &["matched_at", "timestamp"]) {
            Some(v) => Some(parse_timestamp(v, &format!("{}.matched_at", path))?),
            None => None,
        };

        let mut messages = Vec::new();
        if let Some(chats) = get_any(obj, &["chats", "messages"]) {
            let list = chats
                .as_array()
                .ok_or_else(|| IngestError::schema(format!("{}.chats", path), "expected a list"))?;
            for (j, chat) in list.iter().enumerate() {
                let msg_path = format!("{}.chats[{}]", path, j);
                let chat_obj = as_object(chat, &msg_path)?;
                let sent_at = parse_timestamp(
                    require(chat_obj, &["timestamp", "sent_at"], &format!("{}.timestamp", msg_path))?,
                    &format!("{}.timestamp", msg_path),
                )?;
                let content = get_any(chat_obj, &["body", "message"])
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let raw_type = get_any(chat_obj, &["type"])
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let direction = match get_any(chat_obj, &["direction"]).and_then(Value::as_str) {
                    Some(d) if d.eq_ignore_ascii_case("received") => MessageDirection::Received,
                    _ => MessageDirection::Sent,
                };
                messages.push(CanonicalMessage {
                    sent_at,
                    direction,
                    raw_type,
                    content,
                });
            }
        }

        matches.push(CanonicalMatch {
            match_id,
            matched_at,
            messages,
        });
    }
    Ok(matches)
}
