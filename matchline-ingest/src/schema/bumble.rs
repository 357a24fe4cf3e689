//! Bumble export decoder
//!
//! Bumble exports carry a `user` section and a `daily_activity` section
//! that has shipped in two shapes: parallel per-metric count maps (like
//! Tinder's Usage), or a single map of date to an object of that day's
//! counters. The shape is detected by inspecting the first value, not by a
//! version field. Conversations live under `connections`.

use super::shapes::*;
use super::{
    CanonicalDemographics, CanonicalExport, CanonicalMatch, CanonicalMessage, CanonicalUsage,
    MessageDirection,
};
use crate::{IngestError, IngestResult};
use serde_json::{Map, Value};

const KNOWN_SECTIONS: &[&str] = &["user", "daily_activity", "connections"];

const KNOWN_USER_FIELDS: &[&str] = &[
    "birth_date",
    "date_of_birth",
    "gender",
    "gender_filter",
    "looking_for",
    "interested_in",
    "age_filter_min",
    "age_filter_max",
    "bio",
    "about_me",
    "education",
    "city",
    "region",
    "country",
    "instagram",
    "jobs",
    "work",
    "schools",
    "interests",
    "badges",
    "location",
];

/// Decode a Bumble export document
pub fn decode(root: &Map<String, Value>) -> IngestResult<CanonicalExport> {
    let user = as_object(require(root, &["user"], "user")?, "user")?;

    let demographics = decode_user(user)?;
    let usage = decode_daily_activity(root)?;
    let matches = decode_connections(root)?;

    let mut extra = collect_unknown(root, KNOWN_SECTIONS);
    let user_unknown = collect_unknown(user, KNOWN_USER_FIELDS);
    if !user_unknown.is_empty() {
        extra.insert("user._unrecognized".to_string(), Value::Object(user_unknown));
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
        require(user, &["birth_date", "date_of_birth"], "user.birth_date")?,
        "user.birth_date",
    )?;
    let gender = decode_gender(require(user, &["gender"], "user.gender")?, "user.gender")?;
    let gender_filter = decode_gender(
        require(user, &["gender_filter", "looking_for"], "user.gender_filter")?,
        "user.gender_filter",
    )?;
    let interested_in = decode_gender(
        require(user, &["interested_in", "looking_for"], "user.interested_in")?,
        "user.interested_in",
    )?;
    let age_filter_min = as_count(
        require(user, &["age_filter_min"], "user.age_filter_min")?,
        "user.age_filter_min",
    )?;
    let age_filter_max = as_count(
        require(user, &["age_filter_max"], "user.age_filter_max")?,
        "user.age_filter_max",
    )?;

    let bio = get_any(user, &["bio", "about_me"])
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let education = get_any(user, &["education"])
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let city = match get_any(user, &["city"]) {
        Some(v) => decode_place(v, "user.city")?,
        None => None,
    };
    let region = match get_any(user, &["region"]) {
        Some(v) => decode_place(v, "user.region")?,
        None => None,
    };
    let country = match get_any(user, &["country"]) {
        Some(v) => decode_place(v, "user.country")?,
        None => None,
    };

    let jobs = match get_any(user, &["jobs", "work"]) {
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        Some(v @ Value::Array(_)) => decode_name_list(v, "user.jobs")?,
        _ => Vec::new(),
    };
    let schools = match get_any(user, &["schools"]) {
        Some(v) => decode_name_list(v, "user.schools")?,
        None => Vec::new(),
    };
    let interests = match get_any(user, &["interests", "badges"]) {
        Some(v) => decode_name_list(v, "user.interests")?,
        None => Vec::new(),
    };

    let position = match get_any(user, &["location"]) {
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

/// Detect which daily_activity shape is present by structural inspection of
/// the first value: an object whose own values are numbers means
/// date-to-counters; an object whose values are objects means per-metric
/// maps.
fn decode_daily_activity(root: &Map<String, Value>) -> IngestResult<CanonicalUsage> {
    let activity = match get_any(root, &["daily_activity"]) {
        Some(v) => as_object(v, "daily_activity")?,
        None => return Ok(CanonicalUsage::default()),
    };

    let values_are_day_objects = activity
        .values()
        .next()
        .and_then(Value::as_object)
        .is_some_and(|o| o.values().all(Value::is_number));
    let keys_are_dates = activity
        .keys()
        .next()
        .map(|k| k.parse::<chrono::NaiveDate>().is_ok())
        .unwrap_or(false);

    if keys_are_dates && values_are_day_objects {
        decode_per_date_objects(activity)
    } else {
        decode_parallel_maps(activity)
    }
}

/// Newer shape: `{"2024-01-01": {"app_opens": 3, "likes": 10, ...}, ...}`
fn decode_per_date_objects(activity: &Map<String, Value>) -> IngestResult<CanonicalUsage> {
    let mut usage = CanonicalUsage::default();
    for (key, value) in activity {
        let path = format!("daily_activity.{}", key);
        let date = key
            .parse::<chrono::NaiveDate>()
            .map_err(|_| IngestError::schema(&path, "key is not a YYYY-MM-DD date"))?;
        let day = as_object(value, &path)?;

        let count_for = |keys: &[&str]| -> IngestResult<i64> {
            match get_any(day, keys) {
                Some(v) => as_count(v, &path),
                None => Ok(0),
            }
        };

        let app_opens = count_for(&["app_opens", "sessions"])?;
        let likes = count_for(&["likes", "swipes_right"])?;
        let passes = count_for(&["passes", "swipes_left"])?;
        let super_likes = count_for(&["superswipes", "super_likes"])?;
        let matches = count_for(&["matches"])?;
        let sent = count_for(&["messages_sent"])?;
        let received = count_for(&["messages_received"])?;

        if app_opens > 0 {
            usage.app_opens.insert(date, app_opens);
        }
        if likes > 0 {
            usage.swipe_likes.insert(date, likes);
        }
        if passes > 0 {
            usage.swipe_passes.insert(date, passes);
        }
        if super_likes > 0 {
            usage.super_likes.insert(date, super_likes);
        }
        if matches > 0 {
            usage.matches.insert(date, matches);
        }
        if sent > 0 {
            usage.messages_sent.insert(date, sent);
        }
        if received > 0 {
            usage.messages_received.insert(date, received);
        }
    }
    Ok(usage)
}

/// Older shape: parallel per-metric `{date -> count}` maps
fn decode_parallel_maps(activity: &Map<String, Value>) -> IngestResult<CanonicalUsage> {
    let map_for = |keys: &[&str], path: &str| -> IngestResult<_> {
        match get_any(activity, keys) {
            Some(v) => decode_count_map(v, path),
            None => Ok(Default::default()),
        }
    };

    Ok(CanonicalUsage {
        app_opens: map_for(&["app_opens", "sessions"], "daily_activity.app_opens")?,
        swipe_likes: map_for(&["likes", "swipes_right"], "daily_activity.likes")?,
        swipe_passes: map_for(&["passes", "swipes_left"], "daily_activity.passes")?,
        super_likes: map_for(&["superswipes", "super_likes"], "daily_activity.superswipes")?,
        matches: map_for(&["matches"], "daily_activity.matches")?,
        messages_sent: map_for(&["messages_sent"], "daily_activity.messages_sent")?,
        messages_received: map_for(&["messages_received"], "daily_activity.messages_received")?,
    })
}

fn decode_connections(root: &Map<String, Value>) -> IngestResult<Vec<CanonicalMatch>> {
    let entries = match get_any(root, &["connections"]) {
        Some(v) => v
            .as_array()
            .ok_or_else(|| IngestError::schema("connections", "expected a list"))?,
        None => return Ok(Vec::new()),
    };

    let mut matches = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let path = format!("connections[{}]", i);
        let obj = as_object(entry, &path)?;

        let match_id = as_string(
            require(obj, &["connection_id", "match_id", "id"], &format!("{}.connection_id", path))?,
            &format!("{}.connection_id", path),
        )?;
        let matched_at = match get_any(obj, &["connected_at", "matched_at"]) {
            Some(v) => Some(parse_timestamp(v, &format!("{}.connected_at", path))?),
            None => None,
        };

        let mut messages = Vec::new();
        if let Some(list) = get_any(obj, &["messages", "chat"]) {
            let list = list
                .as_array()
                .ok_or_else(|| IngestError::schema(format!("{}.messages", path), "expected a list"))?;
            for (j, raw) in list.iter().enumerate() {
                let msg_path = format!("{}.messages[{}]", path, j);
                let msg = as_object(raw, &msg_path)?;
                let sent_at = parse_timestamp(
                    require(msg, &["sent_at", "timestamp"], &format!("{}.sent_at", msg_path))?,
                    &format!("{}.sent_at", msg_path),
                )?;
                let content = get_any(msg, &["text", "body", "message"])
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let raw_type = get_any(msg, &["type"]).and_then(Value::as_str).map(str::to_string);
                let direction = match get_any(msg, &["direction"]).and_then(Value::as_str) {
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
