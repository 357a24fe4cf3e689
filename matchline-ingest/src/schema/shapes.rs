//! Structural shape predicates for drift-tolerant decoding
//!
//! Platforms do not reliably supply a schema version, so fields that have
//! historically appeared in more than one shape are decoded by inspecting
//! the value's structure. Each decoder is an ordered set of predicates tried
//! in sequence, all producing the same canonical output type.

use crate::{IngestError, IngestResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Look a value up under the first key that is present.
///
/// Key aliases absorb snake_case/camelCase drift between export versions.
pub fn get_any<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

/// Required-field lookup; absence is a hard validation failure at `path`
pub fn require<'a>(
    obj: &'a Map<String, Value>,
    keys: &[&str],
    path: &str,
) -> IngestResult<&'a Value> {
    get_any(obj, keys).ok_or_else(|| IngestError::schema(path, "required field is missing"))
}

/// Decode a value that must be a JSON object
pub fn as_object<'a>(value: &'a Value, path: &str) -> IngestResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| IngestError::schema(path, "expected an object"))
}

/// Decode a string, tolerating nothing else
pub fn as_string(value: &Value, path: &str) -> IngestResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| IngestError::schema(path, "expected a string"))
}

/// Decode an integer count; older exports serialize counts as floats
pub fn as_count(value: &Value, path: &str) -> IngestResult<i64> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    if let Some(f) = value.as_f64() {
        return Ok(f.round() as i64);
    }
    Err(IngestError::schema(path, "expected a number"))
}

/// Parse a calendar date from `YYYY-MM-DD` or a full timestamp
pub fn parse_date(value: &Value, path: &str) -> IngestResult<NaiveDate> {
    let raw = value
        .as_str()
        .ok_or_else(|| IngestError::schema(path, "expected a date string"))?;

    // Bare date first, then the date prefix of a timestamp
    if let Ok(date) = raw.parse::<NaiveDate>() {
        return Ok(date);
    }
    if raw.len() >= 10 {
        if let Ok(date) = raw[..10].parse::<NaiveDate>() {
            return Ok(date);
        }
    }
    Err(IngestError::schema(
        path,
        format!("`{}` is not a recognizable date", raw),
    ))
}

/// Parse a timestamp; bare dates decode as midnight UTC
pub fn parse_timestamp(value: &Value, path: &str) -> IngestResult<DateTime<Utc>> {
    let raw = value
        .as_str()
        .ok_or_else(|| IngestError::schema(path, "expected a timestamp string"))?;

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    // Older exports: "2021-07-03 18:04:22 UTC" / "2021-07-03 18:04:22"
    let trimmed = raw.strip_suffix(" UTC").unwrap_or(raw);
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = raw.parse::<NaiveDate>() {
        return Ok(date.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc());
    }
    Err(IngestError::schema(
        path,
        format!("`{}` is not a recognizable timestamp", raw),
    ))
}

/// Decode a gender-like field, which appears either as a numeric code
/// (0 = male, 1 = female) or as a string label
pub fn decode_gender(value: &Value, path: &str) -> IngestResult<String> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok("M".to_string()),
            Some(1) => Ok("F".to_string()),
            Some(_) => Ok("OTHER".to_string()),
            None => Err(IngestError::schema(path, "gender code must be an integer")),
        },
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::String(_) => Err(IngestError::schema(path, "gender string is empty")),
        _ => Err(IngestError::schema(
            path,
            "expected a gender code or string",
        )),
    }
}

/// Decode a list that historically appears either as bare name strings or
/// as richer objects carrying the same name plus metadata.
///
/// Predicates, in order: string element; object with a `name` field; object
/// with a nested `title.name` (job shape). Elements matching none of these
/// fail with their index in the path.
pub fn decode_name_list(value: &Value, path: &str) -> IngestResult<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| IngestError::schema(path, "expected a list"))?;

    let mut names = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let element_path = format!("{}[{}]", path, i);
        let name = match item {
            Value::String(s) => s.clone(),
            Value::Object(obj) => {
                if let Some(name) = obj.get("name").and_then(Value::as_str) {
                    name.to_string()
                } else if let Some(name) = obj
                    .get("title")
                    .and_then(Value::as_object)
                    .and_then(|t| t.get("name"))
                    .and_then(Value::as_str)
                {
                    name.to_string()
                } else {
                    return Err(IngestError::schema(
                        element_path,
                        "object carries no recognizable name",
                    ));
                }
            }
            _ => {
                return Err(IngestError::schema(
                    element_path,
                    "expected a name string or object",
                ))
            }
        };
        if !name.is_empty() {
            names.push(name);
        }
    }
    Ok(names)
}

/// Decode a place that appears either as a bare string or as an object with
/// a `name` field
pub fn decode_place(value: &Value, path: &str) -> IngestResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Object(obj) => Ok(obj
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)),
        _ => Err(IngestError::schema(path, "expected a place string or object")),
    }
}

/// Decode a `{date -> count}` map. Unparseable date keys fail with the key
/// in the path; counts tolerate float serialization.
pub fn decode_count_map(value: &Value, path: &str) -> IngestResult<BTreeMap<NaiveDate, i64>> {
    let obj = value
        .as_object()
        .ok_or_else(|| IngestError::schema(path, "expected a date-keyed object"))?;

    let mut map = BTreeMap::new();
    for (key, count) in obj {
        let entry_path = format!("{}.{}", path, key);
        let date = key
            .parse::<NaiveDate>()
            .map_err(|_| IngestError::schema(&entry_path, "key is not a YYYY-MM-DD date"))?;
        map.insert(date, as_count(count, &entry_path)?);
    }
    Ok(map)
}

/// Collect every field of `obj` not named in `known` into an opaque map
pub fn collect_unknown(obj: &Map<String, Value>, known: &[&str]) -> Map<String, Value> {
    obj.iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn name_list_decodes_both_historical_shapes() {
        // Bare identifier list
        let flat = json!(["MIT", "Stanford"]);
        assert_eq!(
            decode_name_list(&flat, "schools").unwrap(),
            vec!["MIT", "Stanford"]
        );

        // Richer objects carrying the same identifiers plus metadata
        let rich = json!([{"name": "MIT", "displayed": true}]);
        assert_eq!(decode_name_list(&rich, "schools").unwrap(), vec!["MIT"]);

        // Job shape with nested title
        let jobs = json!([{"title": {"name": "Engineer"}, "company": {"name": "Acme"}}]);
        assert_eq!(decode_name_list(&jobs, "jobs").unwrap(), vec!["Engineer"]);
    }

    #[test]
    fn name_list_rejects_unrecognizable_elements() {
        let bad = json!([{"displayed": true}]);
        let err = decode_name_list(&bad, "schools").unwrap_err();
        assert!(err.to_string().contains("schools[0]"));
    }

    #[test]
    fn gender_decodes_codes_and_strings() {
        assert_eq!(decode_gender(&json!(0), "g").unwrap(), "M");
        assert_eq!(decode_gender(&json!(1), "g").unwrap(), "F");
        assert_eq!(decode_gender(&json!(7), "g").unwrap(), "OTHER");
        assert_eq!(decode_gender(&json!("F"), "g").unwrap(), "F");
        assert!(decode_gender(&json!(""), "g").is_err());
    }

    #[test]
    fn count_map_parses_dates_and_float_counts() {
        let map = decode_count_map(
            &json!({"2024-01-01": 3, "2024-01-02": 4.0}),
            "Usage.app_opens",
        )
        .unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&"2024-01-02".parse().unwrap()], 4);

        let err = decode_count_map(&json!({"not-a-date": 1}), "Usage.app_opens").unwrap_err();
        assert!(err.to_string().contains("Usage.app_opens.not-a-date"));
    }

    #[test]
    fn timestamps_accept_legacy_formats() {
        let rfc = parse_timestamp(&json!("2021-07-03T18:04:22.000Z"), "t").unwrap();
        let legacy = parse_timestamp(&json!("2021-07-03 18:04:22 UTC"), "t").unwrap();
        assert_eq!(rfc, legacy);
        let bare = parse_timestamp(&json!("2021-07-03"), "t").unwrap();
        assert_eq!(bare.date_naive(), "2021-07-03".parse::<NaiveDate>().unwrap());
    }
}
