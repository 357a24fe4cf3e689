//! Export Schema Normalizer
//!
//! Decodes raw export JSON into one canonical shape, tolerant of the schema
//! drift dating platforms ship without a version number. Decoding is a pure
//! transform: no store access, no clock access. Required fields fail hard
//! with the offending field path; optional fields degrade to documented
//! defaults; unrecognized sections and fields are preserved opaquely so a
//! later processing pass can mine them without a redeploy.

pub mod bumble;
pub mod hinge;
pub mod shapes;
pub mod tinder;

use crate::{IngestError, IngestResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Supported dating platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Tinder,
    Hinge,
    Bumble,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Tinder => "TINDER",
            Platform::Hinge => "HINGE",
            Platform::Bumble => "BUMBLE",
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TINDER" => Ok(Platform::Tinder),
            "HINGE" => Ok(Platform::Hinge),
            "BUMBLE" => Ok(Platform::Bumble),
            other => Err(IngestError::BadRequest(format!(
                "Unknown platform: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message direction relative to the exporting profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageDirection {
    Sent,
    Received,
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageDirection::Sent => "SENT",
            MessageDirection::Received => "RECEIVED",
        }
    }
}

/// Demographic snapshot decoded from the export's user section.
///
/// Required fields are present by construction; optional fields carry their
/// documented defaults (empty string, empty list, `(0.0, 0.0)` position).
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalDemographics {
    pub birth_date: NaiveDate,
    pub gender: String,
    pub gender_filter: String,
    pub interested_in: String,
    pub age_filter_min: i64,
    pub age_filter_max: i64,
    pub bio: String,
    pub education: String,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub instagram: Option<String>,
    pub jobs: Vec<String>,
    pub schools: Vec<String>,
    pub interests: Vec<String>,
    pub position: (f64, f64),
}

/// Parallel per-day count maps keyed by calendar date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalUsage {
    pub app_opens: BTreeMap<NaiveDate, i64>,
    pub swipe_likes: BTreeMap<NaiveDate, i64>,
    pub swipe_passes: BTreeMap<NaiveDate, i64>,
    pub super_likes: BTreeMap<NaiveDate, i64>,
    pub matches: BTreeMap<NaiveDate, i64>,
    pub messages_sent: BTreeMap<NaiveDate, i64>,
    pub messages_received: BTreeMap<NaiveDate, i64>,
}

/// One platform-issued match with its message list
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMatch {
    pub match_id: String,
    pub matched_at: Option<DateTime<Utc>>,
    pub messages: Vec<CanonicalMessage>,
}

/// One message; the type string stays raw here and is normalized into a
/// closed enum by the metric extractor
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMessage {
    pub sent_at: DateTime<Utc>,
    pub direction: MessageDirection,
    pub raw_type: Option<String>,
    pub content: String,
}

/// Canonical internal shape every platform decoder produces
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalExport {
    pub demographics: CanonicalDemographics,
    pub usage: CanonicalUsage,
    pub matches: Vec<CanonicalMatch>,
    /// Unrecognized top-level sections and unrecognized fields of known
    /// objects, preserved verbatim
    pub extra: Map<String, Value>,
}

/// Decode a raw export document for the declared platform
pub fn normalize(platform: Platform, document: &Value) -> IngestResult<CanonicalExport> {
    let root = document
        .as_object()
        .ok_or_else(|| IngestError::schema("$", "export document must be a JSON object"))?;

    let export = match platform {
        Platform::Tinder => tinder::decode(root)?,
        Platform::Hinge => hinge::decode(root)?,
        Platform::Bumble => bumble::decode(root)?,
    };

    tracing::debug!(
        platform = %platform,
        usage_days = export.usage.app_opens.len(),
        matches = export.matches.len(),
        extra_sections = export.extra.len(),
        "Normalized export"
    );

    Ok(export)
}
