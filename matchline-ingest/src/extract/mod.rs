//! Metric Extractor
//!
//! Derives daily usage rows, match/message records, and the demographic
//! snapshot from a canonical export. Pure: validation already happened in
//! the normalizer, so extraction cannot fail.

pub mod matches;
pub mod usage;

use crate::schema::{CanonicalDemographics, CanonicalExport};
use chrono::NaiveDate;
use serde_json::{Map, Value};

pub use matches::{ExtractedMatch, ExtractedMessage, MessageType};
pub use usage::ExtractedDay;

/// Everything the merge engine needs from one export
#[derive(Debug, Clone)]
pub struct ExtractedMetrics {
    pub daily_usage: Vec<ExtractedDay>,
    pub matches: Vec<ExtractedMatch>,
    pub demographics: CanonicalDemographics,
    /// Min date across the app-open map; drives chronological-merge checks
    pub first_active_day: Option<NaiveDate>,
    /// Max date across the app-open map; drives chronological-merge checks
    pub last_active_day: Option<NaiveDate>,
    /// Opaquely preserved unknown export sections, carried to the profile row
    pub extra: Map<String, Value>,
}

/// Extract metrics from a canonical export
pub fn extract(export: &CanonicalExport) -> ExtractedMetrics {
    let daily_usage = usage::extract_daily(&export.usage);
    let matches = export.matches.iter().map(matches::extract_match).collect();

    let first_active_day = export.usage.app_opens.keys().min().copied();
    let last_active_day = export.usage.app_opens.keys().max().copied();

    ExtractedMetrics {
        daily_usage,
        matches,
        demographics: export.demographics.clone(),
        first_active_day,
        last_active_day,
        extra: export.extra.clone(),
    }
}
