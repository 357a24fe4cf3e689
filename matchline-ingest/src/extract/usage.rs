//! Daily usage extraction
//!
//! Builds one row per calendar date from the union of date keys across the
//! parallel per-day count maps. A date present in one map but not another
//! contributes zero for the missing counter, not a missing row. Rates are
//! derived from each day's own counts and never carried over or
//! interpolated.

use crate::schema::CanonicalUsage;
use chrono::NaiveDate;
use matchline_common::metrics::{day_rates, DayCounts};
use std::collections::BTreeSet;

/// One extracted usage day, not yet bound to a profile
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDay {
    pub date: NaiveDate,
    pub counts: DayCounts,
    pub like_rate: Option<f64>,
    pub match_rate: Option<f64>,
    pub response_rate: Option<f64>,
    pub engagement_rate: Option<f64>,
}

/// Build usage rows from the parallel count maps
pub fn extract_daily(usage: &CanonicalUsage) -> Vec<ExtractedDay> {
    let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();
    dates.extend(usage.app_opens.keys());
    dates.extend(usage.swipe_likes.keys());
    dates.extend(usage.swipe_passes.keys());
    dates.extend(usage.super_likes.keys());
    dates.extend(usage.matches.keys());
    dates.extend(usage.messages_sent.keys());
    dates.extend(usage.messages_received.keys());

    dates
        .into_iter()
        .map(|date| {
            let counts = DayCounts {
                app_opens: *usage.app_opens.get(&date).unwrap_or(&0),
                swipe_likes: *usage.swipe_likes.get(&date).unwrap_or(&0),
                swipe_passes: *usage.swipe_passes.get(&date).unwrap_or(&0),
                super_likes: *usage.super_likes.get(&date).unwrap_or(&0),
                matches: *usage.matches.get(&date).unwrap_or(&0),
                messages_sent: *usage.messages_sent.get(&date).unwrap_or(&0),
                messages_received: *usage.messages_received.get(&date).unwrap_or(&0),
            };
            let rates = day_rates(&counts);
            ExtractedDay {
                date,
                counts,
                like_rate: rates.like_rate,
                match_rate: rates.match_rate,
                response_rate: rates.response_rate,
                engagement_rate: rates.engagement_rate,
            }
        })
        .collect()
}
