//! Usage-metric rate formulas and meta rollups
//!
//! Single home for every derived-rate formula so that per-day rows written
//! at ingestion time, recomputed profile meta rollups, and synthetic cohort
//! rollups all agree. Rates are computed from a single day's (or a single
//! profile's total) counts only; a zero denominator yields None, never 0.0.

use crate::db::models::DailyUsage;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Raw per-day counters before rate derivation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayCounts {
    pub app_opens: i64,
    pub swipe_likes: i64,
    pub swipe_passes: i64,
    pub super_likes: i64,
    pub matches: i64,
    pub messages_sent: i64,
    pub messages_received: i64,
}

/// Derived per-day rates; None where the denominator is zero
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DayRates {
    pub like_rate: Option<f64>,
    pub match_rate: Option<f64>,
    pub response_rate: Option<f64>,
    pub engagement_rate: Option<f64>,
}

/// likes / (likes + passes)
pub fn like_rate(likes: i64, passes: i64) -> Option<f64> {
    ratio(likes, likes + passes)
}

/// matches / likes
pub fn match_rate(matches: i64, likes: i64) -> Option<f64> {
    ratio(matches, likes)
}

/// messages received / messages sent
pub fn response_rate(sent: i64, received: i64) -> Option<f64> {
    ratio(received, sent)
}

/// (likes + passes + super likes) / app opens
pub fn engagement_rate(counts: &DayCounts) -> Option<f64> {
    ratio(
        counts.swipe_likes + counts.swipe_passes + counts.super_likes,
        counts.app_opens,
    )
}

fn ratio(numerator: i64, denominator: i64) -> Option<f64> {
    if denominator > 0 {
        Some(numerator as f64 / denominator as f64)
    } else {
        None
    }
}

/// Derive all four rates from one day's own counts
pub fn day_rates(counts: &DayCounts) -> DayRates {
    DayRates {
        like_rate: like_rate(counts.swipe_likes, counts.swipe_passes),
        match_rate: match_rate(counts.matches, counts.swipe_likes),
        response_rate: response_rate(counts.messages_sent, counts.messages_received),
        engagement_rate: engagement_rate(counts),
    }
}

/// Totals and overall rates rolled up from a profile's daily usage rows.
///
/// Derived, never independently authored. Conversation statistics are
/// supplied separately by callers that have match/message data; cohort
/// rollups leave them at zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaRollup {
    pub total_app_opens: i64,
    pub total_swipe_likes: i64,
    pub total_swipe_passes: i64,
    pub total_super_likes: i64,
    pub total_matches: i64,
    pub total_messages_sent: i64,
    pub total_messages_received: i64,
    pub active_days: i64,
    pub like_rate: Option<f64>,
    pub match_rate: Option<f64>,
    pub response_rate: Option<f64>,
    pub swipes_per_day: Option<f64>,
    pub messages_per_match: Option<f64>,
    pub first_active_day: Option<NaiveDate>,
    pub last_active_day: Option<NaiveDate>,
}

/// Roll daily usage rows into profile-level totals and overall rates
pub fn rollup(rows: &[DailyUsage]) -> MetaRollup {
    let mut meta = MetaRollup::default();

    for row in rows {
        meta.total_app_opens += row.app_opens;
        meta.total_swipe_likes += row.swipe_likes;
        meta.total_swipe_passes += row.swipe_passes;
        meta.total_super_likes += row.super_likes;
        meta.total_matches += row.matches;
        meta.total_messages_sent += row.messages_sent;
        meta.total_messages_received += row.messages_received;

        meta.first_active_day = match meta.first_active_day {
            Some(d) => Some(d.min(row.date)),
            None => Some(row.date),
        };
        meta.last_active_day = match meta.last_active_day {
            Some(d) => Some(d.max(row.date)),
            None => Some(row.date),
        };
    }

    meta.active_days = rows.len() as i64;
    meta.like_rate = like_rate(meta.total_swipe_likes, meta.total_swipe_passes);
    meta.match_rate = match_rate(meta.total_matches, meta.total_swipe_likes);
    meta.response_rate = response_rate(meta.total_messages_sent, meta.total_messages_received);
    meta.swipes_per_day = ratio(
        meta.total_swipe_likes + meta.total_swipe_passes + meta.total_super_likes,
        meta.active_days,
    );
    meta.messages_per_match = ratio(meta.total_messages_sent, meta.total_matches);

    meta
}
