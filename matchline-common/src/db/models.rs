//! Database models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Resolved caller identity row. This core never authenticates; it records
/// the already-resolved identity so ownership rows have a referent.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub guid: String,
    pub is_anonymous: bool,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

/// One profile per (platform, external id)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub guid: String,
    pub platform: String,
    pub external_id: String,
    pub owner_user_id: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub gender_filter: Option<String>,
    pub interested_in: Option<String>,
    pub age_filter_min: Option<i64>,
    pub age_filter_max: Option<i64>,
    pub bio: Option<String>,
    pub education: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub instagram: Option<String>,
    /// JSON array of job titles
    pub jobs: Option<String>,
    /// JSON array of school names
    pub schools: Option<String>,
    /// JSON array of interest labels
    pub interests: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub first_active_day: Option<NaiveDate>,
    pub last_active_day: Option<NaiveDate>,
    /// True only for synthetic cohort profiles; excluded from every
    /// population query used for cohort generation
    pub computed: bool,
    /// Unrecognized export sections, preserved opaquely as JSON
    pub extra: Option<String>,
}

/// One usage row per (profile, calendar date)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyUsage {
    pub profile_guid: String,
    pub date: NaiveDate,
    pub app_opens: i64,
    pub swipe_likes: i64,
    pub swipe_passes: i64,
    pub super_likes: i64,
    pub matches: i64,
    pub messages_sent: i64,
    pub messages_received: i64,
    pub like_rate: Option<f64>,
    pub match_rate: Option<f64>,
    pub response_rate: Option<f64>,
    pub engagement_rate: Option<f64>,
}

/// A platform-issued match belonging to exactly one profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MatchRecord {
    pub guid: String,
    pub profile_guid: String,
    pub platform_match_id: String,
    pub matched_at: Option<DateTime<Utc>>,
}

/// A message belonging to exactly one match
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageRecord {
    pub guid: String,
    pub match_guid: String,
    pub direction: String,
    pub message_type: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub content_hash: String,
}

/// Denormalized per-profile rollup; always regenerated whole, never patched
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProfileMeta {
    pub profile_guid: String,
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
    pub conversation_count: i64,
    pub avg_conversation_length: Option<f64>,
    pub longest_conversation: i64,
    pub first_active_day: Option<NaiveDate>,
    pub last_active_day: Option<NaiveDate>,
    pub computed_at: DateTime<Utc>,
}

/// A named demographic filter plus cached generation state
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CohortDefinition {
    pub guid: String,
    pub name: String,
    pub gender: Option<String>,
    pub age_min: Option<i64>,
    pub age_max: Option<i64>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub profile_count: i64,
    pub last_computed_at: Option<DateTime<Utc>>,
}

impl CohortDefinition {
    /// External id of this cohort's synthetic profile. Derived
    /// deterministically from the cohort guid so regeneration is idempotent.
    pub fn synthetic_external_id(&self) -> String {
        format!("cohort-{}", self.guid)
    }
}
