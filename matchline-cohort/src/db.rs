//! Store queries for cohort aggregation

use chrono::{NaiveDate, Utc};
use matchline_common::db::models::{CohortDefinition, DailyUsage};
use matchline_common::metrics::MetaRollup;
use matchline_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// All cohort definitions, stable order
pub async fn list_cohorts(db: &SqlitePool) -> Result<Vec<CohortDefinition>> {
    let rows = sqlx::query_as::<_, CohortDefinition>(
        r#"
        SELECT guid, name, gender, age_min, age_max, country, region,
               profile_count, last_computed_at
        FROM cohort_definitions
        ORDER BY name
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// One cohort definition by guid
pub async fn get_cohort(db: &SqlitePool, guid: &str) -> Result<Option<CohortDefinition>> {
    let row = sqlx::query_as::<_, CohortDefinition>(
        r#"
        SELECT guid, name, gender, age_min, age_max, country, region,
               profile_count, last_computed_at
        FROM cohort_definitions
        WHERE guid = ?
        "#,
    )
    .bind(guid)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Birth-date window for an age range as of `today`: a person aged within
/// [age_min, age_max] was born within the returned [earliest, latest]
/// bounds (inclusive).
pub fn birth_date_bounds(
    age_min: Option<i64>,
    age_max: Option<i64>,
    today: NaiveDate,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let latest = age_min.map(|min| today - chrono::Months::new(12 * min as u32));
    let earliest = age_max.map(|max| {
        (today - chrono::Months::new(12 * (max as u32 + 1))) + chrono::Days::new(1)
    });
    (earliest, latest)
}

/// Guids of real profiles matching a cohort's filters.
///
/// Synthetic profiles are excluded unconditionally so aggregates are never
/// built from other aggregates.
pub async fn query_population(db: &SqlitePool, cohort: &CohortDefinition) -> Result<Vec<String>> {
    let (earliest_birth, latest_birth) =
        birth_date_bounds(cohort.age_min, cohort.age_max, Utc::now().date_naive());

    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT guid
        FROM profiles
        WHERE computed = 0
          AND (? IS NULL OR gender = ?)
          AND (? IS NULL OR country = ?)
          AND (? IS NULL OR region = ?)
          AND (? IS NULL OR birth_date >= ?)
          AND (? IS NULL OR birth_date <= ?)
        ORDER BY guid
        "#,
    )
    .bind(&cohort.gender)
    .bind(&cohort.gender)
    .bind(&cohort.country)
    .bind(&cohort.country)
    .bind(&cohort.region)
    .bind(&cohort.region)
    .bind(earliest_birth)
    .bind(earliest_birth)
    .bind(latest_birth)
    .bind(latest_birth)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Usage rows for one id-batch of the population. Chunking respects query
/// parameter limits; batch size is not a correctness property.
pub async fn fetch_usage_chunk(db: &SqlitePool, profile_guids: &[String]) -> Result<Vec<DailyUsage>> {
    if profile_guids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; profile_guids.len()].join(", ");
    let sql = format!(
        "SELECT profile_guid, date, app_opens, swipe_likes, swipe_passes, \
                super_likes, matches, messages_sent, messages_received, \
                like_rate, match_rate, response_rate, engagement_rate \
         FROM daily_usage \
         WHERE profile_guid IN ({}) \
         ORDER BY date",
        placeholders
    );

    let mut query = sqlx::query_as::<_, DailyUsage>(&sql);
    for guid in profile_guids {
        query = query.bind(guid);
    }
    Ok(query.fetch_all(db).await?)
}

/// Remove a cohort's synthetic profile and everything hanging off it.
/// Regeneration is destructive-then-recreate, never an incremental diff.
/// Dependent rows are deleted explicitly rather than via cascades.
pub async fn delete_synthetic_profile(db: &SqlitePool, cohort: &CohortDefinition) -> Result<()> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT guid FROM profiles WHERE external_id = ? AND computed = 1")
            .bind(cohort.synthetic_external_id())
            .fetch_optional(db)
            .await?;

    if let Some((guid,)) = existing {
        sqlx::query("DELETE FROM daily_usage WHERE profile_guid = ?")
            .bind(&guid)
            .execute(db)
            .await?;
        sqlx::query("DELETE FROM profile_meta WHERE profile_guid = ?")
            .bind(&guid)
            .execute(db)
            .await?;
        sqlx::query("DELETE FROM profiles WHERE guid = ?")
            .bind(&guid)
            .execute(db)
            .await?;
    }
    Ok(())
}

/// Insert the synthetic profile row for a cohort; returns its guid
pub async fn insert_synthetic_profile(
    db: &SqlitePool,
    cohort: &CohortDefinition,
    first_active_day: Option<NaiveDate>,
    last_active_day: Option<NaiveDate>,
) -> Result<String> {
    let guid = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO profiles (
            guid, platform, external_id, gender, country, region,
            first_active_day, last_active_day, computed
        )
        VALUES (?, 'COHORT', ?, ?, ?, ?, ?, ?, 1)
        "#,
    )
    .bind(&guid)
    .bind(cohort.synthetic_external_id())
    .bind(&cohort.gender)
    .bind(&cohort.country)
    .bind(&cohort.region)
    .bind(first_active_day)
    .bind(last_active_day)
    .execute(db)
    .await?;
    Ok(guid)
}

/// Insert one synthetic usage row
pub async fn insert_synthetic_usage(db: &SqlitePool, row: &DailyUsage) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO daily_usage (
            profile_guid, date, app_opens, swipe_likes, swipe_passes,
            super_likes, matches, messages_sent, messages_received,
            like_rate, match_rate, response_rate, engagement_rate
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.profile_guid)
    .bind(row.date)
    .bind(row.app_opens)
    .bind(row.swipe_likes)
    .bind(row.swipe_passes)
    .bind(row.super_likes)
    .bind(row.matches)
    .bind(row.messages_sent)
    .bind(row.messages_received)
    .bind(row.like_rate)
    .bind(row.match_rate)
    .bind(row.response_rate)
    .bind(row.engagement_rate)
    .execute(db)
    .await?;
    Ok(())
}

/// Insert the synthetic meta rollup. Conversation statistics stay at zero:
/// synthetic profiles carry no matches or messages.
pub async fn insert_synthetic_meta(
    db: &SqlitePool,
    profile_guid: &str,
    rollup: &MetaRollup,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO profile_meta (
            profile_guid, total_app_opens, total_swipe_likes,
            total_swipe_passes, total_super_likes, total_matches,
            total_messages_sent, total_messages_received, active_days,
            like_rate, match_rate, response_rate, swipes_per_day,
            messages_per_match, conversation_count, avg_conversation_length,
            longest_conversation, first_active_day, last_active_day,
            computed_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, 0, ?, ?, ?)
        "#,
    )
    .bind(profile_guid)
    .bind(rollup.total_app_opens)
    .bind(rollup.total_swipe_likes)
    .bind(rollup.total_swipe_passes)
    .bind(rollup.total_super_likes)
    .bind(rollup.total_matches)
    .bind(rollup.total_messages_sent)
    .bind(rollup.total_messages_received)
    .bind(rollup.active_days)
    .bind(rollup.like_rate)
    .bind(rollup.match_rate)
    .bind(rollup.response_rate)
    .bind(rollup.swipes_per_day)
    .bind(rollup.messages_per_match)
    .bind(rollup.first_active_day)
    .bind(rollup.last_active_day)
    .bind(Utc::now())
    .execute(db)
    .await?;
    Ok(())
}

/// Record a successful generation on the cohort definition
pub async fn update_cohort_cache(db: &SqlitePool, cohort_guid: &str, profile_count: i64) -> Result<()> {
    sqlx::query(
        "UPDATE cohort_definitions SET profile_count = ?, last_computed_at = ? WHERE guid = ?",
    )
    .bind(profile_count)
    .bind(Utc::now())
    .bind(cohort_guid)
    .execute(db)
    .await?;
    Ok(())
}
