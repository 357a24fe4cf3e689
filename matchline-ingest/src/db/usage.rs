//! Daily usage rows

use crate::IngestResult;
use matchline_common::db::models::DailyUsage;
use sqlx::SqlitePool;

/// All usage rows for a profile, ordered by date
pub async fn list_for_profile(db: &SqlitePool, profile_guid: &str) -> IngestResult<Vec<DailyUsage>> {
    let rows = sqlx::query_as::<_, DailyUsage>(
        r#"
        SELECT profile_guid, date, app_opens, swipe_likes, swipe_passes,
               super_likes, matches, messages_sent, messages_received,
               like_rate, match_rate, response_rate, engagement_rate
        FROM daily_usage
        WHERE profile_guid = ?
        ORDER BY date
        "#,
    )
    .bind(profile_guid)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Count of usage rows for a profile
pub async fn count_for_profile(db: &SqlitePool, profile_guid: &str) -> IngestResult<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM daily_usage WHERE profile_guid = ?")
        .bind(profile_guid)
        .fetch_one(db)
        .await?;
    Ok(row.0)
}
