//! Match and message rows

use crate::IngestResult;
use sqlx::SqlitePool;

/// Count of matches for a profile
pub async fn count_for_profile(db: &SqlitePool, profile_guid: &str) -> IngestResult<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM matches WHERE profile_guid = ?")
        .bind(profile_guid)
        .fetch_one(db)
        .await?;
    Ok(row.0)
}

/// Message count per match for a profile, including zero-message matches.
/// Feeds the conversation statistics of the meta rollup.
pub async fn conversation_lengths(
    db: &SqlitePool,
    profile_guid: &str,
) -> IngestResult<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
        SELECT COUNT(msg.guid)
        FROM matches m
        LEFT JOIN messages msg ON msg.match_guid = m.guid
        WHERE m.profile_guid = ?
        GROUP BY m.guid
        "#,
    )
    .bind(profile_guid)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}
