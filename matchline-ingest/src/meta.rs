//! ProfileMeta recomputation
//!
//! The meta rollup is derived, never independently authored: after any
//! write to a profile's usage/match/message data it is regenerated whole
//! from the now-current stored state. Recomputation is the last step of
//! every mutating operation, so a rollup is never generated from a
//! half-written state.

use crate::db::{matches, usage};
use crate::IngestResult;
use chrono::Utc;
use matchline_common::metrics;
use sqlx::SqlitePool;

/// Recompute and store the meta rollup for a profile
pub async fn recompute_profile_meta(db: &SqlitePool, profile_guid: &str) -> IngestResult<()> {
    let rows = usage::list_for_profile(db, profile_guid).await?;
    let rollup = metrics::rollup(&rows);

    let lengths = matches::conversation_lengths(db, profile_guid).await?;
    let conversations: Vec<i64> = lengths.iter().copied().filter(|&n| n > 0).collect();
    let conversation_count = conversations.len() as i64;
    let avg_conversation_length = if conversation_count > 0 {
        Some(conversations.iter().sum::<i64>() as f64 / conversation_count as f64)
    } else {
        None
    };
    let longest_conversation = conversations.iter().copied().max().unwrap_or(0);

    // Regenerated whole, never patched
    sqlx::query("DELETE FROM profile_meta WHERE profile_guid = ?")
        .bind(profile_guid)
        .execute(db)
        .await?;

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
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
    .bind(conversation_count)
    .bind(avg_conversation_length)
    .bind(longest_conversation)
    .bind(rollup.first_active_day)
    .bind(rollup.last_active_day)
    .bind(Utc::now())
    .execute(db)
    .await?;

    tracing::debug!(profile_guid = %profile_guid, "Recomputed profile meta");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchline_common::db::create_schema;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        create_schema(&pool).await.unwrap();
        sqlx::query("INSERT INTO profiles (guid, platform, external_id) VALUES ('p1', 'TINDER', 'x1')")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn meta_reflects_current_rows_and_is_regenerated_whole() {
        let pool = setup_test_db().await;
        sqlx::query(
            "INSERT INTO daily_usage (profile_guid, date, app_opens, swipe_likes, swipe_passes, matches) \
             VALUES ('p1', '2024-01-01', 5, 10, 30, 2), ('p1', '2024-01-02', 3, 10, 10, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        recompute_profile_meta(&pool, "p1").await.unwrap();

        let (total_likes, like_rate, active_days): (i64, f64, i64) = sqlx::query_as(
            "SELECT total_swipe_likes, like_rate, active_days FROM profile_meta WHERE profile_guid = 'p1'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(total_likes, 20);
        assert!((like_rate - 20.0 / 60.0).abs() < 1e-9);
        assert_eq!(active_days, 2);

        // A second recomputation replaces the row instead of duplicating it
        recompute_profile_meta(&pool, "p1").await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM profile_meta")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn conversation_stats_ignore_messageless_matches() {
        let pool = setup_test_db().await;
        sqlx::query(
            "INSERT INTO matches (guid, profile_guid, platform_match_id) \
             VALUES ('m1', 'p1', 'Match 1'), ('m2', 'p1', 'Match 2')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO messages (guid, match_guid, direction, message_type, content, sent_at, content_hash) \
             VALUES ('g1', 'm1', 'SENT', 'TEXT', 'hi', '2024-01-01T10:00:00Z', 'h1'), \
                    ('g2', 'm1', 'SENT', 'TEXT', 'yo', '2024-01-01T11:00:00Z', 'h2')",
        )
        .execute(&pool)
        .await
        .unwrap();

        recompute_profile_meta(&pool, "p1").await.unwrap();

        let (conversations, avg, longest): (i64, f64, i64) = sqlx::query_as(
            "SELECT conversation_count, avg_conversation_length, longest_conversation \
             FROM profile_meta WHERE profile_guid = 'p1'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(conversations, 1);
        assert!((avg - 2.0).abs() < 1e-9);
        assert_eq!(longest, 2);
    }
}
