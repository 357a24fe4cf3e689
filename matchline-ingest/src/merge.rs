//! Additive Merge Engine
//!
//! Writes extracted metrics into a profile's stored time series without
//! duplication. Running the same ingestion twice is a stored-state no-op on
//! the second run; a superset export only adds or updates the new
//! information. The per-date and per-match uniqueness constraints declared
//! in the schema are the de-duplication points, so concurrent re-uploads of
//! the same profile resolve as last-writer-wins per row.

use crate::extract::{ExtractedMatch, ExtractedMetrics};
use crate::IngestResult;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Counts of what one merge actually wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub usage_days_written: u64,
    pub matches_inserted: u64,
    pub messages_inserted: u64,
}

/// Merge engine over the relational store
pub struct MergeEngine {
    db: SqlitePool,
}

impl MergeEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Write extracted metrics into an existing profile.
    ///
    /// Per-date rows: write-if-absent, else overwrite with the newer
    /// export's values for that date. Counts for one date are never summed
    /// across two exports; a single date belongs to exactly one source of
    /// truth, the most recently ingested export covering it.
    ///
    /// The caller recomputes ProfileMeta after this returns; a failure
    /// partway through leaves meta untouched, so a rollup is never
    /// generated from a half-written state.
    pub async fn apply(
        &self,
        profile_guid: &str,
        metrics: &ExtractedMetrics,
    ) -> IngestResult<MergeStats> {
        let mut stats = MergeStats::default();

        for day in &metrics.daily_usage {
            let result = sqlx::query(
                r#"
                INSERT INTO daily_usage (
                    profile_guid, date, app_opens, swipe_likes, swipe_passes,
                    super_likes, matches, messages_sent, messages_received,
                    like_rate, match_rate, response_rate, engagement_rate
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(profile_guid, date) DO UPDATE SET
                    app_opens = excluded.app_opens,
                    swipe_likes = excluded.swipe_likes,
                    swipe_passes = excluded.swipe_passes,
                    super_likes = excluded.super_likes,
                    matches = excluded.matches,
                    messages_sent = excluded.messages_sent,
                    messages_received = excluded.messages_received,
                    like_rate = excluded.like_rate,
                    match_rate = excluded.match_rate,
                    response_rate = excluded.response_rate,
                    engagement_rate = excluded.engagement_rate
                "#,
            )
            .bind(profile_guid)
            .bind(day.date)
            .bind(day.counts.app_opens)
            .bind(day.counts.swipe_likes)
            .bind(day.counts.swipe_passes)
            .bind(day.counts.super_likes)
            .bind(day.counts.matches)
            .bind(day.counts.messages_sent)
            .bind(day.counts.messages_received)
            .bind(day.like_rate)
            .bind(day.match_rate)
            .bind(day.response_rate)
            .bind(day.engagement_rate)
            .execute(&self.db)
            .await?;
            stats.usage_days_written += result.rows_affected();
        }

        for m in &metrics.matches {
            let (inserted, message_count) = self.upsert_match(profile_guid, m).await?;
            stats.matches_inserted += inserted;
            stats.messages_inserted += message_count;
        }

        tracing::debug!(
            profile_guid = %profile_guid,
            usage_days = stats.usage_days_written,
            matches = stats.matches_inserted,
            messages = stats.messages_inserted,
            "Applied merge"
        );

        Ok(stats)
    }

    /// Insert-if-absent by platform match id, then union the message set by
    /// the per-message dedup key. Message sets only grow.
    async fn upsert_match(
        &self,
        profile_guid: &str,
        m: &ExtractedMatch,
    ) -> IngestResult<(u64, u64)> {
        let existing: Option<(String,)> = sqlx::query_as(
            "SELECT guid FROM matches WHERE profile_guid = ? AND platform_match_id = ?",
        )
        .bind(profile_guid)
        .bind(&m.platform_match_id)
        .fetch_optional(&self.db)
        .await?;

        let (match_guid, inserted) = match existing {
            Some((guid,)) => (guid, 0),
            None => {
                let guid = Uuid::new_v4().to_string();
                sqlx::query(
                    "INSERT INTO matches (guid, profile_guid, platform_match_id, matched_at) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(&guid)
                .bind(profile_guid)
                .bind(&m.platform_match_id)
                .bind(m.matched_at)
                .execute(&self.db)
                .await?;
                (guid, 1)
            }
        };

        let mut messages_inserted = 0;
        for msg in &m.messages {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO messages (
                    guid, match_guid, direction, message_type, content,
                    sent_at, content_hash
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&match_guid)
            .bind(msg.direction.as_str())
            .bind(msg.message_type.as_str())
            .bind(&msg.content)
            .bind(msg.sent_at)
            .bind(&msg.content_hash)
            .execute(&self.db)
            .await?;
            messages_inserted += result.rows_affected();
        }

        Ok((inserted, messages_inserted))
    }

    /// Re-parent one profile's usage/match history onto another, used when a
    /// cross-account merge retires the old external id.
    ///
    /// Collisions resolve in favor of the surviving profile's rows (they
    /// come from the newer export): a colliding usage date is dropped, a
    /// colliding match contributes its messages to the surviving match
    /// before being removed.
    pub async fn reparent(&self, old_guid: &str, new_guid: &str) -> IngestResult<()> {
        // Usage rows: move what doesn't collide, drop what does
        sqlx::query("UPDATE OR IGNORE daily_usage SET profile_guid = ? WHERE profile_guid = ?")
            .bind(new_guid)
            .bind(old_guid)
            .execute(&self.db)
            .await?;
        sqlx::query("DELETE FROM daily_usage WHERE profile_guid = ?")
            .bind(old_guid)
            .execute(&self.db)
            .await?;

        // Matches: union messages into a colliding match, then move or drop
        let old_matches: Vec<(String, String)> = sqlx::query_as(
            "SELECT guid, platform_match_id FROM matches WHERE profile_guid = ?",
        )
        .bind(old_guid)
        .fetch_all(&self.db)
        .await?;

        for (old_match_guid, platform_match_id) in old_matches {
            let surviving: Option<(String,)> = sqlx::query_as(
                "SELECT guid FROM matches WHERE profile_guid = ? AND platform_match_id = ?",
            )
            .bind(new_guid)
            .bind(&platform_match_id)
            .fetch_optional(&self.db)
            .await?;

            match surviving {
                Some((surviving_guid,)) => {
                    sqlx::query(
                        "UPDATE OR IGNORE messages SET match_guid = ? WHERE match_guid = ?",
                    )
                    .bind(&surviving_guid)
                    .bind(&old_match_guid)
                    .execute(&self.db)
                    .await?;
                    // Leftover duplicates and the retired match row
                    sqlx::query("DELETE FROM messages WHERE match_guid = ?")
                        .bind(&old_match_guid)
                        .execute(&self.db)
                        .await?;
                    sqlx::query("DELETE FROM matches WHERE guid = ?")
                        .bind(&old_match_guid)
                        .execute(&self.db)
                        .await?;
                }
                None => {
                    sqlx::query("UPDATE matches SET profile_guid = ? WHERE guid = ?")
                        .bind(new_guid)
                        .bind(&old_match_guid)
                        .execute(&self.db)
                        .await?;
                }
            }
        }

        tracing::info!(
            old_guid = %old_guid,
            new_guid = %new_guid,
            "Re-parented profile history"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;
    use crate::schema::{normalize, Platform};
    use matchline_common::db::create_schema;
    use serde_json::json;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        create_schema(&pool).await.unwrap();
        sqlx::query("INSERT INTO profiles (guid, platform, external_id) VALUES ('p1', 'TINDER', 'x1')")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    fn sample_metrics() -> crate::extract::ExtractedMetrics {
        let doc = json!({
            "User": {
                "birth_date": "1995-03-14",
                "gender": "M",
                "gender_filter": "F",
                "interested_in": "F",
                "age_filter_min": 20,
                "age_filter_max": 35
            },
            "Usage": {
                "app_opens": {"2024-01-01": 5, "2024-01-02": 3},
                "swipes_likes": {"2024-01-01": 10},
                "swipes_passes": {"2024-01-01": 30}
            },
            "Messages": [
                {
                    "match_id": "Match 1",
                    "messages": [
                        {"sent_date": "2024-01-01T10:00:00Z", "message": "hi"},
                        {"sent_date": "2024-01-01T10:05:00Z", "message": "how are you"}
                    ]
                }
            ]
        });
        extract(&normalize(Platform::Tinder, &doc).unwrap())
    }

    #[tokio::test]
    async fn double_apply_is_idempotent_on_stored_state() {
        let pool = setup_test_db().await;
        let engine = MergeEngine::new(pool.clone());
        let metrics = sample_metrics();

        engine.apply("p1", &metrics).await.unwrap();
        let second = engine.apply("p1", &metrics).await.unwrap();

        // Second run inserts nothing new
        assert_eq!(second.matches_inserted, 0);
        assert_eq!(second.messages_inserted, 0);

        let usage: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM daily_usage")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(usage.0, 2);
        let messages: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(messages.0, 2);
    }

    #[tokio::test]
    async fn overlapping_date_takes_newest_export_values() {
        let pool = setup_test_db().await;
        let engine = MergeEngine::new(pool.clone());
        engine.apply("p1", &sample_metrics()).await.unwrap();

        // Newer export covers the same date with different counts
        let doc = json!({
            "User": {
                "birth_date": "1995-03-14",
                "gender": "M",
                "gender_filter": "F",
                "interested_in": "F",
                "age_filter_min": 20,
                "age_filter_max": 35
            },
            "Usage": { "app_opens": {"2024-01-01": 8} }
        });
        let newer = extract(&normalize(Platform::Tinder, &doc).unwrap());
        engine.apply("p1", &newer).await.unwrap();

        let row: (i64, i64) = sqlx::query_as(
            "SELECT app_opens, swipe_likes FROM daily_usage WHERE profile_guid = 'p1' AND date = '2024-01-01'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        // Overwritten, not summed; counters absent from the newer export's
        // maps for that date are zero, not carried over
        assert_eq!(row.0, 8);
        assert_eq!(row.1, 0);
    }

    #[tokio::test]
    async fn message_sets_union_monotonically() {
        let pool = setup_test_db().await;
        let engine = MergeEngine::new(pool.clone());
        engine.apply("p1", &sample_metrics()).await.unwrap();

        // Re-ingest the same match with one extra message
        let doc = json!({
            "User": {
                "birth_date": "1995-03-14",
                "gender": "M",
                "gender_filter": "F",
                "interested_in": "F",
                "age_filter_min": 20,
                "age_filter_max": 35
            },
            "Messages": [
                {
                    "match_id": "Match 1",
                    "messages": [
                        {"sent_date": "2024-01-01T10:00:00Z", "message": "hi"},
                        {"sent_date": "2024-01-02T09:00:00Z", "message": "still there?"}
                    ]
                }
            ]
        });
        let refreshed = extract(&normalize(Platform::Tinder, &doc).unwrap());
        let stats = engine.apply("p1", &refreshed).await.unwrap();

        assert_eq!(stats.matches_inserted, 0);
        assert_eq!(stats.messages_inserted, 1);

        let matches: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM matches")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(matches.0, 1);
        let messages: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(messages.0, 3);
    }

    #[tokio::test]
    async fn reparent_moves_history_and_prefers_surviving_rows() {
        let pool = setup_test_db().await;
        sqlx::query("INSERT INTO profiles (guid, platform, external_id) VALUES ('p2', 'TINDER', 'x2')")
            .execute(&pool)
            .await
            .unwrap();

        let engine = MergeEngine::new(pool.clone());
        engine.apply("p1", &sample_metrics()).await.unwrap();

        // p2 has its own row for 2024-01-02 plus a unique day
        sqlx::query(
            "INSERT INTO daily_usage (profile_guid, date, app_opens) VALUES ('p2', '2024-01-02', 99), ('p2', '2024-01-03', 7)",
        )
        .execute(&pool)
        .await
        .unwrap();

        engine.reparent("p1", "p2").await.unwrap();

        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT date, app_opens FROM daily_usage WHERE profile_guid = 'p2' ORDER BY date",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(rows.len(), 3);
        // Collision on 01-02 kept p2's own row
        assert_eq!(rows[1], ("2024-01-02".to_string(), 99));

        let leftovers: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM daily_usage WHERE profile_guid = 'p1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(leftovers.0, 0);

        // Match moved over with its messages
        let match_owner: (String,) = sqlx::query_as("SELECT profile_guid FROM matches LIMIT 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(match_owner.0, "p2");
    }
}
