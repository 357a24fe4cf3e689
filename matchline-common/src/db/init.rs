//! Database initialization
//!
//! Creates the database file on first run and brings up the schema with
//! idempotent `CREATE TABLE IF NOT EXISTS` statements. The uniqueness
//! constraints declared here are the de-duplication points the merge engine
//! relies on; they are enforced by the store, not re-checked in memory.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode: concurrent uploads for different profiles must not block
    // each other; WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent). Public so tests can bring up the schema
/// on an in-memory pool.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_users_table(pool).await?;
    create_profiles_table(pool).await?;
    create_daily_usage_table(pool).await?;
    create_matches_table(pool).await?;
    create_messages_table(pool).await?;
    create_profile_meta_table(pool).await?;
    create_cohort_definitions_table(pool).await?;
    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            is_anonymous INTEGER NOT NULL DEFAULT 0,
            city TEXT,
            region TEXT,
            country TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            guid TEXT PRIMARY KEY,
            platform TEXT NOT NULL,
            external_id TEXT NOT NULL,
            owner_user_id TEXT REFERENCES users(guid),
            birth_date TEXT,
            gender TEXT,
            gender_filter TEXT,
            interested_in TEXT,
            age_filter_min INTEGER,
            age_filter_max INTEGER,
            bio TEXT,
            education TEXT,
            city TEXT,
            region TEXT,
            country TEXT,
            instagram TEXT,
            jobs TEXT,
            schools TEXT,
            interests TEXT,
            latitude REAL NOT NULL DEFAULT 0,
            longitude REAL NOT NULL DEFAULT 0,
            first_active_day TEXT,
            last_active_day TEXT,
            computed INTEGER NOT NULL DEFAULT 0,
            extra TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(platform, external_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_daily_usage_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_usage (
            profile_guid TEXT NOT NULL REFERENCES profiles(guid) ON DELETE CASCADE,
            date TEXT NOT NULL,
            app_opens INTEGER NOT NULL DEFAULT 0,
            swipe_likes INTEGER NOT NULL DEFAULT 0,
            swipe_passes INTEGER NOT NULL DEFAULT 0,
            super_likes INTEGER NOT NULL DEFAULT 0,
            matches INTEGER NOT NULL DEFAULT 0,
            messages_sent INTEGER NOT NULL DEFAULT 0,
            messages_received INTEGER NOT NULL DEFAULT 0,
            like_rate REAL,
            match_rate REAL,
            response_rate REAL,
            engagement_rate REAL,
            PRIMARY KEY (profile_guid, date)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_matches_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            guid TEXT PRIMARY KEY,
            profile_guid TEXT NOT NULL REFERENCES profiles(guid) ON DELETE CASCADE,
            platform_match_id TEXT NOT NULL,
            matched_at TEXT,
            UNIQUE(profile_guid, platform_match_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_messages_table(pool: &SqlitePool) -> Result<()> {
    // Platforms issue no message ids; (sent_at, direction, content_hash)
    // is the stable per-message dedup key
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            guid TEXT PRIMARY KEY,
            match_guid TEXT NOT NULL REFERENCES matches(guid) ON DELETE CASCADE,
            direction TEXT NOT NULL,
            message_type TEXT NOT NULL,
            content TEXT NOT NULL,
            sent_at TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            UNIQUE(match_guid, sent_at, direction, content_hash)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_profile_meta_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profile_meta (
            profile_guid TEXT PRIMARY KEY REFERENCES profiles(guid) ON DELETE CASCADE,
            total_app_opens INTEGER NOT NULL DEFAULT 0,
            total_swipe_likes INTEGER NOT NULL DEFAULT 0,
            total_swipe_passes INTEGER NOT NULL DEFAULT 0,
            total_super_likes INTEGER NOT NULL DEFAULT 0,
            total_matches INTEGER NOT NULL DEFAULT 0,
            total_messages_sent INTEGER NOT NULL DEFAULT 0,
            total_messages_received INTEGER NOT NULL DEFAULT 0,
            active_days INTEGER NOT NULL DEFAULT 0,
            like_rate REAL,
            match_rate REAL,
            response_rate REAL,
            swipes_per_day REAL,
            messages_per_match REAL,
            conversation_count INTEGER NOT NULL DEFAULT 0,
            avg_conversation_length REAL,
            longest_conversation INTEGER NOT NULL DEFAULT 0,
            first_active_day TEXT,
            last_active_day TEXT,
            computed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_cohort_definitions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cohort_definitions (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            gender TEXT,
            age_min INTEGER,
            age_max INTEGER,
            country TEXT,
            region TEXT,
            profile_count INTEGER NOT NULL DEFAULT 0,
            last_computed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        create_schema(&pool).await.unwrap();
        create_schema(&pool).await.unwrap();

        // Uniqueness constraint on daily_usage is live
        sqlx::query("INSERT INTO profiles (guid, platform, external_id) VALUES ('p1', 'TINDER', 'x1')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO daily_usage (profile_guid, date) VALUES ('p1', '2024-01-01')")
            .execute(&pool)
            .await
            .unwrap();
        let dup = sqlx::query("INSERT INTO daily_usage (profile_guid, date) VALUES ('p1', '2024-01-01')")
            .execute(&pool)
            .await;
        assert!(dup.is_err(), "duplicate (profile, date) row must be rejected");
    }

    #[tokio::test]
    async fn init_database_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = init_database(&path).await.unwrap();
        assert!(path.exists());
        drop(pool);
    }
}
