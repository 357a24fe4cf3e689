//! User identity rows
//!
//! This core consumes an already-resolved caller identity; it records that
//! identity (and the optional geolocation hint, which enriches the owning
//! user only, never the platform profile) so ownership has a referent.

use crate::ownership::CallerIdentity;
use crate::service::GeoHint;
use crate::IngestResult;
use sqlx::SqlitePool;

/// Insert or refresh the caller's user row
pub async fn upsert_user(
    db: &SqlitePool,
    caller: &CallerIdentity,
    geo: Option<&GeoHint>,
) -> IngestResult<()> {
    sqlx::query(
        r#"
        INSERT INTO users (guid, is_anonymous, city, region, country)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(guid) DO UPDATE SET
            is_anonymous = excluded.is_anonymous,
            city = COALESCE(excluded.city, users.city),
            region = COALESCE(excluded.region, users.region),
            country = COALESCE(excluded.country, users.country),
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&caller.user_id)
    .bind(caller.is_anonymous)
    .bind(geo.and_then(|g| g.city.as_deref()))
    .bind(geo.and_then(|g| g.region.as_deref()))
    .bind(geo.and_then(|g| g.country.as_deref()))
    .execute(db)
    .await?;
    Ok(())
}
