//! Profile rows

use crate::ownership::ExistingOwnership;
use crate::schema::{CanonicalDemographics, Platform};
use crate::IngestResult;
use chrono::NaiveDate;
use matchline_common::db::models::Profile;
use sqlx::SqlitePool;

/// Fetch a profile by its platform-scoped external id
pub async fn find_by_external(
    db: &SqlitePool,
    platform: Platform,
    external_id: &str,
) -> IngestResult<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(
        r#"
        SELECT guid, platform, external_id, owner_user_id, birth_date, gender,
               gender_filter, interested_in, age_filter_min, age_filter_max,
               bio, education, city, region, country, instagram, jobs, schools,
               interests, latitude, longitude, first_active_day,
               last_active_day, computed, extra
        FROM profiles
        WHERE platform = ? AND external_id = ?
        "#,
    )
    .bind(platform.as_str())
    .bind(external_id)
    .fetch_optional(db)
    .await?;
    Ok(profile)
}

/// Fetch a profile by internal guid
pub async fn find_by_guid(db: &SqlitePool, guid: &str) -> IngestResult<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(
        r#"
        SELECT guid, platform, external_id, owner_user_id, birth_date, gender,
               gender_filter, interested_in, age_filter_min, age_filter_max,
               bio, education, city, region, country, instagram, jobs, schools,
               interests, latitude, longitude, first_active_day,
               last_active_day, computed, extra
        FROM profiles
        WHERE guid = ?
        "#,
    )
    .bind(guid)
    .fetch_optional(db)
    .await?;
    Ok(profile)
}

/// Ownership state of a profile, resolving the owner's anonymity through
/// the users table. An ownerless profile counts as anonymous-owned.
pub async fn get_ownership(db: &SqlitePool, profile_guid: &str) -> IngestResult<ExistingOwnership> {
    let row: (Option<String>, bool) = sqlx::query_as(
        r#"
        SELECT p.owner_user_id, COALESCE(u.is_anonymous, 1)
        FROM profiles p
        LEFT JOIN users u ON u.guid = p.owner_user_id
        WHERE p.guid = ?
        "#,
    )
    .bind(profile_guid)
    .fetch_one(db)
    .await?;

    Ok(ExistingOwnership {
        owner_user_id: row.0,
        owner_is_anonymous: row.1,
    })
}

/// Insert a new profile with its demographic snapshot
#[allow(clippy::too_many_arguments)]
pub async fn insert_profile(
    db: &SqlitePool,
    guid: &str,
    platform: Platform,
    external_id: &str,
    owner_user_id: Option<&str>,
    demographics: &CanonicalDemographics,
    first_active_day: Option<NaiveDate>,
    last_active_day: Option<NaiveDate>,
    extra_json: Option<&str>,
) -> IngestResult<()> {
    sqlx::query(
        r#"
        INSERT INTO profiles (
            guid, platform, external_id, owner_user_id,
            birth_date, gender, gender_filter, interested_in,
            age_filter_min, age_filter_max, bio, education,
            city, region, country, instagram, jobs, schools, interests,
            latitude, longitude, first_active_day, last_active_day,
            computed, extra
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(guid)
    .bind(platform.as_str())
    .bind(external_id)
    .bind(owner_user_id)
    .bind(demographics.birth_date)
    .bind(&demographics.gender)
    .bind(&demographics.gender_filter)
    .bind(&demographics.interested_in)
    .bind(demographics.age_filter_min)
    .bind(demographics.age_filter_max)
    .bind(&demographics.bio)
    .bind(&demographics.education)
    .bind(&demographics.city)
    .bind(&demographics.region)
    .bind(&demographics.country)
    .bind(&demographics.instagram)
    .bind(serde_json::to_string(&demographics.jobs).unwrap_or_default())
    .bind(serde_json::to_string(&demographics.schools).unwrap_or_default())
    .bind(serde_json::to_string(&demographics.interests).unwrap_or_default())
    .bind(demographics.position.0)
    .bind(demographics.position.1)
    .bind(first_active_day)
    .bind(last_active_day)
    .bind(extra_json)
    .execute(db)
    .await?;
    Ok(())
}

/// Refresh the demographic snapshot from a newer export.
///
/// Merge strategy: new values overwrite old; old values are preserved when
/// the new export omits them. The activity span only widens: first active
/// day takes the minimum, last active day the maximum.
pub async fn update_demographics(
    db: &SqlitePool,
    guid: &str,
    demographics: &CanonicalDemographics,
    first_active_day: Option<NaiveDate>,
    last_active_day: Option<NaiveDate>,
    extra_json: Option<&str>,
) -> IngestResult<()> {
    sqlx::query(
        r#"
        UPDATE profiles
        SET
            birth_date = ?,
            gender = ?,
            gender_filter = ?,
            interested_in = ?,
            age_filter_min = ?,
            age_filter_max = ?,
            bio = CASE WHEN ? != '' THEN ? ELSE bio END,
            education = CASE WHEN ? != '' THEN ? ELSE education END,
            city = COALESCE(?, city),
            region = COALESCE(?, region),
            country = COALESCE(?, country),
            instagram = COALESCE(?, instagram),
            jobs = CASE WHEN ? != '[]' THEN ? ELSE jobs END,
            schools = CASE WHEN ? != '[]' THEN ? ELSE schools END,
            interests = CASE WHEN ? != '[]' THEN ? ELSE interests END,
            latitude = CASE WHEN ? != 0.0 THEN ? ELSE latitude END,
            longitude = CASE WHEN ? != 0.0 THEN ? ELSE longitude END,
            first_active_day = MIN(COALESCE(first_active_day, ?), COALESCE(?, first_active_day)),
            last_active_day = MAX(COALESCE(last_active_day, ?), COALESCE(?, last_active_day)),
            extra = COALESCE(?, extra),
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(demographics.birth_date)
    .bind(&demographics.gender)
    .bind(&demographics.gender_filter)
    .bind(&demographics.interested_in)
    .bind(demographics.age_filter_min)
    .bind(demographics.age_filter_max)
    .bind(&demographics.bio)
    .bind(&demographics.bio)
    .bind(&demographics.education)
    .bind(&demographics.education)
    .bind(&demographics.city)
    .bind(&demographics.region)
    .bind(&demographics.country)
    .bind(&demographics.instagram)
    .bind(serde_json::to_string(&demographics.jobs).unwrap_or_default())
    .bind(serde_json::to_string(&demographics.jobs).unwrap_or_default())
    .bind(serde_json::to_string(&demographics.schools).unwrap_or_default())
    .bind(serde_json::to_string(&demographics.schools).unwrap_or_default())
    .bind(serde_json::to_string(&demographics.interests).unwrap_or_default())
    .bind(serde_json::to_string(&demographics.interests).unwrap_or_default())
    .bind(demographics.position.0)
    .bind(demographics.position.0)
    .bind(demographics.position.1)
    .bind(demographics.position.1)
    .bind(first_active_day)
    .bind(first_active_day)
    .bind(last_active_day)
    .bind(last_active_day)
    .bind(extra_json)
    .bind(guid)
    .execute(db)
    .await?;
    Ok(())
}

/// Remove a profile and everything hanging off it. Dependents are deleted
/// explicitly rather than via cascades, since SQLite enforces foreign keys
/// per connection and pooled connections may not have the pragma applied.
pub async fn delete_profile(db: &SqlitePool, guid: &str) -> IngestResult<()> {
    sqlx::query(
        "DELETE FROM messages WHERE match_guid IN (SELECT guid FROM matches WHERE profile_guid = ?)",
    )
    .bind(guid)
    .execute(db)
    .await?;
    sqlx::query("DELETE FROM matches WHERE profile_guid = ?")
        .bind(guid)
        .execute(db)
        .await?;
    sqlx::query("DELETE FROM daily_usage WHERE profile_guid = ?")
        .bind(guid)
        .execute(db)
        .await?;
    sqlx::query("DELETE FROM profile_meta WHERE profile_guid = ?")
        .bind(guid)
        .execute(db)
        .await?;
    sqlx::query("DELETE FROM profiles WHERE guid = ?")
        .bind(guid)
        .execute(db)
        .await?;
    Ok(())
}
