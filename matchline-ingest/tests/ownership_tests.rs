//! Ownership resolution and cross-account merge tests
//!
//! Cover the four upload outcomes end to end, plus the chronology guard,
//! the identity-mismatch confirmation flow, and retirement of the old
//! external id after a confirmed merge.

use matchline_common::db::create_schema;
use matchline_ingest::{
    CallerIdentity, ExportRef, IngestError, IngestService, MergeRequest, Platform, UploadRequest,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;

async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    create_schema(&pool).await.unwrap();
    pool
}

fn caller(id: &str, anonymous: bool) -> CallerIdentity {
    CallerIdentity {
        user_id: id.to_string(),
        is_anonymous: anonymous,
    }
}

fn upload_as(external_id: &str, who: CallerIdentity, doc: Value) -> UploadRequest {
    UploadRequest {
        platform: Platform::Tinder,
        external_id: external_id.to_string(),
        export: ExportRef::Inline(doc),
        caller: who,
        geo: None,
    }
}

/// Export whose app-open map spans [from..=to] January 2024 days
fn export_spanning(birth_date: &str, from: u32, to: u32) -> Value {
    let mut app_opens = serde_json::Map::new();
    for d in from..=to {
        app_opens.insert(format!("2024-01-{:02}", d), json!(1));
    }
    json!({
        "User": {
            "birth_date": birth_date,
            "gender": "M",
            "gender_filter": "F",
            "interested_in": "F",
            "age_filter_min": 20,
            "age_filter_max": 35
        },
        "Usage": { "app_opens": app_opens }
    })
}

#[tokio::test]
async fn create_conflicts_when_profile_exists() {
    let pool = setup_test_db().await;
    let service = IngestService::new(pool.clone());

    service
        .create_profile(upload_as("x1", caller("u1", false), export_spanning("1995-03-14", 1, 3)))
        .await
        .unwrap();

    let err = service
        .create_profile(upload_as("x1", caller("u1", false), export_spanning("1995-03-14", 1, 3)))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Conflict(_)));
}

#[tokio::test]
async fn authenticated_caller_claims_anonymous_profile_on_update() {
    let pool = setup_test_db().await;
    let service = IngestService::new(pool.clone());

    service
        .create_profile(upload_as("x1", caller("anon-1", true), export_spanning("1995-03-14", 1, 3)))
        .await
        .unwrap();

    let profile = service
        .update_profile(upload_as("x1", caller("u1", false), export_spanning("1995-03-14", 1, 5)))
        .await
        .unwrap();

    assert_eq!(profile.owner_user_id.as_deref(), Some("u1"));
}

#[tokio::test]
async fn update_is_forbidden_for_profiles_claimed_by_another_identity() {
    let pool = setup_test_db().await;
    let service = IngestService::new(pool.clone());

    service
        .create_profile(upload_as("x1", caller("u1", false), export_spanning("1995-03-14", 1, 3)))
        .await
        .unwrap();

    let err = service
        .update_profile(upload_as("x1", caller("u2", false), export_spanning("1995-03-14", 1, 5)))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Forbidden));

    // The legitimate owner still updates fine afterwards
    service
        .update_profile(upload_as("x1", caller("u1", false), export_spanning("1995-03-14", 1, 5)))
        .await
        .unwrap();
}

#[tokio::test]
async fn update_of_missing_profile_is_not_found() {
    let pool = setup_test_db().await;
    let service = IngestService::new(pool.clone());

    let err = service
        .update_profile(upload_as("nope", caller("u1", false), export_spanning("1995-03-14", 1, 3)))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::NotFound(_)));
}

fn merge_request(
    old_id: &str,
    new_id: &str,
    doc: Value,
    who: CallerIdentity,
    confirmed: bool,
) -> MergeRequest {
    MergeRequest {
        platform: Platform::Tinder,
        old_external_id: old_id.to_string(),
        new_external_id: new_id.to_string(),
        export: ExportRef::Inline(doc),
        caller: who,
        geo: None,
        confirmed_identity_mismatch: confirmed,
    }
}

#[tokio::test]
async fn backward_merge_raises_chronology_violation() {
    let pool = setup_test_db().await;
    let service = IngestService::new(pool.clone());

    // Existing profile runs through Jan 20
    service
        .create_profile(upload_as("old", caller("u1", false), export_spanning("1995-03-14", 10, 20)))
        .await
        .unwrap();

    // Incoming export ends Jan 5: strictly older than the existing profile
    let err = service
        .merge_accounts(merge_request(
            "old",
            "new",
            export_spanning("1995-03-14", 1, 5),
            caller("u1", false),
            false,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::ChronologyViolation { .. }));

    // Nothing was created or retired
    let profiles: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM profiles")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(profiles.0, 1);
}

#[tokio::test]
async fn self_merge_and_missing_profile_are_bad_requests() {
    let pool = setup_test_db().await;
    let service = IngestService::new(pool.clone());

    let err = service
        .merge_accounts(merge_request(
            "same",
            "same",
            export_spanning("1995-03-14", 1, 5),
            caller("u1", false),
            false,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::BadRequest(_)));

    let err = service
        .merge_accounts(merge_request(
            "missing",
            "new",
            export_spanning("1995-03-14", 1, 5),
            caller("u1", false),
            false,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::BadRequest(_)));
}

#[tokio::test]
async fn identity_drift_warns_until_confirmed() {
    let pool = setup_test_db().await;
    let service = IngestService::new(pool.clone());

    service
        .create_profile(upload_as("old", caller("u1", false), export_spanning("1990-01-01", 1, 5)))
        .await
        .unwrap();

    // Incoming birth date is three years off: flagged
    let err = service
        .merge_accounts(merge_request(
            "old",
            "new",
            export_spanning("1993-01-01", 10, 15),
            caller("u1", false),
            false,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::IdentityMismatch { .. }));

    // Explicit confirmation lets the merge proceed
    let profile = service
        .merge_accounts(merge_request(
            "old",
            "new",
            export_spanning("1993-01-01", 10, 15),
            caller("u1", false),
            true,
        ))
        .await
        .unwrap();
    assert_eq!(profile.external_id, "new");
}

#[tokio::test]
async fn confirmed_merge_retires_old_id_and_reparents_history() {
    let pool = setup_test_db().await;
    let service = IngestService::new(pool.clone());

    service
        .create_profile(upload_as("old", caller("u1", false), export_spanning("1995-03-14", 1, 5)))
        .await
        .unwrap();

    let profile = service
        .merge_accounts(merge_request(
            "old",
            "new",
            export_spanning("1995-03-14", 10, 15),
            caller("u1", false),
            false,
        ))
        .await
        .unwrap();

    // Old external id is gone; one profile remains
    let profiles: Vec<(String,)> = sqlx::query_as("SELECT external_id FROM profiles")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(profiles, vec![("new".to_string(),)]);

    // Combined timeline: Jan 1-5 from the old profile, Jan 10-15 from the
    // new export
    let usage: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM daily_usage")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(usage.0, 11);

    assert_eq!(profile.first_active_day, Some("2024-01-01".parse().unwrap()));
    assert_eq!(profile.last_active_day, Some("2024-01-15".parse().unwrap()));

    // Meta was rebuilt from the merged timeline
    let (active_days,): (i64,) = sqlx::query_as("SELECT active_days FROM profile_meta")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(active_days, 11);
}
