//! Ingestion service
//!
//! Public entry points invoked by the external transport layer. Each upload
//! runs the request-scoped pipeline: fetch blob, normalize, extract,
//! resolve ownership, merge, then recompute the meta rollup as the final
//! step. Concurrent uploads for different profiles do not block each other;
//! same-profile races resolve per row at the store's uniqueness
//! constraints.

use crate::blob::{BlobClient, ExportRef};
use crate::db::{profiles, users};
use crate::extract::{self, ExtractedMetrics};
use crate::merge::MergeEngine;
use crate::meta::recompute_profile_meta;
use crate::ownership::{
    check_chronology, check_identity_drift, resolve_upload, transfer_ownership, CallerIdentity,
    UploadOutcome,
};
use crate::schema::{normalize, Platform};
use crate::{IngestError, IngestResult};
use matchline_common::config::DEFAULT_IDENTITY_DRIFT_DAYS;
use matchline_common::db::models::Profile;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Approximate caller location, used only to enrich the owning user row
#[derive(Debug, Clone, Default)]
pub struct GeoHint {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

/// One upload of a platform export
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub platform: Platform,
    pub external_id: String,
    pub export: ExportRef,
    pub caller: CallerIdentity,
    pub geo: Option<GeoHint>,
}

/// Explicit cross-account merge of an older account into a newer one
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub platform: Platform,
    pub old_external_id: String,
    pub new_external_id: String,
    pub export: ExportRef,
    pub caller: CallerIdentity,
    pub geo: Option<GeoHint>,
    /// Set after the caller confirms an identity-mismatch warning
    pub confirmed_identity_mismatch: bool,
}

/// Ingestion engine over the relational store
pub struct IngestService {
    db: SqlitePool,
    blob: BlobClient,
    merge: MergeEngine,
    identity_drift_days: i64,
}

impl IngestService {
    pub fn new(db: SqlitePool) -> Self {
        Self::with_options(db, BlobClient::new(), DEFAULT_IDENTITY_DRIFT_DAYS)
    }

    pub fn with_options(db: SqlitePool, blob: BlobClient, identity_drift_days: i64) -> Self {
        Self {
            merge: MergeEngine::new(db.clone()),
            db,
            blob,
            identity_drift_days,
        }
    }

    /// Create a brand-new profile from an export; the caller becomes owner
    pub async fn create_profile(&self, req: UploadRequest) -> IngestResult<Profile> {
        if req.caller.user_id.is_empty() {
            return Err(IngestError::Unauthorized(
                "upload requires a resolved caller identity".to_string(),
            ));
        }

        let metrics = self.load_and_extract(&req.platform, &req.export).await?;

        if profiles::find_by_external(&self.db, req.platform, &req.external_id)
            .await?
            .is_some()
        {
            return Err(IngestError::Conflict(format!(
                "a {} profile for this export already exists; use update instead",
                req.platform
            )));
        }

        users::upsert_user(&self.db, &req.caller, req.geo.as_ref()).await?;

        let guid = Uuid::new_v4().to_string();
        profiles::insert_profile(
            &self.db,
            &guid,
            req.platform,
            &req.external_id,
            Some(&req.caller.user_id),
            &metrics.demographics,
            metrics.first_active_day,
            metrics.last_active_day,
            extra_json(&metrics).as_deref(),
        )
        .await?;

        self.merge.apply(&guid, &metrics).await?;
        recompute_profile_meta(&self.db, &guid).await?;

        tracing::info!(
            platform = %req.platform,
            profile_guid = %guid,
            usage_days = metrics.daily_usage.len(),
            "Created profile"
        );

        self.fetch_profile(&guid).await
    }

    /// Additively update an existing profile from a refreshed export.
    ///
    /// Resolves the merge path first: same owner updates in place; an
    /// authenticated caller claims an anonymous-owned profile before
    /// updating; a profile claimed by a different non-anonymous identity is
    /// never touched.
    pub async fn update_profile(&self, req: UploadRequest) -> IngestResult<Profile> {
        let metrics = self.load_and_extract(&req.platform, &req.export).await?;

        let existing = profiles::find_by_external(&self.db, req.platform, &req.external_id)
            .await?
            .ok_or_else(|| {
                IngestError::NotFound(format!(
                    "no {} profile exists for this export; create it first",
                    req.platform
                ))
            })?;

        let ownership = profiles::get_ownership(&self.db, &existing.guid).await?;
        let outcome = resolve_upload(Some(&ownership), &req.caller)?;

        users::upsert_user(&self.db, &req.caller, req.geo.as_ref()).await?;

        if let UploadOutcome::ClaimThenUpdate { previous_owner } = &outcome {
            transfer_ownership(
                &self.db,
                &existing.guid,
                previous_owner.as_deref(),
                &req.caller.user_id,
            )
            .await?;
        }

        profiles::update_demographics(
            &self.db,
            &existing.guid,
            &metrics.demographics,
            metrics.first_active_day,
            metrics.last_active_day,
            extra_json(&metrics).as_deref(),
        )
        .await?;

        let stats = self.merge.apply(&existing.guid, &metrics).await?;
        recompute_profile_meta(&self.db, &existing.guid).await?;

        tracing::info!(
            platform = %req.platform,
            profile_guid = %existing.guid,
            outcome = ?outcome,
            usage_days_written = stats.usage_days_written,
            "Updated profile"
        );

        self.fetch_profile(&existing.guid).await
    }

    /// Merge an older account's history into a newer account's export.
    ///
    /// The old external id is retired: its history is re-parented onto the
    /// new profile, then the old profile row is removed. Merges proceed
    /// strictly older to newer; a backward merge is rejected rather than
    /// silently corrupting the timeline.
    pub async fn merge_accounts(&self, req: MergeRequest) -> IngestResult<Profile> {
        if req.caller.user_id.is_empty() {
            return Err(IngestError::Unauthorized(
                "merging accounts requires a resolved caller identity".to_string(),
            ));
        }
        if req.old_external_id == req.new_external_id {
            return Err(IngestError::BadRequest(
                "the new export has the same id as your current profile; use update instead"
                    .to_string(),
            ));
        }

        let old = profiles::find_by_external(&self.db, req.platform, &req.old_external_id)
            .await?
            .ok_or_else(|| {
                IngestError::BadRequest(
                    "you have no existing profile to merge into; upload an export first"
                        .to_string(),
                )
            })?;
        if old.owner_user_id.as_deref() != Some(req.caller.user_id.as_str()) {
            return Err(IngestError::BadRequest(
                "account merges are limited to profiles you own".to_string(),
            ));
        }

        let metrics = self.load_and_extract(&req.platform, &req.export).await?;

        check_chronology(old.last_active_day, metrics.last_active_day)?;
        check_identity_drift(
            old.birth_date,
            metrics.demographics.birth_date,
            self.identity_drift_days,
            req.confirmed_identity_mismatch,
        )?;

        users::upsert_user(&self.db, &req.caller, req.geo.as_ref()).await?;

        // The new external id may already have a profile (e.g. a previous
        // partial upload); the regular resolver decides whether it can be
        // reused, claimed, or is off limits
        let target = profiles::find_by_external(&self.db, req.platform, &req.new_external_id).await?;
        let new_guid = match &target {
            None => {
                let guid = Uuid::new_v4().to_string();
                profiles::insert_profile(
                    &self.db,
                    &guid,
                    req.platform,
                    &req.new_external_id,
                    Some(&req.caller.user_id),
                    &metrics.demographics,
                    metrics.first_active_day,
                    metrics.last_active_day,
                    extra_json(&metrics).as_deref(),
                )
                .await?;
                guid
            }
            Some(existing) => {
                let ownership = profiles::get_ownership(&self.db, &existing.guid).await?;
                if let UploadOutcome::ClaimThenUpdate { previous_owner } =
                    resolve_upload(Some(&ownership), &req.caller)?
                {
                    transfer_ownership(
                        &self.db,
                        &existing.guid,
                        previous_owner.as_deref(),
                        &req.caller.user_id,
                    )
                    .await?;
                }
                profiles::update_demographics(
                    &self.db,
                    &existing.guid,
                    &metrics.demographics,
                    metrics.first_active_day,
                    metrics.last_active_day,
                    extra_json(&metrics).as_deref(),
                )
                .await?;
                existing.guid.clone()
            }
        };

        self.merge.apply(&new_guid, &metrics).await?;
        self.merge.reparent(&old.guid, &new_guid).await?;
        profiles::delete_profile(&self.db, &old.guid).await?;
        refresh_activity_span(&self.db, &new_guid).await?;
        recompute_profile_meta(&self.db, &new_guid).await?;

        tracing::info!(
            platform = %req.platform,
            old_guid = %old.guid,
            new_guid = %new_guid,
            "Merged accounts"
        );

        self.fetch_profile(&new_guid).await
    }

    /// Fetch, normalize, and extract one export
    async fn load_and_extract(
        &self,
        platform: &Platform,
        export: &ExportRef,
    ) -> IngestResult<ExtractedMetrics> {
        let document = self.blob.fetch_export(export).await?;
        let canonical = normalize(*platform, &document)?;
        Ok(extract::extract(&canonical))
    }

    async fn fetch_profile(&self, guid: &str) -> IngestResult<Profile> {
        profiles::find_by_guid(&self.db, guid)
            .await?
            .ok_or_else(|| IngestError::NotFound(format!("profile {}", guid)))
    }
}

/// Widen a profile's activity span to cover its now-current usage rows;
/// used after re-parenting moves history between profiles
async fn refresh_activity_span(db: &SqlitePool, profile_guid: &str) -> IngestResult<()> {
    sqlx::query(
        r#"
        UPDATE profiles
        SET first_active_day = (SELECT MIN(date) FROM daily_usage WHERE profile_guid = ?),
            last_active_day = (SELECT MAX(date) FROM daily_usage WHERE profile_guid = ?),
            updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(profile_guid)
    .bind(profile_guid)
    .bind(profile_guid)
    .execute(db)
    .await?;
    Ok(())
}

/// Serialize preserved unknown export sections, None when there were none
fn extra_json(metrics: &ExtractedMetrics) -> Option<String> {
    if metrics.extra.is_empty() {
        None
    } else {
        serde_json::to_string(&metrics.extra).ok()
    }
}
