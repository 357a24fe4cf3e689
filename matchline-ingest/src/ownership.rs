//! Ownership & Identity Resolver
//!
//! A small state machine over the upload-time outcomes. Outcomes are normal
//! return values; FORBIDDEN is the only error path, and it occurs exactly
//! when the target profile is owned by a non-anonymous user different from
//! the caller. Ownership transfer is its own operation invoked explicitly
//! by the resolver, never inlined into upload handling.

use crate::{IngestError, IngestResult};
use chrono::NaiveDate;
use sqlx::SqlitePool;

/// Already-authenticated caller identity, resolved by the excluded
/// transport layer
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub user_id: String,
    pub is_anonymous: bool,
}

/// Ownership state of an existing profile
#[derive(Debug, Clone)]
pub struct ExistingOwnership {
    pub owner_user_id: Option<String>,
    /// True when the owner row is anonymous, or when no owner is recorded
    pub owner_is_anonymous: bool,
}

/// Terminal outcomes of upload-time ownership resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Brand-new profile; caller becomes owner
    Create,
    /// Same owner re-uploading a refreshed export
    AdditiveUpdate,
    /// Anonymous-owned profile claimed by an authenticated caller, then
    /// additively updated
    ClaimThenUpdate { previous_owner: Option<String> },
}

/// Resolve which merge path applies for an upload
pub fn resolve_upload(
    existing: Option<&ExistingOwnership>,
    caller: &CallerIdentity,
) -> IngestResult<UploadOutcome> {
    if caller.user_id.is_empty() {
        return Err(IngestError::Unauthorized(
            "upload requires a resolved caller identity".to_string(),
        ));
    }

    let ownership = match existing {
        None => return Ok(UploadOutcome::Create),
        Some(o) => o,
    };

    match &ownership.owner_user_id {
        Some(owner) if *owner == caller.user_id => Ok(UploadOutcome::AdditiveUpdate),
        Some(owner) if ownership.owner_is_anonymous && !caller.is_anonymous => {
            Ok(UploadOutcome::ClaimThenUpdate {
                previous_owner: Some(owner.clone()),
            })
        }
        None if !caller.is_anonymous => Ok(UploadOutcome::ClaimThenUpdate { previous_owner: None }),
        Some(_) | None => Err(IngestError::Forbidden),
    }
}

/// Transfer profile ownership from one user to another.
///
/// Guarded: the stored owner must still be `from` at transfer time, so a
/// concurrent claim cannot silently reassign twice.
pub async fn transfer_ownership(
    db: &SqlitePool,
    profile_guid: &str,
    from_user_id: Option<&str>,
    to_user_id: &str,
) -> IngestResult<()> {
    let result = match from_user_id {
        Some(from) => {
            sqlx::query(
                "UPDATE profiles SET owner_user_id = ?, updated_at = CURRENT_TIMESTAMP \
                 WHERE guid = ? AND owner_user_id = ?",
            )
            .bind(to_user_id)
            .bind(profile_guid)
            .bind(from)
            .execute(db)
            .await?
        }
        None => {
            sqlx::query(
                "UPDATE profiles SET owner_user_id = ?, updated_at = CURRENT_TIMESTAMP \
                 WHERE guid = ? AND owner_user_id IS NULL",
            )
            .bind(to_user_id)
            .bind(profile_guid)
            .execute(db)
            .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(IngestError::Conflict(format!(
            "ownership of profile {} changed during transfer",
            profile_guid
        )));
    }

    tracing::info!(
        profile_guid = %profile_guid,
        to_user = %to_user_id,
        "Transferred profile ownership"
    );
    Ok(())
}

/// Cross-account merges must proceed strictly older to newer. Violation is
/// terminal; the user resolves it manually by re-uploading in order.
pub fn check_chronology(
    existing_last: Option<NaiveDate>,
    incoming_last: Option<NaiveDate>,
) -> IngestResult<()> {
    if let (Some(existing), Some(incoming)) = (existing_last, incoming_last) {
        if incoming < existing {
            return Err(IngestError::ChronologyViolation { incoming, existing });
        }
    }
    Ok(())
}

/// Birth-date drift beyond the threshold flags a likely different-person
/// mistake. A warning requiring confirmation, not a hard block, since
/// platforms do legitimately correct birth dates.
pub fn check_identity_drift(
    existing_birth: Option<NaiveDate>,
    incoming_birth: NaiveDate,
    threshold_days: i64,
    confirmed: bool,
) -> IngestResult<()> {
    let existing = match existing_birth {
        Some(d) => d,
        None => return Ok(()),
    };
    let drift = (incoming_birth - existing).num_days().abs();
    if drift > threshold_days && !confirmed {
        return Err(IngestError::IdentityMismatch {
            existing,
            incoming: incoming_birth,
        });
    }
    Ok(())
}
