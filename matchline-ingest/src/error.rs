//! Error types for matchline-ingest
//!
//! Resolver outcomes that are not errors (CREATE, ADDITIVE_UPDATE,
//! CLAIM_THEN_UPDATE) are normal return values, never error variants.
//! Forbidden-ownership and chronology violations carry messages a
//! non-technical user can act on.

use chrono::NaiveDate;
use thiserror::Error;

/// Ingestion error taxonomy
#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed or missing required export field; names the field path
    #[error("Export validation failed at `{path}`: {reason}")]
    SchemaValidation { path: String, reason: String },

    /// Profile already exists on create, or is owned by a non-transferable
    /// identity. Terminal; no retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Target profile is owned by a different, non-anonymous account
    #[error(
        "This profile already belongs to another account. If it is yours, \
         sign in with that account; uploads never overwrite another \
         identity's data."
    )]
    Forbidden,

    /// Requested profile does not exist
    #[error("Profile not found: {0}")]
    NotFound(String),

    /// Caller identity missing or unusable
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid request parameters (self-merge, missing precondition, ...)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Backward cross-account merge. Terminal; the user must delete and
    /// re-upload in chronological order.
    #[error(
        "The uploaded export ends on {incoming} but your existing profile \
         already runs through {existing}. Accounts must be merged oldest \
         first: delete this profile, then upload your oldest account's \
         export before newer ones."
    )]
    ChronologyViolation {
        incoming: NaiveDate,
        existing: NaiveDate,
    },

    /// Cross-account birth-date drift beyond the configured threshold.
    /// Non-terminal: re-submit with explicit confirmation to proceed.
    #[error(
        "The export you are merging lists birth date {incoming}, but your \
         existing profile lists {existing}. This usually means the export \
         belongs to a different person. Confirm the merge to proceed anyway."
    )]
    IdentityMismatch {
        existing: NaiveDate,
        incoming: NaiveDate,
    },

    /// Export blob could not be retrieved or decoded
    #[error("Failed to retrieve export: {0}")]
    BlobFetch(String),

    /// Database operation error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// matchline-common error
    #[error(transparent)]
    Common(#[from] matchline_common::Error),
}

impl IngestError {
    /// Shorthand for schema validation failures
    pub fn schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        IngestError::SchemaValidation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;
