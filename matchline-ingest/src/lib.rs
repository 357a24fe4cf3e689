//! # Matchline Ingest
//!
//! Ingestion and additive-merge engine for dating-platform data exports.
//!
//! Pipeline: a caller submits a platform + export reference; the schema
//! normalizer decodes the raw document into a canonical shape tolerant of
//! version drift; the metric extractor derives daily usage rows, matches,
//! messages, and demographics; the ownership resolver decides which merge
//! path is legal; the merge engine writes rows idempotently and recomputes
//! the profile meta rollup last.
//!
//! This crate is a library invoked by an external transport layer; it owns
//! no wire format or CLI surface.

pub mod blob;
pub mod db;
pub mod error;
pub mod extract;
pub mod merge;
pub mod meta;
pub mod ownership;
pub mod schema;
pub mod service;

pub use blob::{BlobClient, ExportRef};
pub use error::{IngestError, IngestResult};
pub use ownership::{CallerIdentity, UploadOutcome};
pub use schema::Platform;
pub use service::{GeoHint, IngestService, MergeRequest, UploadRequest};
