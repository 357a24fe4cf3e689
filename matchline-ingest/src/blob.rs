//! Export blob retrieval
//!
//! Exports arrive already anonymized; this client only fetches and decodes
//! them. Network and not-found failures propagate as ingestion failures.

use crate::{IngestError, IngestResult};
use serde_json::Value;

/// Reference to a raw export document
#[derive(Debug, Clone)]
pub enum ExportRef {
    /// Blob-storage URL, fetched over HTTP as JSON
    Url(String),
    /// Already-decoded document supplied by the caller
    Inline(Value),
}

/// HTTP client for export blob retrieval
#[derive(Debug, Clone)]
pub struct BlobClient {
    http: reqwest::Client,
}

impl BlobClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Resolve an export reference to a decoded JSON document
    pub async fn fetch_export(&self, export_ref: &ExportRef) -> IngestResult<Value> {
        match export_ref {
            ExportRef::Inline(value) => Ok(value.clone()),
            ExportRef::Url(url) => {
                tracing::debug!(url = %url, "Fetching export blob");
                let response = self
                    .http
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| IngestError::BlobFetch(format!("request to {} failed: {}", url, e)))?;

                if !response.status().is_success() {
                    return Err(IngestError::BlobFetch(format!(
                        "{} returned HTTP {}",
                        url,
                        response.status()
                    )));
                }

                response
                    .json::<Value>()
                    .await
                    .map_err(|e| IngestError::BlobFetch(format!("{} returned invalid JSON: {}", url, e)))
            }
        }
    }
}

impl Default for BlobClient {
    fn default() -> Self {
        Self::new()
    }
}
