//! Uploads seed documents, retrying transient store failures

use crate::documents::SeedDocument;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use innovai_common::errors::Result;
use innovai_common::knowledge::WeaviateStore;
use std::time::Duration;
use tracing::{error, info, warn};

/// Write side of the knowledge store
#[async_trait]
pub trait PassageWriter: Send + Sync {
    /// Insert one passage, returning the store's object id
    async fn insert(&self, content: &str, metadata: &serde_json::Map<String, serde_json::Value>) -> Result<String>;
}

#[async_trait]
impl PassageWriter for WeaviateStore {
    async fn insert(&self, content: &str, metadata: &serde_json::Map<String, serde_json::Value>) -> Result<String> {
        self.insert_passage(content, metadata).await
    }
}

/// Outcome of one upload run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub failed: usize,
}

pub struct Uploader<W> {
    writer: W,
    max_retries: u32,
    initial_interval: Duration,
}

impl<W: PassageWriter> Uploader<W> {
    pub fn new(writer: W, max_retries: u32) -> Self {
        Self {
            writer,
            max_retries,
            initial_interval: Duration::from_millis(500),
        }
    }

    #[cfg(test)]
    fn with_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Upload every document; a failed insert is counted, not fatal
    pub async fn upload_all(&self, documents: &[SeedDocument]) -> UploadSummary {
        let mut summary = UploadSummary::default();

        for (index, document) in documents.iter().enumerate() {
            let title = &document.metadata.title;
            info!(document = index + 1, %title, "Uploading document");

            match self.upload(document).await {
                Ok(id) => {
                    info!(%title, %id, "Uploaded document");
                    summary.uploaded += 1;
                }
                Err(e) => {
                    error!(%title, error = %e, "Failed to upload document");
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    async fn upload(&self, document: &SeedDocument) -> Result<String> {
        let policy = ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: Duration::from_secs(5),
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        let properties = document.properties();

        let mut attempt = 0u32;
        retry(policy, || {
            attempt += 1;
            let this_attempt = attempt;
            let properties = &properties;
            async move {
                match self.writer.insert(&document.content, properties).await {
                    Ok(id) => Ok(id),
                    Err(e) if e.is_transient() && this_attempt <= self.max_retries => {
                        warn!(attempt = this_attempt, error = %e, "Insert failed, retrying");
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }
}
