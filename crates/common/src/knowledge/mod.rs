//! Vector knowledge store abstraction
//!
//! The orchestrator only ever searches. Writing passages is the ingestion
//! utility's job and lives on the concrete Weaviate client.

mod mock;
mod weaviate;

pub use mock::MockKnowledgeStore;
pub use weaviate::WeaviateStore;

use crate::config::KnowledgeConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A stored passage returned by a nearest-neighbour search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Passage text
    pub text: String,

    /// Store identifier of the source object
    pub source_id: String,

    /// Relevance reported by the store (higher is closer)
    pub relevance_score: f32,
}

/// Trait for nearest-passage search
///
/// `Ok(vec![])` means the store answered and found nothing; an unreachable
/// store is `AppError::StoreUnavailable` or `AppError::StoreTimeout`.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Top `limit` passages for `query`, most relevant first
    async fn search(&self, query: &str, limit: usize, timeout: Duration) -> Result<Vec<Passage>>;

    /// Whether the store reports itself ready to serve
    async fn is_ready(&self) -> Result<bool>;

    /// Backend name for logs and probes
    fn backend(&self) -> &str;
}

/// Create a knowledge store based on configuration
pub fn create_knowledge_store(config: &KnowledgeConfig) -> Result<Arc<dyn KnowledgeStore>> {
    match config.provider.as_str() {
        "weaviate" => Ok(Arc::new(WeaviateStore::new(config)?)),
        "mock" => {
            tracing::warn!("Using mock knowledge store");
            Ok(Arc::new(MockKnowledgeStore::new()))
        }
        other => Err(AppError::Configuration {
            message: format!("unknown knowledge provider `{}`", other),
        }),
    }
}
