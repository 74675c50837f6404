//! Retriever node: fetches passages, degrading to none when the store fails

use crate::errors::{within, AppError};
use crate::knowledge::{KnowledgeStore, Passage};
use crate::metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Passages for the grounded generator
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// In the store's order
    pub passages: Vec<Passage>,
    /// False on store error, timeout or an empty result
    pub succeeded: bool,
}

pub struct Retriever {
    store: Arc<dyn KnowledgeStore>,
    top_k: usize,
    timeout: Duration,
}

impl Retriever {
    pub fn new(store: Arc<dyn KnowledgeStore>, top_k: usize, timeout: Duration) -> Self {
        Self { store, top_k, timeout }
    }

    /// Never fails the request
    pub async fn run(&self, query: &str) -> Retrieval {
        let start = Instant::now();
        let on_timeout = AppError::StoreTimeout {
            timeout_ms: self.timeout.as_millis() as u64,
        };

        let result = within(
            self.timeout,
            on_timeout,
            self.store.search(query, self.top_k, self.timeout),
        )
        .await;
        let elapsed = start.elapsed();

        match result {
            Ok(passages) if !passages.is_empty() => {
                tracing::info!(
                    passages = passages.len(),
                    backend = self.store.backend(),
                    latency_ms = elapsed.as_millis() as u64,
                    "Retrieved passages"
                );
                metrics::record_retrieval(elapsed.as_secs_f64(), passages.len(), true);
                Retrieval { passages, succeeded: true }
            }
            Ok(_) => {
                tracing::info!(backend = self.store.backend(), "Knowledge store returned no passages");
                metrics::record_retrieval(elapsed.as_secs_f64(), 0, false);
                Retrieval::default()
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    code = ?e.code(),
                    backend = self.store.backend(),
                    "Retrieval failed, continuing without context"
                );
                metrics::record_retrieval(elapsed.as_secs_f64(), 0, false);
                Retrieval::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::MockKnowledgeStore;

    fn passage(id: &str, score: f32) -> Passage {
        Passage {
            text: format!("text {}", id),
            source_id: id.to_string(),
            relevance_score: score,
        }
    }

    #[tokio::test]
    async fn test_passages_keep_store_order() {
        // Deliberately not sorted by score
        let store = Arc::new(MockKnowledgeStore::new().with_passages(vec![
            passage("a", 0.5),
            passage("b", 0.9),
            passage("c", 0.7),
        ]));
        let node = Retriever::new(store.clone(), 3, Duration::from_secs(1));
        let result = node.run("q").await;

        assert!(result.succeeded);
        let ids: Vec<_> = result.passages.iter().map(|p| p.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(store.last_limit(), 3);
    }

    #[tokio::test]
    async fn test_store_error_degrades_to_empty() {
        let node = Retriever::new(Arc::new(MockKnowledgeStore::new().unavailable()), 3, Duration::from_secs(1));
        let result = node.run("q").await;
        assert!(result.passages.is_empty());
        assert!(!result.succeeded);
    }

    #[tokio::test]
    async fn test_empty_index_is_not_success() {
        let node = Retriever::new(Arc::new(MockKnowledgeStore::new()), 3, Duration::from_secs(1));
        assert!(!node.run("q").await.succeeded);
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let store = MockKnowledgeStore::new()
            .with_passages(vec![passage("a", 0.9)])
            .with_delay(Duration::from_secs(5));
        let node = Retriever::new(Arc::new(store), 3, Duration::from_millis(50));
        let result = node.run("q").await;
        assert!(!result.succeeded);
        assert!(result.passages.is_empty());
    }

    #[tokio::test]
    async fn test_configurable_top_k() {
        let store = Arc::new(MockKnowledgeStore::new().with_passages(vec![passage("a", 0.9)]));
        let node = Retriever::new(store.clone(), 7, Duration::from_secs(1));
        node.run("q").await;
        assert_eq!(store.last_limit(), 7);
    }
}
