//! Mock knowledge store for local runs and tests

use super::{KnowledgeStore, Passage};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub struct MockKnowledgeStore {
    passages: Vec<Passage>,
    unavailable: bool,
    delay: Duration,
    search_calls: AtomicUsize,
    last_limit: AtomicUsize,
}

impl MockKnowledgeStore {
    /// An empty, reachable store
    pub fn new() -> Self {
        Self {
            passages: Vec::new(),
            unavailable: false,
            delay: Duration::ZERO,
            search_calls: AtomicUsize::new(0),
            last_limit: AtomicUsize::new(0),
        }
    }

    /// Serve these passages in this order
    pub fn with_passages(mut self, passages: Vec<Passage>) -> Self {
        self.passages = passages;
        self
    }

    /// Fail every call as an unreachable store
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Limit passed to the most recent search
    pub fn last_limit(&self) -> usize {
        self.last_limit.load(Ordering::SeqCst)
    }
}

impl Default for MockKnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeStore for MockKnowledgeStore {
    async fn search(&self, _query: &str, limit: usize, _timeout: Duration) -> Result<Vec<Passage>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.last_limit.store(limit, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        if self.unavailable {
            return Err(AppError::StoreUnavailable {
                message: "mock store is down".to_string(),
            });
        }

        Ok(self.passages.iter().take(limit).cloned().collect())
    }

    async fn is_ready(&self) -> Result<bool> {
        Ok(!self.unavailable)
    }

    fn backend(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, score: f32) -> Passage {
        Passage {
            text: format!("passage {}", id),
            source_id: id.to_string(),
            relevance_score: score,
        }
    }

    #[tokio::test]
    async fn test_limit_and_order_preserved() {
        let store = MockKnowledgeStore::new()
            .with_passages(vec![passage("a", 0.9), passage("b", 0.8), passage("c", 0.7)]);
        let found = store.search("q", 2, Duration::from_secs(1)).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].source_id, "a");
        assert_eq!(store.last_limit(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_is_distinct_from_empty() {
        let empty = MockKnowledgeStore::new();
        assert!(empty.search("q", 3, Duration::from_secs(1)).await.unwrap().is_empty());

        let down = MockKnowledgeStore::new().unavailable();
        let err = down.search("q", 3, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable { .. }));
        assert!(!down.is_ready().await.unwrap());
    }
}
