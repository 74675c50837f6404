//! Terminal nodes: grounded and direct answer generation
//!
//! Both always produce a message. A failed, timed-out or blank model call
//! is replaced by the fixed fallback text.

use super::prompts::Prompts;
use super::state::ChatMessage;
use crate::errors::{within, AppError};
use crate::inference::InferenceClient;
use crate::knowledge::Passage;
use crate::metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Output of a terminal node
#[derive(Debug, Clone)]
pub struct Generated {
    pub message: ChatMessage,
    pub fallback: bool,
}

/// Shared call-or-fallback policy
struct Generation {
    client: Arc<dyn InferenceClient>,
    prompts: Arc<Prompts>,
    timeout: Duration,
}

impl Generation {
    async fn run(&self, node: &'static str, prompt: String) -> Generated {
        let start = Instant::now();
        let on_timeout = AppError::InferenceTimeout {
            timeout_ms: self.timeout.as_millis() as u64,
        };

        let result = within(self.timeout, on_timeout, self.client.generate(&prompt, self.timeout)).await;
        let elapsed = start.elapsed();

        match result {
            Ok(text) if !text.trim().is_empty() => {
                tracing::debug!(
                    node,
                    model = self.client.model_name(),
                    latency_ms = elapsed.as_millis() as u64,
                    "Answer generated"
                );
                metrics::record_generation(node, elapsed.as_secs_f64(), true);
                Generated {
                    message: ChatMessage::assistant(text.trim()),
                    fallback: false,
                }
            }
            other => {
                match other {
                    Err(e) => tracing::warn!(node, error = %e, "Generation failed, using fallback answer"),
                    Ok(_) => tracing::warn!(node, "Model returned blank text, using fallback answer"),
                }
                metrics::record_generation(node, elapsed.as_secs_f64(), false);
                Generated {
                    message: ChatMessage::assistant(self.prompts.fallback()),
                    fallback: true,
                }
            }
        }
    }
}

/// Answers from retrieved passages
pub struct GroundedGenerator {
    inner: Generation,
}

impl GroundedGenerator {
    pub fn new(client: Arc<dyn InferenceClient>, prompts: Arc<Prompts>, timeout: Duration) -> Self {
        Self {
            inner: Generation { client, prompts, timeout },
        }
    }

    /// `passages` may be empty; the prompt then states that no context exists
    pub async fn run(&self, query: &str, passages: &[Passage]) -> Generated {
        let prompt = self.inner.prompts.grounded(query, passages);
        self.inner.run("grounded", prompt).await
    }
}

/// Answers with no retrieved context
pub struct DirectGenerator {
    inner: Generation,
}

impl DirectGenerator {
    pub fn new(client: Arc<dyn InferenceClient>, prompts: Arc<Prompts>, timeout: Duration) -> Self {
        Self {
            inner: Generation { client, prompts, timeout },
        }
    }

    pub async fn run(&self, query: &str) -> Generated {
        let prompt = self.inner.prompts.direct(query);
        self.inner.run("direct", prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssistantConfig;
    use crate::inference::MockInferenceClient;

    fn prompts() -> Arc<Prompts> {
        Arc::new(Prompts::new(AssistantConfig::default()))
    }

    #[tokio::test]
    async fn test_grounded_answer_carries_context() {
        let client = Arc::new(MockInferenceClient::new());
        let node = GroundedGenerator::new(client.clone(), prompts(), Duration::from_secs(1));
        let passages = vec![Passage {
            text: "cableCORE DDM speeds up inquiry-to-quote.".into(),
            source_id: "d1".into(),
            relevance_score: 0.8,
        }];

        let out = node.run("What is cableCORE DDM?", &passages).await;
        assert!(!out.fallback);
        assert!(out.message.content.contains("cableCORE DDM speeds up inquiry-to-quote."));
        assert_eq!(client.generate_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_yields_fallback() {
        let client = Arc::new(MockInferenceClient::new().failing_generation());
        let node = DirectGenerator::new(client, prompts(), Duration::from_secs(1));
        let out = node.run("What is the weather today?").await;
        assert!(out.fallback);
        assert_eq!(out.message.content, AssistantConfig::default().fallback_message);
    }

    #[tokio::test]
    async fn test_blank_output_yields_fallback() {
        let client = Arc::new(MockInferenceClient::new().with_reply("  \n "));
        let node = GroundedGenerator::new(client, prompts(), Duration::from_secs(1));
        let out = node.run("q", &[]).await;
        assert!(out.fallback);
        assert!(!out.message.content.trim().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_yields_fallback() {
        let client = Arc::new(
            MockInferenceClient::new()
                .with_reply("too late")
                .with_delay(Duration::from_secs(5)),
        );
        let node = DirectGenerator::new(client, prompts(), Duration::from_millis(50));
        let out = node.run("q").await;
        assert!(out.fallback);
    }
}
