//! Classifier node: labels a query through a schema-constrained model call

use super::prompts::Prompts;
use super::state::{ChatMessage, QueryType};
use crate::errors::{within, AppError, Result};
use crate::inference::{InferenceClient, LabelSchema};
use crate::metrics;
use std::sync::Arc;
use std::time::Duration;

/// Label used whenever classification fails
pub const DEFAULT_QUERY_TYPE: QueryType = QueryType::General;

/// Output of one classification
#[derive(Debug, Clone)]
pub struct Classification {
    pub query_type: QueryType,
    /// Observability only; never read downstream
    pub reasoning: Option<String>,
    /// Conversation-log entry for this step
    pub turn: ChatMessage,
    /// Whether `query_type` is the default rather than the model's label
    pub fallback: bool,
}

pub struct Classifier {
    client: Arc<dyn InferenceClient>,
    prompts: Arc<Prompts>,
    schema: LabelSchema,
    timeout: Duration,
}

impl Classifier {
    pub fn new(client: Arc<dyn InferenceClient>, prompts: Arc<Prompts>, timeout: Duration) -> Self {
        Self {
            client,
            prompts,
            schema: Self::schema(),
            timeout,
        }
    }

    /// The three query types as a forced tool call
    pub fn schema() -> LabelSchema {
        LabelSchema {
            name: "classify_query".to_string(),
            description: "Classify the user query type".to_string(),
            labels: QueryType::ALL.iter().map(|t| t.as_str().to_string()).collect(),
            label_description: "Query type - general for general questions, company for \
                                company or industry specific questions, unknown if undecidable"
                .to_string(),
        }
    }

    async fn classify(&self, query: &str) -> Result<(QueryType, Option<String>, String)> {
        let prompt = self.prompts.classification(query);
        let on_timeout = AppError::InferenceTimeout {
            timeout_ms: self.timeout.as_millis() as u64,
        };

        let label = within(
            self.timeout,
            on_timeout,
            self.client.classify(&prompt, &self.schema, self.timeout),
        )
        .await?;

        let query_type = label.label.parse::<QueryType>()?;
        Ok((query_type, label.reasoning, label.raw))
    }

    /// Never fails: any error yields `DEFAULT_QUERY_TYPE`
    pub async fn run(&self, query: &str) -> Classification {
        match self.classify(query).await {
            Ok((query_type, reasoning, raw)) => {
                tracing::info!(
                    query_type = %query_type,
                    reasoning = reasoning.as_deref().unwrap_or(""),
                    "Query classified"
                );
                metrics::record_classification(query_type.as_str(), true);

                Classification {
                    query_type,
                    reasoning,
                    turn: ChatMessage::assistant(raw),
                    fallback: false,
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    default = %DEFAULT_QUERY_TYPE,
                    "Classification failed, using default query type"
                );
                metrics::record_classification(DEFAULT_QUERY_TYPE.as_str(), false);

                Classification {
                    query_type: DEFAULT_QUERY_TYPE,
                    reasoning: None,
                    turn: ChatMessage::system(format!(
                        "classification unavailable ({}); defaulted to {}",
                        e.code().as_code(),
                        DEFAULT_QUERY_TYPE
                    )),
                    fallback: true,
                }
            }
        }
    }
}
