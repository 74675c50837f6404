//! Language-model inference abstraction
//!
//! Two call shapes are offered to the orchestrator:
//! - schema-constrained classification (forced tool call, validated label)
//! - open-ended generation from a fully assembled prompt
//!
//! Implementations:
//! - OpenAI-compatible chat completions (Azure OpenAI or OpenAI)
//! - In-process mock for local runs and tests

mod chat;
mod mock;

pub use chat::{ApiFlavor, ChatCompletionsClient};
pub use mock::MockInferenceClient;

use crate::config::InferenceConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Trait for the hosted language model
///
/// Implementations hold configuration and a connection pool only; they are
/// shared by every in-flight request.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Ask the model for exactly one label from `schema`
    async fn classify(
        &self,
        prompt: &str,
        schema: &LabelSchema,
        timeout: Duration,
    ) -> Result<StructuredLabel>;

    /// Generate free text for an assembled prompt
    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Enumerated-label output schema for a constrained classification call
#[derive(Debug, Clone)]
pub struct LabelSchema {
    /// Tool (function) name the model is forced to call
    pub name: String,

    /// Tool description shown to the model
    pub description: String,

    /// Permitted labels
    pub labels: Vec<String>,

    /// Description of the label argument
    pub label_description: String,
}

/// Argument name carrying the label
pub const LABEL_FIELD: &str = "query_type";

/// Argument name carrying the model's reasoning
pub const REASONING_FIELD: &str = "reasoning";

/// A label guaranteed to be one of the schema's labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredLabel {
    pub label: String,
    pub reasoning: Option<String>,
    /// Raw tool-call arguments as returned by the model
    pub raw: String,
}

impl LabelSchema {
    /// JSON schema of the tool arguments
    pub fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                LABEL_FIELD: {
                    "type": "string",
                    "enum": self.labels,
                    "description": self.label_description,
                },
                REASONING_FIELD: {
                    "type": "string",
                    "description": "Brief reasoning for the classification",
                },
            },
            "required": [LABEL_FIELD, REASONING_FIELD],
            "additionalProperties": false,
        })
    }

    /// Validate raw tool-call arguments against the schema
    pub fn validate(&self, raw: &str) -> Result<StructuredLabel> {
        let arguments: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| AppError::StructuredOutput {
                message: format!("arguments are not JSON: {}", e),
            })?;

        let label = arguments
            .get(LABEL_FIELD)
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::StructuredOutput {
                message: format!("missing `{}` argument", LABEL_FIELD),
            })?;

        if !self.labels.iter().any(|l| l == label) {
            return Err(AppError::StructuredOutput {
                message: format!("label `{}` is not one of {:?}", label, self.labels),
            });
        }

        let reasoning = arguments
            .get(REASONING_FIELD)
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(StructuredLabel {
            label: label.to_string(),
            reasoning,
            raw: raw.to_string(),
        })
    }
}

/// Create an inference client based on configuration
pub fn create_inference_client(config: &InferenceConfig) -> Result<Arc<dyn InferenceClient>> {
    match config.provider.as_str() {
        "azure" | "openai" => Ok(Arc::new(ChatCompletionsClient::new(config)?)),
        "mock" => {
            tracing::warn!("Using mock inference client");
            Ok(Arc::new(MockInferenceClient::new()))
        }
        other => Err(AppError::Configuration {
            message: format!("unknown inference provider `{}`", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> LabelSchema {
        LabelSchema {
            name: "classify_query".to_string(),
            description: "Classify the user query type".to_string(),
            labels: vec!["general".into(), "company".into(), "unknown".into()],
            label_description: "Query type".to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_enumerated_label() {
        let label = schema()
            .validate(r#"{"query_type":"company","reasoning":"asks about the company"}"#)
            .unwrap();
        assert_eq!(label.label, "company");
        assert_eq!(label.reasoning.as_deref(), Some("asks about the company"));
    }

    #[test]
    fn test_validate_rejects_label_outside_enum() {
        let err = schema()
            .validate(r#"{"query_type":"weather","reasoning":"?"}"#)
            .unwrap_err();
        assert!(matches!(err, AppError::StructuredOutput { .. }));
    }

    #[test]
    fn test_validate_rejects_malformed_arguments() {
        assert!(schema().validate("general").is_err());
        assert!(schema().validate(r#"{"reasoning":"no label"}"#).is_err());
        assert!(schema().validate(r#"{"query_type":3}"#).is_err());
    }

    #[test]
    fn test_parameters_enumerate_labels() {
        let params = schema().parameters();
        let labels = params["properties"][LABEL_FIELD]["enum"].as_array().unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(params["required"][0], LABEL_FIELD);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = InferenceConfig {
            provider: "carrier-pigeon".to_string(),
            ..InferenceConfig::default()
        };
        assert!(create_inference_client(&config).is_err());
    }
}
