//! Mock inference client for local runs and tests

use super::{InferenceClient, LabelSchema, StructuredLabel, LABEL_FIELD, REASONING_FIELD};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Classification {
    /// Tool-call arguments handed to schema validation
    Arguments(String),
    Fail,
}

/// In-process stand-in for the hosted model
///
/// Classification returns a configured label through the same schema
/// validation the real client uses. Generation echoes the prompt unless a
/// fixed reply is set, so grounded answers visibly carry their context.
pub struct MockInferenceClient {
    classification: Classification,
    reply: Option<String>,
    fail_generation: bool,
    delay: Duration,
    classify_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockInferenceClient {
    /// Classifies everything as `general` and echoes prompts
    pub fn new() -> Self {
        Self {
            classification: Classification::Arguments(arguments("general")),
            reply: None,
            fail_generation: false,
            delay: Duration::ZERO,
            classify_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.classification = Classification::Arguments(arguments(label));
        self
    }

    /// Return these tool-call arguments verbatim
    pub fn with_raw_arguments(mut self, raw: &str) -> Self {
        self.classification = Classification::Arguments(raw.to_string());
        self
    }

    pub fn failing_classification(mut self) -> Self {
        self.classification = Classification::Fail;
        self
    }

    pub fn with_reply(mut self, reply: &str) -> Self {
        self.reply = Some(reply.to_string());
        self
    }

    pub fn failing_generation(mut self) -> Self {
        self.fail_generation = true;
        self
    }

    /// Sleep before answering any call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn record(&self, prompt: &str) {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
    }
}

impl Default for MockInferenceClient {
    fn default() -> Self {
        Self::new()
    }
}

fn arguments(label: &str) -> String {
    serde_json::json!({
        LABEL_FIELD: label,
        REASONING_FIELD: "mock classification",
    })
    .to_string()
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn classify(
        &self,
        prompt: &str,
        schema: &LabelSchema,
        _timeout: Duration,
    ) -> Result<StructuredLabel> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        self.record(prompt);
        tokio::time::sleep(self.delay).await;

        match &self.classification {
            Classification::Arguments(raw) => schema.validate(raw),
            Classification::Fail => Err(AppError::Inference {
                message: "mock classification failure".to_string(),
                status: Some(503),
            }),
        }
    }

    async fn generate(&self, prompt: &str, _timeout: Duration) -> Result<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.record(prompt);
        tokio::time::sleep(self.delay).await;

        if self.fail_generation {
            return Err(AppError::Inference {
                message: "mock generation failure".to_string(),
                status: Some(500),
            });
        }

        Ok(self.reply.clone().unwrap_or_else(|| prompt.to_string()))
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> LabelSchema {
        LabelSchema {
            name: "classify_query".to_string(),
            description: String::new(),
            labels: vec!["general".into(), "company".into(), "unknown".into()],
            label_description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_mock_label_goes_through_schema() {
        let client = MockInferenceClient::new().with_label("company");
        let label = client.classify("q", &schema(), Duration::from_secs(1)).await.unwrap();
        assert_eq!(label.label, "company");
        assert_eq!(client.classify_calls(), 1);

        let client = MockInferenceClient::new().with_label("sports");
        assert!(client.classify("q", &schema(), Duration::from_secs(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_generation_echoes_prompt() {
        let client = MockInferenceClient::new();
        let text = client.generate("Context: cables", Duration::from_secs(1)).await.unwrap();
        assert_eq!(text, "Context: cables");
        assert_eq!(client.prompts(), vec!["Context: cables".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_generation_failure() {
        let client = MockInferenceClient::new().failing_generation();
        assert!(client.generate("x", Duration::from_secs(1)).await.is_err());
        assert_eq!(client.generate_calls(), 1);
    }
}
