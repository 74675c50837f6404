//! OpenAI-compatible chat completions client
//!
//! Serves both Azure OpenAI deployments and the OpenAI API. Classification
//! forces a single function tool whose arguments carry the label.

use super::{InferenceClient, LabelSchema, StructuredLabel};
use crate::config::InferenceConfig;
use crate::errors::{within, AppError, Result};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use serde::Deserialize;
use std::time::Duration;

/// Which dialect of the chat-completions API to speak
#[derive(Debug, Clone, PartialEq)]
pub enum ApiFlavor {
    /// `{endpoint}/openai/deployments/{deployment}/chat/completions`, `api-key` header
    Azure { api_version: String },
    /// `{endpoint}/chat/completions`, bearer token, model in the body
    OpenAi,
}

/// Chat completions client shared by every request
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    flavor: ApiFlavor,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    classification_temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

impl ChatCompletionsClient {
    /// Create a new client from configuration
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "inference.endpoint is required".to_string(),
            })?
            .trim_end_matches('/');

        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "inference.api_key is required".to_string(),
        })?;

        let flavor = match config.provider.as_str() {
            "openai" => ApiFlavor::OpenAi,
            _ => ApiFlavor::Azure {
                api_version: config.api_version.clone(),
            },
        };

        let url = match &flavor {
            ApiFlavor::Azure { api_version } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint, config.deployment, api_version
            ),
            ApiFlavor::OpenAi => format!("{}/chat/completions", endpoint),
        };

        // Per-attempt ceiling; callers bound the whole call more tightly
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            flavor,
            url,
            api_key,
            model: config.deployment.clone(),
            temperature: config.temperature,
            classification_temperature: config.classification_temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    /// Request URL for this deployment
    pub fn url(&self) -> &str {
        &self.url
    }

    fn base_body(&self, prompt: &str, temperature: f32) -> serde_json::Value {
        let mut body = serde_json::json!({
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": temperature,
            "max_tokens": self.max_tokens,
        });

        if self.flavor == ApiFlavor::OpenAi {
            body["model"] = serde_json::json!(self.model);
        }

        body
    }

    fn classification_body(&self, prompt: &str, schema: &LabelSchema) -> serde_json::Value {
        let mut body = self.base_body(prompt, self.classification_temperature);
        body["tools"] = serde_json::json!([{
            "type": "function",
            "function": {
                "name": schema.name,
                "description": schema.description,
                "parameters": schema.parameters(),
            }
        }]);
        body["tool_choice"] = serde_json::json!({
            "type": "function",
            "function": { "name": schema.name }
        });
        body
    }

    fn generation_body(&self, prompt: &str) -> serde_json::Value {
        self.base_body(prompt, self.temperature)
    }

    /// Send with retry on transient failures
    async fn send(&self, body: &serde_json::Value) -> Result<ChatResponse> {
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        let mut attempt = 0u32;
        retry(policy, || {
            attempt += 1;
            let this_attempt = attempt;
            async move {
                match self.send_once(body).await {
                    Ok(response) => Ok(response),
                    Err(e) if e.is_transient() && this_attempt <= self.max_retries => {
                        tracing::warn!(
                            attempt = this_attempt,
                            max_retries = self.max_retries,
                            error = %e,
                            "Inference request failed, retrying"
                        );
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<ChatResponse> {
        let request = self.client.post(&self.url).json(body);
        let request = match &self.flavor {
            ApiFlavor::Azure { .. } => request.header("api-key", &self.api_key),
            ApiFlavor::OpenAi => request.bearer_auth(&self.api_key),
        };

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Inference {
                message: format!("API error {}: {}", status, body),
                status: Some(status.as_u16()),
            });
        }

        let response = response.json::<ChatResponse>().await.map_err(|e| AppError::Inference {
            message: format!("Failed to parse response: {}", e),
            status: None,
        })?;

        Ok(response)
    }
}

fn parse_label(response: ChatResponse, schema: &LabelSchema) -> Result<StructuredLabel> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| AppError::StructuredOutput {
            message: "response has no choices".to_string(),
        })?;

    if let Some(refusal) = message.refusal {
        return Err(AppError::StructuredOutput {
            message: format!("model refused: {}", refusal),
        });
    }

    let call = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .find(|call| call.function.name == schema.name)
        .ok_or_else(|| AppError::StructuredOutput {
            message: format!("no `{}` tool call in response", schema.name),
        })?;

    schema.validate(&call.function.arguments)
}

fn parse_text(response: ChatResponse) -> Result<String> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AppError::Inference {
            message: "Empty response from model".to_string(),
            status: None,
        });
    }

    Ok(text)
}

fn timeout_error(timeout: Duration) -> AppError {
    AppError::InferenceTimeout {
        timeout_ms: timeout.as_millis() as u64,
    }
}

#[async_trait]
impl InferenceClient for ChatCompletionsClient {
    async fn classify(
        &self,
        prompt: &str,
        schema: &LabelSchema,
        timeout: Duration,
    ) -> Result<StructuredLabel> {
        let body = self.classification_body(prompt, schema);
        let response = within(timeout, timeout_error(timeout), self.send(&body)).await?;
        parse_label(response, schema)
    }

    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String> {
        let body = self.generation_body(prompt);
        let response = within(timeout, timeout_error(timeout), self.send(&body)).await?;
        parse_text(response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
