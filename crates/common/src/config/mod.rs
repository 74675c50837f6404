//! Configuration management for InnovAI services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{AppError, Result};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Language-model inference endpoint
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Vector knowledge store
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Assistant persona and fixed texts
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Outer bound for a single HTTP request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Grace period before in-flight answers are cancelled on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InferenceConfig {
    /// Inference provider: azure, openai, mock
    #[serde(default = "default_inference_provider")]
    pub provider: String,

    /// Base endpoint (Azure resource URL or OpenAI-compatible API base)
    pub endpoint: Option<String>,

    /// API key
    pub api_key: Option<String>,

    /// Model name, or deployment name for Azure
    #[serde(default = "default_deployment")]
    pub deployment: String,

    /// Azure API version query parameter
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Sampling temperature for answer generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Sampling temperature for the classification call
    #[serde(default = "default_classification_temperature")]
    pub classification_temperature: f32,

    /// Maximum output tokens per generation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Bound for each inference call, retries included
    #[serde(default = "default_inference_timeout")]
    pub timeout_secs: u64,

    /// Retries for transient failures
    #[serde(default = "default_inference_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KnowledgeConfig {
    /// Knowledge store provider: weaviate, mock
    #[serde(default = "default_knowledge_provider")]
    pub provider: String,

    /// Cluster URL; a bare host is given an https scheme
    pub url: Option<String>,

    /// Store API key
    pub api_key: Option<String>,

    /// Key forwarded to the store's text vectorizer
    pub vectorizer_api_key: Option<String>,

    /// Collection (class) holding the passages
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Property holding passage text; ingestion writes it and search selects it
    #[serde(default = "default_text_property")]
    pub text_property: String,

    /// Number of passages the retriever asks for
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Bound for each search call
    #[serde(default = "default_knowledge_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantConfig {
    /// Persona name used in prompts and the greeting
    #[serde(default = "default_assistant_name")]
    pub name: String,

    /// Company the assistant represents
    #[serde(default = "default_company")]
    pub company: String,

    /// One-line description of the company
    #[serde(default = "default_company_description")]
    pub company_description: String,

    /// What counts as a company question, for the classifier
    #[serde(default = "default_company_topics")]
    pub company_topics: String,

    /// Human-support channel offered when an answer cannot be grounded
    #[serde(default = "default_support_contact")]
    pub support_contact: String,

    /// First-message greeting
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Fixed apology-and-redirect text used when no answer can be produced
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_body_bytes() -> usize { 16 * 1024 }
fn default_inference_provider() -> String { "azure".to_string() }
fn default_deployment() -> String { "gpt-4".to_string() }
fn default_api_version() -> String { "2024-02-01".to_string() }
fn default_temperature() -> f32 { 0.7 }
fn default_classification_temperature() -> f32 { 0.0 }
fn default_max_tokens() -> u32 { 800 }
fn default_inference_timeout() -> u64 { 30 }
fn default_inference_retries() -> u32 { 2 }
fn default_knowledge_provider() -> String { "weaviate".to_string() }
fn default_collection() -> String { "Innovites".to_string() }
fn default_text_property() -> String { "content".to_string() }
fn default_top_k() -> usize { 3 }
fn default_knowledge_timeout() -> u64 { 10 }
fn default_assistant_name() -> String { "Innov AI".to_string() }
fn default_company() -> String { "InnoVites".to_string() }
fn default_company_description() -> String {
    "a leading strategic partner for digital transformation in the wire and cable industry".to_string()
}
fn default_company_topics() -> String {
    "InnoVites, our products (CableERP, cableCORE MES, cableCORE DDM, cableCRM), the wire & cable \
     industry, digital transformation in this industry, or related technical topics"
        .to_string()
}
fn default_support_contact() -> String { "info@innovites.com".to_string() }
fn default_greeting() -> String { "Hello! I'm Innov AI. How may I help you today?".to_string() }
fn default_fallback_message() -> String {
    "I apologize, but I encountered an issue. Please contact our customer care team at \
     info@innovites.com for assistance."
        .to_string()
}
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "innovai".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__INFERENCE__API_KEY=...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject configurations that would only fail once requests arrive
    pub fn validate(&self) -> Result<()> {
        if self.inference.provider != "mock" {
            if self.inference.endpoint.as_deref().map_or(true, str::is_empty) {
                return Err(configuration("inference.endpoint is required"));
            }
            if self.inference.api_key.as_deref().map_or(true, str::is_empty) {
                return Err(configuration("inference.api_key is required"));
            }
        }

        if self.knowledge.provider != "mock"
            && self.knowledge.url.as_deref().map_or(true, str::is_empty)
        {
            return Err(configuration("knowledge.url is required"));
        }

        if self.assistant.greeting.trim().is_empty() {
            return Err(configuration("assistant.greeting must not be blank"));
        }
        if self.assistant.fallback_message.trim().is_empty() {
            return Err(configuration("assistant.fallback_message must not be blank"));
        }

        if self.knowledge.top_k == 0 {
            return Err(configuration("knowledge.top_k must be at least 1"));
        }

        if self.inference.timeout_secs == 0
            || self.knowledge.timeout_secs == 0
            || self.server.request_timeout_secs == 0
        {
            return Err(configuration("timeouts must be greater than zero"));
        }

        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl KnowledgeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn configuration(message: &str) -> AppError {
    AppError::Configuration {
        message: message.to_string(),
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: default_inference_provider(),
            endpoint: None,
            api_key: None,
            deployment: default_deployment(),
            api_version: default_api_version(),
            temperature: default_temperature(),
            classification_temperature: default_classification_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_inference_timeout(),
            max_retries: default_inference_retries(),
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            provider: default_knowledge_provider(),
            url: None,
            api_key: None,
            vectorizer_api_key: None,
            collection: default_collection(),
            text_property: default_text_property(),
            top_k: default_top_k(),
            timeout_secs: default_knowledge_timeout(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            company: default_company(),
            company_description: default_company_description(),
            company_topics: default_company_topics(),
            support_contact: default_support_contact(),
            greeting: default_greeting(),
            fallback_message: default_fallback_message(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            inference: InferenceConfig::default(),
            knowledge: KnowledgeConfig::default(),
            assistant: AssistantConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.inference.provider = "mock".to_string();
        config.knowledge.provider = "mock".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.knowledge.top_k, 3);
        assert_eq!(config.knowledge.collection, "Innovites");
        assert_eq!(config.assistant.support_contact, "info@innovites.com");
    }

    #[test]
    fn test_mock_providers_need_no_credentials() {
        assert!(mock_config().validate().is_ok());
    }

    #[test]
    fn test_remote_inference_requires_endpoint_and_key() {
        let mut config = mock_config();
        config.inference.provider = "azure".to_string();
        assert!(matches!(config.validate(), Err(AppError::Configuration { .. })));

        config.inference.endpoint = Some("https://example.openai.azure.com".to_string());
        config.inference.api_key = Some("key".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let mut config = mock_config();
        config.knowledge.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_fixed_texts_rejected() {
        let mut config = mock_config();
        config.assistant.fallback_message = "  ".to_string();
        assert!(matches!(config.validate(), Err(AppError::Configuration { .. })));

        let mut config = mock_config();
        config.assistant.greeting = String::new();
        assert!(matches!(config.validate(), Err(AppError::Configuration { .. })));
    }

    #[test]
    fn test_text_property_defaults_to_content() {
        assert_eq!(AppConfig::default().knowledge.text_property, "content");
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "knowledge": { "provider": "mock", "top_k": 5 }
        }))
        .unwrap();
        assert_eq!(config.knowledge.top_k, 5);
        assert_eq!(config.knowledge.timeout_secs, 10);
        assert_eq!(config.inference.deployment, "gpt-4");
    }
}
