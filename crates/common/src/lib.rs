//! InnovAI Common Library
//!
//! Shared code for the InnovAI services including:
//! - Query-processing orchestrator (classify, route, retrieve, generate)
//! - Inference and knowledge store client abstractions
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod inference;
pub mod knowledge;
pub mod metrics;
pub mod orchestrator;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use inference::InferenceClient;
pub use knowledge::{KnowledgeStore, Passage};
pub use orchestrator::{Answer, Orchestrator, OrchestratorSettings};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
