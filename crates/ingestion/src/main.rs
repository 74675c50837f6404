//! InnovAI Ingestion
//!
//! Loads company documents into the knowledge store ahead of time:
//! 1. Reads documents from a JSON file, or uses the built-in samples
//! 2. Checks that the store is ready
//! 3. Inserts each document, retrying transient failures
//! 4. Reports how many succeeded
//!
//! Usage: `ingestion [--file <path.json>]`

mod documents;
mod errors;
mod uploader;

use anyhow::Context;
use errors::IngestionError;
use innovai_common::{
    config::{AppConfig, KnowledgeConfig},
    knowledge::WeaviateStore,
    KnowledgeStore, VERSION,
};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uploader::Uploader;

/// Insert retries per document
const MAX_RETRIES: u32 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting InnovAI Ingestion v{}", VERSION);

    let file = parse_args(std::env::args().skip(1))?;
    let documents = match &file {
        Some(path) => {
            info!(path = %path.display(), "Loading documents from file");
            documents::load_documents(path).await?
        }
        None => {
            info!("No --file given, uploading built-in sample documents");
            documents::sample_documents()
        }
    };

    let store = connect_store(&config.knowledge).await.map_err(|e| {
        error!(error = %e, "Knowledge store unavailable, check its configuration");
        e
    })?;

    let summary = Uploader::new(store, MAX_RETRIES).upload_all(&documents).await;

    info!(
        uploaded = summary.uploaded,
        failed = summary.failed,
        total = documents.len(),
        "Document upload completed"
    );

    Ok(())
}

/// Build the Weaviate client; a store that is not ready fails the run
async fn connect_store(config: &KnowledgeConfig) -> Result<WeaviateStore, IngestionError> {
    if config.provider != "weaviate" {
        return Err(IngestionError::ConfigError(format!(
            "ingestion needs the weaviate provider, got `{}`",
            config.provider
        )));
    }
    let store = WeaviateStore::new(config)?;

    info!(url = store.base_url(), "Checking knowledge store");
    if !store.is_ready().await? {
        return Err(IngestionError::StoreNotReady);
    }

    Ok(store)
}

/// `--file <path>` is the only option
fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<PathBuf>, IngestionError> {
    let mut file = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--file" | "-f" => {
                let path = args
                    .next()
                    .ok_or_else(|| IngestionError::ConfigError("--file needs a path".to_string()))?;
                file = Some(PathBuf::from(path));
            }
            other => {
                return Err(IngestionError::ConfigError(format!("unknown argument `{}`", other)));
            }
        }
    }

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use innovai_common::errors::AppError;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_no_args_uses_samples() {
        assert_eq!(parse_args(args(&[])).unwrap(), None);
    }

    #[test]
    fn test_file_arg() {
        assert_eq!(
            parse_args(args(&["--file", "docs.json"])).unwrap(),
            Some(PathBuf::from("docs.json"))
        );
    }

    #[tokio::test]
    async fn test_connect_requires_weaviate_provider() {
        let config = KnowledgeConfig {
            provider: "mock".to_string(),
            ..KnowledgeConfig::default()
        };
        let result = connect_store(&config).await;
        assert!(matches!(result, Err(IngestionError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_connect_surfaces_store_errors() {
        let config = KnowledgeConfig {
            url: None,
            ..KnowledgeConfig::default()
        };
        let result = connect_store(&config).await;
        assert!(matches!(
            result,
            Err(IngestionError::Store(AppError::Configuration { .. }))
        ));
    }

    #[test]
    fn test_bad_args() {
        assert!(parse_args(args(&["--file"])).is_err());
        assert!(parse_args(args(&["--verbose"])).is_err());
    }
}
