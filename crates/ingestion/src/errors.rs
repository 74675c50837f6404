//! Ingestion error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid document file {path}: {message}")]
    InvalidDocuments { path: String, message: String },

    #[error("Knowledge store is not ready")]
    StoreNotReady,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Knowledge store error: {0}")]
    Store(#[from] innovai_common::errors::AppError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
