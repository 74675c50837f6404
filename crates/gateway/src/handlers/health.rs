//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use innovai_common::errors::{within, AppError};
use serde::Serialize;
use std::time::Instant;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub knowledge_store: CheckResult,
    pub inference: ProviderInfo,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Inference is not probed; a probe would cost a model call
#[derive(Serialize)]
pub struct ProviderInfo {
    pub provider: String,
    pub model: String,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: innovai_common::VERSION.to_string(),
    })
}

/// Readiness probe - reports dependencies, never fails the request
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let start = Instant::now();
    let timeout = state.config.knowledge.timeout();
    let on_timeout = AppError::StoreTimeout {
        timeout_ms: timeout.as_millis() as u64,
    };

    let store_check = match within(timeout, on_timeout, state.store.is_ready()).await {
        Ok(true) => CheckResult {
            status: "up".to_string(),
            backend: state.store.backend().to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Ok(false) => CheckResult {
            status: "down".to_string(),
            backend: state.store.backend().to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: Some("store reports not ready".to_string()),
        },
        Err(e) => CheckResult {
            status: "down".to_string(),
            backend: state.store.backend().to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    let all_healthy = store_check.status == "up";

    Json(ReadyResponse {
        status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks {
            knowledge_store: store_check,
            inference: ProviderInfo {
                provider: state.config.inference.provider.clone(),
                model: state.config.inference.deployment.clone(),
            },
        },
    })
}
