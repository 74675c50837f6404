//! Chat reply handler

use crate::AppState;
use axum::{extract::State, Json};
use innovai_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Longest message accepted, in characters
pub const MAX_MESSAGE_CHARS: u64 = 4000;

/// Reply request
#[derive(Debug, Deserialize, Validate)]
pub struct ReplyRequest {
    #[serde(default)]
    #[validate(length(max = MAX_MESSAGE_CHARS))]
    pub message: String,

    /// Return the greeting without running the orchestrator
    #[serde(default, rename = "isFirstMessage")]
    pub is_first_message: bool,
}

/// Reply response; `success` is false when fallback text was substituted
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyResponse {
    pub message: String,
    pub success: bool,
}

/// Answer one chat message
pub async fn reply(
    State(state): State<AppState>,
    Json(request): Json<ReplyRequest>,
) -> Result<Json<ReplyResponse>> {
    if request.is_first_message {
        return Ok(Json(ReplyResponse {
            message: state.orchestrator.greeting().to_string(),
            success: true,
        }));
    }

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("message".to_string()),
    })?;

    if request.message.trim().is_empty() {
        return Err(AppError::MissingField {
            field: "message".to_string(),
        });
    }

    let answer = tokio::time::timeout(
        state.config.request_timeout(),
        state.orchestrator.answer_cancellable(&request.message, &state.shutdown),
    )
    .await;

    let response = match answer {
        Ok(Some(answer)) => ReplyResponse {
            message: answer.text,
            success: !answer.fallback,
        },
        Ok(None) => {
            tracing::warn!("Reply abandoned during shutdown");
            fallback(&state)
        }
        Err(_) => {
            tracing::warn!(
                timeout_secs = state.config.server.request_timeout_secs,
                "Reply exceeded request timeout"
            );
            fallback(&state)
        }
    };

    Ok(Json(response))
}

fn fallback(state: &AppState) -> ReplyResponse {
    ReplyResponse {
        message: state.orchestrator.fallback().to_string(),
        success: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use innovai_common::inference::MockInferenceClient;
    use innovai_common::knowledge::MockKnowledgeStore;
    use innovai_common::AppConfig;
    use std::sync::Arc;

    fn state(client: MockInferenceClient) -> AppState {
        AppState::new(
            AppConfig::default(),
            Arc::new(client),
            Arc::new(MockKnowledgeStore::new()),
        )
    }

    fn request(message: &str, first: bool) -> Json<ReplyRequest> {
        Json(ReplyRequest {
            message: message.to_string(),
            is_first_message: first,
        })
    }

    #[tokio::test]
    async fn test_first_message_returns_greeting() {
        let Json(response) = reply(State(state(MockInferenceClient::new())), request("", true))
            .await
            .unwrap();
        assert_eq!(response.message, "Hello! I'm Innov AI. How may I help you today?");
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let result = reply(State(state(MockInferenceClient::new())), request("   ", false)).await;
        assert!(matches!(result, Err(AppError::MissingField { .. })));
    }

    #[tokio::test]
    async fn test_oversize_message_rejected() {
        let long = "a".repeat(MAX_MESSAGE_CHARS as usize + 1);
        let result = reply(State(state(MockInferenceClient::new())), request(&long, false)).await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_fallback_answer_reports_failure() {
        let client = MockInferenceClient::new().failing_generation();
        let Json(response) = reply(State(state(client)), request("What is the weather?", false))
            .await
            .unwrap();
        assert!(!response.success);
        assert!(response.message.contains("info@innovites.com"));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_reply() {
        let state = state(MockInferenceClient::new().with_delay(std::time::Duration::from_secs(5)));
        state.shutdown.cancel();

        let Json(response) = reply(State(state), request("What is InnoVites?", false))
            .await
            .unwrap();
        assert!(!response.success);
    }
}
