//! InnovAI API Gateway
//!
//! The HTTP entry point for the chat assistant.
//! Handles:
//! - Chat replies through the query orchestrator
//! - Rate limiting
//! - Health and readiness probes
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    routing::{get, post},
    Router,
};
use innovai_common::{
    config::{AppConfig, ObservabilityConfig},
    errors::{AppError, Result},
    inference::{create_inference_client, InferenceClient},
    knowledge::{create_knowledge_store, KnowledgeStore},
    metrics, Orchestrator, OrchestratorSettings,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn KnowledgeStore>,
    /// Fired once shutdown has waited out its grace period
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Clients are built once here and shared by every request
    pub fn new(
        config: AppConfig,
        inference: Arc<dyn InferenceClient>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Self {
        let settings = OrchestratorSettings::from_config(&config);
        let orchestrator = Orchestrator::new(inference, store.clone(), settings);

        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            store,
            shutdown: CancellationToken::new(),
        }
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config.observability);

    info!("Starting InnovAI API Gateway v{}", innovai_common::VERSION);

    config.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    // Initialize metrics
    init_metrics(&config.observability)?;

    // Initialize upstream clients
    let inference = create_inference_client(&config.inference)?;
    let store = create_knowledge_store(&config.knowledge)?;
    info!(
        inference = %config.inference.provider,
        model = inference.model_name(),
        knowledge = store.backend(),
        "Upstream clients ready"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| AppError::Configuration {
            message: format!("invalid listen address: {}", e),
        })?;
    let grace = config.shutdown_timeout();

    // Create app state
    let state = AppState::new(config, inference, store);
    let shutdown = state.shutdown.clone();

    // Build the router
    let app = create_router(state)?;

    // Start the server
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            cancel_after(shutdown, grace);
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Start the Prometheus exporter; port 0 disables it
fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    metrics::register_metrics();

    if config.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(metrics::UPSTREAM_BUCKETS)
        .and_then(|builder| builder.install())
        .map_err(|e| AppError::Configuration {
            message: format!("failed to start metrics exporter: {}", e),
        })?;

    info!(%addr, service = %config.service_name, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Result<Router> {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new().route("/api/reply", post(handlers::reply::reply));

    if state.config.rate_limit.enabled {
        let limit = middleware::rate_limit::create_rate_limiter(&state.config.rate_limit)?;
        api_routes = api_routes.route_layer(axum::middleware::from_fn_with_state(
            limit,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    let body_limit = state.config.server.max_body_bytes;

    // Compose the app
    Ok(Router::new()
        // Health endpoints (never rate limited)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .merge(api_routes)
        .layer(axum::middleware::from_fn(middleware::metrics::track_metrics))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state))
}

/// Cancel in-flight answers once the grace period runs out
fn cancel_after(token: CancellationToken, grace: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        if !token.is_cancelled() {
            warn!(grace_secs = grace.as_secs(), "Grace period elapsed, cancelling in-flight replies");
            token.cancel();
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use innovai_common::inference::MockInferenceClient;
    use innovai_common::knowledge::{MockKnowledgeStore, Passage};
    use tower::ServiceExt;

    fn app_with(config: AppConfig, client: MockInferenceClient, store: MockKnowledgeStore) -> Router {
        create_router(AppState::new(config, Arc::new(client), Arc::new(store))).unwrap()
    }

    fn app(client: MockInferenceClient, store: MockKnowledgeStore) -> Router {
        app_with(AppConfig::default(), client, store)
    }

    fn reply_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/reply")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(MockInferenceClient::new(), MockKnowledgeStore::new())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_reports_store_down_without_failing() {
        let response = app(MockInferenceClient::new(), MockKnowledgeStore::new().unavailable())
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "not_ready");
        assert_eq!(body["checks"]["knowledge_store"]["status"], "down");
    }

    #[tokio::test]
    async fn test_first_message_greets() {
        let response = app(MockInferenceClient::new(), MockKnowledgeStore::new())
            .oneshot(reply_request(r#"{"message": "", "isFirstMessage": true}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Hello! I'm Innov AI. How may I help you today?");
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_company_reply_is_grounded() {
        let store = MockKnowledgeStore::new().with_passages(vec![Passage {
            text: "InnoVites is a digital transformation partner...".to_string(),
            source_id: "about".to_string(),
            relevance_score: 0.9,
        }]);
        let response = app(MockInferenceClient::new().with_label("company"), store)
            .oneshot(reply_request(r#"{"message": "What is InnoVites?", "isFirstMessage": false}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("InnoVites is a digital transformation partner..."));
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_empty_message_is_bad_request() {
        let response = app(MockInferenceClient::new(), MockKnowledgeStore::new())
            .oneshot(reply_request(r#"{"message": "  ", "isFirstMessage": false}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "MISSING_FIELD");
    }

    #[tokio::test]
    async fn test_rate_limit_returns_429() {
        let mut config = AppConfig::default();
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        let app = app_with(config, MockInferenceClient::new(), MockKnowledgeStore::new());

        let first = app
            .clone()
            .oneshot(reply_request(r#"{"message": "hi", "isFirstMessage": true}"#))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(reply_request(r#"{"message": "hi", "isFirstMessage": true}"#))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_oversize_body_rejected() {
        let mut config = AppConfig::default();
        config.server.max_body_bytes = 64;
        let app = app_with(config, MockInferenceClient::new(), MockKnowledgeStore::new());

        let body = format!(r#"{{"message": "{}", "isFirstMessage": false}}"#, "a".repeat(200));
        let response = app.oneshot(reply_request(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
