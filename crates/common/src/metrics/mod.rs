//! Metrics and observability utilities
//!
//! Provides Prometheus metric descriptions and recording helpers
//! with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all InnovAI metrics
pub const METRICS_PREFIX: &str = "innovai";

/// Histogram buckets for model and store calls (in seconds)
pub const UPSTREAM_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Orchestrator metrics
    describe_counter!(
        format!("{}_classifications_total", METRICS_PREFIX),
        Unit::Count,
        "Query classifications by label and outcome"
    );

    describe_counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        Unit::Count,
        "Knowledge store searches by outcome"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Knowledge store search latency in seconds"
    );

    describe_histogram!(
        format!("{}_retrieved_passages", METRICS_PREFIX),
        Unit::Count,
        "Passages returned per search"
    );

    describe_counter!(
        format!("{}_generations_total", METRICS_PREFIX),
        Unit::Count,
        "Answer generations by node and outcome"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Answer generation latency in seconds"
    );

    describe_counter!(
        format!("{}_answers_total", METRICS_PREFIX),
        Unit::Count,
        "Completed answers by path"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

fn outcome(success: bool) -> &'static str {
    if success { "success" } else { "fallback" }
}

/// Helper to record a classification; `fallback` when the default label was used
pub fn record_classification(label: &str, success: bool) {
    counter!(
        format!("{}_classifications_total", METRICS_PREFIX),
        "label" => label.to_string(),
        "outcome" => outcome(success)
    )
    .increment(1);
}

/// Helper to record a knowledge store search
pub fn record_retrieval(duration_secs: f64, passages: usize, success: bool) {
    counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        "outcome" => outcome(success)
    )
    .increment(1);

    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    if success {
        histogram!(format!("{}_retrieved_passages", METRICS_PREFIX)).record(passages as f64);
    }
}

/// Helper to record an answer generation
pub fn record_generation(node: &str, duration_secs: f64, success: bool) {
    counter!(
        format!("{}_generations_total", METRICS_PREFIX),
        "node" => node.to_string(),
        "outcome" => outcome(success)
    )
    .increment(1);

    histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        "node" => node.to_string()
    )
    .record(duration_secs);
}

/// Helper to record a finished answer
pub fn record_answer(path: &str, fallback: bool) {
    counter!(
        format!("{}_answers_total", METRICS_PREFIX),
        "path" => path.to_string(),
        "fallback" => fallback.to_string()
    )
    .increment(1);
}
