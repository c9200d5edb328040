//! Prometheus metrics: the `/metrics` endpoint, request tracking middleware,
//! and counters for marketplace events.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use crate::db;
use crate::AppState;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const ORDERS_PLACED_TOTAL: &str = "orders_placed_total";
pub const USERS_REGISTERED_TOTAL: &str = "users_registered_total";
pub const PRODUCTS_LISTED: &str = "products_listed";

/// Install the global Prometheus recorder. Call once per process.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(ORDERS_PLACED_TOTAL, "Orders placed through checkout");
    describe_counter!(USERS_REGISTERED_TOTAL, "Accounts created, by role");
    describe_gauge!(PRODUCTS_LISTED, "Active product listings");

    Ok(handle)
}

/// GET /metrics
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Ok(count) = db::products::count_active(&state.db).await {
        gauge!(PRODUCTS_LISTED).set(count as f64);
    }

    match state.metrics_handle.as_ref() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Count requests and time them, labelled by route pattern.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

pub fn record_order_placed() {
    counter!(ORDERS_PLACED_TOTAL).increment(1);
}

pub fn record_user_registered(role: &'static str) {
    counter!(USERS_REGISTERED_TOTAL, "role" => role).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(HTTP_REQUESTS_TOTAL.ends_with("_total"));
        assert!(ORDERS_PLACED_TOTAL.ends_with("_total"));
        assert!(USERS_REGISTERED_TOTAL.ends_with("_total"));
        assert!(HTTP_REQUEST_DURATION_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_order_placed();
        record_user_registered("buyer");
    }
}
