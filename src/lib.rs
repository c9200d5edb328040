pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod startup;
pub mod storage;
pub mod ui;

pub use db::DbPool;

use axum::{middleware, routing::get, Router};
use config::{Config, StorageBackend};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

use crate::api::rate_limit::RateLimiter;
use crate::storage::ImageStore;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub images: Arc<dyn ImageStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, images: Arc<dyn ImageStore>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self {
            config,
            db,
            images,
            rate_limiter,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

/// Pages, JSON actions, uploaded images and static assets
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(api::metrics::metrics_endpoint))
        .route("/static/*path", get(ui::serve_static))
        .merge(ui::create_router(state.clone()))
        .nest("/api", api::api_router(state.clone()));

    if state.config.storage.backend == StorageBackend::Local {
        router = router.nest_service("/uploads", ServeDir::new(state.config.uploads_dir()));
    }

    router
        .layer(middleware::from_fn(api::metrics::metrics_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
