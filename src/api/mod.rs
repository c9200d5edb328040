//! JSON actions under `/api`.
//!
//! Every response uses the `{success, data}` / `{success, error}` envelope.

pub mod auth;
mod cart;
pub mod metrics;
mod orders;
pub mod products;
pub mod rate_limit;
pub mod uploads;
pub mod validation;

pub use cart::add_item;
pub use orders::checkout_cart;

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::{ok, ApiError};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: bool,
    pub storage: bool,
    pub version: &'static str,
}

/// Largest multipart body accepted: every image at the size limit plus form fields
pub fn upload_body_limit(state: &AppState) -> usize {
    state.config.storage.max_file_bytes * state.config.storage.max_images + 64 * 1024
}

pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let seller_routes = Router::new()
        .route("/products", get(products::list_own).post(products::create))
        .route(
            "/products/:id",
            put(products::update).delete(products::delete),
        )
        .route("/products/:id/active", post(products::set_active))
        .route("/stats", get(products::stats))
        .route("/sales", get(products::sales));

    Router::new()
        .nest("/auth", auth_routes)
        .route("/products", get(products::browse))
        .route("/products/:id", get(products::get_product))
        .nest("/seller", seller_routes)
        .route(
            "/uploads",
            post(uploads::upload_images).layer(DefaultBodyLimit::max(upload_body_limit(&state))),
        )
        .route("/cart", get(cart::get_cart).post(cart::add))
        .route("/cart/:id", put(cart::update).delete(cart::remove))
        .route("/orders", get(orders::list).post(orders::checkout))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/cancel", post(orders::cancel))
        .layer(middleware::from_fn_with_state(
            state,
            rate_limit::rate_limit_api,
        ))
        .route("/health", get(health))
        .fallback(not_found)
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = crate::db::ping(&state.db).await;
    let storage = state.images.is_available().await;
    ok(HealthStatus {
        status: if database { "ok" } else { "degraded" },
        database,
        storage,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn not_found() -> ApiError {
    ApiError::not_found("No such endpoint")
}
