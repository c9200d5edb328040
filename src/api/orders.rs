//! Checkout and buyer order history.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Buyer;
use crate::db::{self, CheckoutRequest, Order};
use crate::error::{ok, ApiError};
use crate::AppState;

use super::metrics::record_order_placed;
use super::validation::validate_checkout;

/// Validate checkout input and place the order.
pub async fn checkout_cart(
    state: &AppState,
    buyer_id: Uuid,
    req: &CheckoutRequest,
) -> Result<Order, ApiError> {
    validate_checkout(req)?;
    let order = db::orders::place_order(&state.db, buyer_id, req).await?;
    record_order_placed();
    Ok(order)
}

/// POST /api/orders
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    Json(req): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = checkout_cart(&state, buyer.user_id, &req).await?;
    Ok((StatusCode::CREATED, ok(order)))
}

/// GET /api/orders
pub async fn list(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
) -> Result<impl IntoResponse, ApiError> {
    let orders = db::orders::list_for_buyer(&state.db, buyer.user_id).await?;
    Ok(ok(orders))
}

/// GET /api/orders/:id
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = db::orders::find_for_buyer(&state.db, buyer.user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    Ok(ok(order))
}

/// POST /api/orders/:id/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = db::orders::cancel(&state.db, buyer.user_id, id).await?;
    Ok(ok(order))
}
