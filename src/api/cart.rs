//! Buyer cart actions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Buyer;
use crate::db::{self, AddToCartRequest, CartSummary, UpdateCartRequest};
use crate::error::{ok, ApiError};
use crate::AppState;

use super::validation::validate_quantity;

fn check_quantity(quantity: i32) -> Result<(), ApiError> {
    validate_quantity(quantity).map_err(|e| ApiError::validation_field("quantity", e))
}

/// GET /api/cart
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
) -> Result<impl IntoResponse, ApiError> {
    let lines = db::cart::list(&state.db, buyer.user_id).await?;
    Ok(ok(CartSummary::from_lines(lines)))
}

/// Add to cart with the default quantity of one
pub async fn add_item(
    state: &AppState,
    buyer_id: Uuid,
    req: &AddToCartRequest,
) -> Result<db::CartItem, ApiError> {
    let quantity = req.quantity.unwrap_or(1);
    check_quantity(quantity)?;
    let item = db::cart::add(&state.db, buyer_id, req.product_id, quantity).await?;
    tracing::debug!(buyer_id = %buyer_id, product_id = %req.product_id, quantity = item.quantity, "Cart updated");
    Ok(item)
}

/// POST /api/cart
pub async fn add(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    Json(req): Json<AddToCartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item = add_item(&state, buyer.user_id, &req).await?;
    Ok((StatusCode::CREATED, ok(item)))
}

/// PUT /api/cart/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_quantity(req.quantity)?;
    let item = db::cart::update_quantity(&state.db, buyer.user_id, id, req.quantity).await?;
    Ok(ok(item))
}

/// DELETE /api/cart/:id
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    db::cart::remove(&state.db, buyer.user_id, id).await?;
    Ok(ok(serde_json::json!({ "id": id })))
}
