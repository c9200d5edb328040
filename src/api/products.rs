//! Catalogue and seller listing actions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::{MaybeSession, Seller};
use crate::db::{self, BrowseQuery, Product, ProductRequest, SetActiveRequest};
use crate::error::{ok, ApiError};
use crate::storage::{check_image_owner, delete_images};
use crate::AppState;

use super::validation::{parse_browse_query, validate_product};

/// GET /api/products
pub async fn browse(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BrowseQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = parse_browse_query(&query)?;
    let page = db::products::browse(&state.db, &filter).await?;
    Ok(ok(page))
}

/// GET /api/products/:id
///
/// Deactivated listings are only visible to their seller.
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    MaybeSession(session): MaybeSession,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = db::products::find_by_id(&state.db, id)
        .await?
        .filter(|p| {
            p.product.is_active
                || session
                    .as_ref()
                    .is_some_and(|s| s.user_id == p.product.seller_id)
        })
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(ok(product))
}

/// GET /api/seller/products
pub async fn list_own(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
) -> Result<impl IntoResponse, ApiError> {
    let products = db::products::list_by_seller(&state.db, seller.user_id).await?;
    Ok(ok(products))
}

/// POST /api/seller/products
pub async fn create(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
    Json(req): Json<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = create_listing(&state, seller.user_id, &req).await?;
    Ok((StatusCode::CREATED, ok(product)))
}

/// Validate and insert a new listing. Stored images must be the seller's own.
pub async fn create_listing(
    state: &AppState,
    seller_id: Uuid,
    req: &ProductRequest,
) -> Result<Product, ApiError> {
    let input = validate_product(req, state.config.storage.max_images)?;
    check_image_owner(state.images.as_ref(), seller_id, &input.images)?;
    let product = db::products::create(&state.db, seller_id, &input).await?;
    info!(product_id = %product.id, seller_id = %seller_id, "Listing created");
    Ok(product)
}

/// Images dropped by an edit, to be removed from storage
pub fn removed_images(before: &[String], after: &[String]) -> Vec<String> {
    before
        .iter()
        .filter(|url| !after.contains(url))
        .cloned()
        .collect()
}

/// Apply a validated edit and clean up images that are no longer used.
pub async fn update_listing(
    state: &AppState,
    seller_id: Uuid,
    product_id: Uuid,
    req: &ProductRequest,
) -> Result<Product, ApiError> {
    let input = validate_product(req, state.config.storage.max_images)?;
    let existing = db::products::find_owned(&state.db, seller_id, product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    // Photos the listing already had stay acceptable
    check_image_owner(
        state.images.as_ref(),
        seller_id,
        &removed_images(&input.images, &existing.images),
    )?;

    let product = db::products::update(&state.db, seller_id, product_id, &input).await?;
    delete_images(
        state.images.as_ref(),
        seller_id,
        &removed_images(&existing.images, &product.images),
    )
    .await;

    info!(product_id = %product.id, seller_id = %seller_id, "Listing updated");
    Ok(product)
}

/// Delete a listing and its stored images.
pub async fn delete_listing(state: &AppState, seller_id: Uuid, product_id: Uuid) -> Result<Product, ApiError> {
    let product = db::products::delete(&state.db, seller_id, product_id).await?;
    delete_images(state.images.as_ref(), seller_id, &product.images).await;
    info!(product_id = %product.id, seller_id = %seller_id, "Listing deleted");
    Ok(product)
}

/// PUT /api/seller/products/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
    Path(id): Path<Uuid>,
    Json(req): Json<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = update_listing(&state, seller.user_id, id, &req).await?;
    Ok(ok(product))
}

/// DELETE /api/seller/products/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = delete_listing(&state, seller.user_id, id).await?;
    Ok(ok(serde_json::json!({ "id": product.id })))
}

/// POST /api/seller/products/:id/active
pub async fn set_active(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
    Path(id): Path<Uuid>,
    Json(req): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = db::products::set_active(&state.db, seller.user_id, id, req.is_active).await?;
    info!(product_id = %product.id, is_active = product.is_active, "Listing visibility changed");
    Ok(ok(product))
}

/// GET /api/seller/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
) -> Result<impl IntoResponse, ApiError> {
    let stats = db::products::seller_stats(&state.db, seller.user_id).await?;
    Ok(ok(stats))
}

/// GET /api/seller/sales
pub async fn sales(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
) -> Result<impl IntoResponse, ApiError> {
    let sales = db::orders::list_sales(&state.db, seller.user_id).await?;
    Ok(ok(sales))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_images() {
        let before = vec!["/uploads/a.jpg".to_string(), "/uploads/b.jpg".to_string()];
        let after = vec!["/uploads/b.jpg".to_string(), "/uploads/c.jpg".to_string()];
        assert_eq!(removed_images(&before, &after), vec!["/uploads/a.jpg".to_string()]);
        assert!(removed_images(&after, &after).is_empty());
    }
}
