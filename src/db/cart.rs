//! Cart queries, always scoped to one buyer.

use uuid::Uuid;

use super::{CartItem, CartLine, DbPool, MAX_LINE_QUANTITY};
use crate::error::ApiError;

const CART_LINES_SQL: &str = r#"
    SELECT c.id, c.product_id, c.quantity,
           p.name, p.price, p.images, p.is_active, p.seller_id
    FROM cart c
    JOIN products p ON p.id = c.product_id
    WHERE c.buyer_id = $1
    ORDER BY c.created_at ASC, c.id
"#;

pub async fn list(pool: &DbPool, buyer_id: Uuid) -> Result<Vec<CartLine>, ApiError> {
    let lines = sqlx::query_as::<_, CartLine>(CART_LINES_SQL)
        .bind(buyer_id)
        .fetch_all(pool)
        .await?;
    Ok(lines)
}

/// Add a product to the cart, merging with an existing line.
pub async fn add(
    pool: &DbPool,
    buyer_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> Result<CartItem, ApiError> {
    let product: Option<(bool, Uuid)> =
        sqlx::query_as("SELECT is_active, seller_id FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(pool)
            .await?;

    match product {
        None => return Err(ApiError::not_found("Product not found")),
        Some((false, _)) => {
            return Err(ApiError::conflict("This product is no longer available"))
        }
        Some((true, seller_id)) if seller_id == buyer_id => {
            return Err(ApiError::bad_request("You cannot buy your own listing"))
        }
        Some(_) => {}
    }

    let item = sqlx::query_as::<_, CartItem>(
        r#"
        INSERT INTO cart (id, buyer_id, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (buyer_id, product_id)
        DO UPDATE SET quantity = LEAST(cart.quantity + EXCLUDED.quantity, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(buyer_id)
    .bind(product_id)
    .bind(quantity)
    .bind(MAX_LINE_QUANTITY)
    .fetch_one(pool)
    .await?;

    Ok(item)
}

pub async fn update_quantity(
    pool: &DbPool,
    buyer_id: Uuid,
    cart_id: Uuid,
    quantity: i32,
) -> Result<CartItem, ApiError> {
    sqlx::query_as::<_, CartItem>(
        "UPDATE cart SET quantity = $3 WHERE id = $1 AND buyer_id = $2 RETURNING *",
    )
    .bind(cart_id)
    .bind(buyer_id)
    .bind(quantity)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Cart item not found"))
}

pub async fn remove(pool: &DbPool, buyer_id: Uuid, cart_id: Uuid) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM cart WHERE id = $1 AND buyer_id = $2")
        .bind(cart_id)
        .bind(buyer_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Cart item not found"));
    }
    Ok(())
}

pub async fn clear(pool: &DbPool, buyer_id: Uuid) -> Result<u64, ApiError> {
    let result = sqlx::query("DELETE FROM cart WHERE buyer_id = $1")
        .bind(buyer_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Total units in the cart, for the nav badge
pub async fn count(pool: &DbPool, buyer_id: Uuid) -> Result<i64, ApiError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM cart WHERE buyer_id = $1")
            .bind(buyer_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Cart lines locked for the duration of a checkout transaction
pub(super) async fn lock_lines(
    conn: &mut sqlx::PgConnection,
    buyer_id: Uuid,
) -> Result<Vec<CartLine>, sqlx::Error> {
    let sql = format!("{} FOR UPDATE OF c", CART_LINES_SQL.trim_end());
    sqlx::query_as::<_, CartLine>(&sql)
        .bind(buyer_id)
        .fetch_all(conn)
        .await
}
