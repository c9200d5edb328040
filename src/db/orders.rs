//! Order placement and order history.

use tracing::info;
use uuid::Uuid;

use super::cart::lock_lines;
use super::{
    CheckoutRequest, DbPool, Order, OrderDetail, OrderDraft, OrderItem, OrderStatus, OrderSummary,
    SaleLine,
};
use crate::error::ApiError;

/// Turn the buyer's cart into an order.
///
/// Reading the cart, writing the order with its items and emptying the cart
/// happen in one transaction; any failure rolls the whole thing back.
pub async fn place_order(
    pool: &DbPool,
    buyer_id: Uuid,
    checkout: &CheckoutRequest,
) -> Result<Order, ApiError> {
    let mut tx = pool.begin().await?;

    let lines = lock_lines(&mut tx, buyer_id).await?;
    let draft = OrderDraft::from_cart(&lines)?;
    draft.confirm_total(checkout.expected_total)?;

    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (id, buyer_id, total, status, shipping_address, contact_phone)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(buyer_id)
    .bind(draft.total)
    .bind(OrderStatus::Pending.as_str())
    .bind(checkout.shipping_address.trim())
    .bind(checkout.contact_phone.trim())
    .fetch_one(&mut *tx)
    .await?;

    for line in &draft.lines {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, seller_id, product_name, price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(line.product_id)
        .bind(line.seller_id)
        .bind(&line.product_name)
        .bind(line.price)
        .bind(line.quantity)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("DELETE FROM cart WHERE buyer_id = $1")
        .bind(buyer_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        order_id = %order.id,
        buyer_id = %buyer_id,
        items = draft.lines.len(),
        total = order.total,
        "Order placed"
    );

    Ok(order)
}

pub async fn list_for_buyer(pool: &DbPool, buyer_id: Uuid) -> Result<Vec<OrderSummary>, ApiError> {
    let orders = sqlx::query_as::<_, OrderSummary>(
        r#"
        SELECT o.*,
               COALESCE((SELECT SUM(quantity) FROM order_items WHERE order_id = o.id), 0)::BIGINT
                   AS item_count
        FROM orders o
        WHERE o.buyer_id = $1
        ORDER BY o.created_at DESC
        "#,
    )
    .bind(buyer_id)
    .fetch_all(pool)
    .await?;
    Ok(orders)
}

pub async fn find_for_buyer(
    pool: &DbPool,
    buyer_id: Uuid,
    order_id: Uuid,
) -> Result<Option<OrderDetail>, ApiError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND buyer_id = $2")
        .bind(order_id)
        .bind(buyer_id)
        .fetch_optional(pool)
        .await?;

    let Some(order) = order else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at, id",
    )
    .bind(order.id)
    .fetch_all(pool)
    .await?;

    Ok(Some(OrderDetail { order, items }))
}

/// Cancel a pending order owned by the buyer.
pub async fn cancel(pool: &DbPool, buyer_id: Uuid, order_id: Uuid) -> Result<Order, ApiError> {
    let cancelled = sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders SET status = $3, updated_at = NOW()
        WHERE id = $1 AND buyer_id = $2 AND status = $4
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(buyer_id)
    .bind(OrderStatus::Cancelled.as_str())
    .bind(OrderStatus::Pending.as_str())
    .fetch_optional(pool)
    .await?;

    if let Some(order) = cancelled {
        info!(order_id = %order.id, buyer_id = %buyer_id, "Order cancelled");
        return Ok(order);
    }

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1 AND buyer_id = $2)")
            .bind(order_id)
            .bind(buyer_id)
            .fetch_one(pool)
            .await?;

    if exists {
        Err(ApiError::conflict("Only pending orders can be cancelled"))
    } else {
        Err(ApiError::not_found("Order not found"))
    }
}

/// Order items sold by `seller_id`, newest first
pub async fn list_sales(pool: &DbPool, seller_id: Uuid) -> Result<Vec<SaleLine>, ApiError> {
    let sales = sqlx::query_as::<_, SaleLine>(
        r#"
        SELECT o.id AS order_id, o.status AS order_status, o.created_at AS ordered_at,
               u.name AS buyer_name, oi.product_name, oi.price, oi.quantity
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        JOIN users u ON u.id = o.buyer_id
        WHERE oi.seller_id = $1
        ORDER BY o.created_at DESC, oi.id
        "#,
    )
    .bind(seller_id)
    .fetch_all(pool)
    .await?;
    Ok(sales)
}
