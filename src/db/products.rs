//! Listing queries.
//!
//! Every write is scoped by `seller_id`, so a seller touching someone
//! else's listing sees the same "not found" as for a missing one.

use sqlx::{Postgres, QueryBuilder};
use std::collections::HashSet;
use uuid::Uuid;

use super::{DbPool, Page, Product, ProductFilter, ProductInput, ProductWithSeller, SellerStats, SortOrder};
use crate::error::ApiError;

fn not_found() -> ApiError {
    ApiError::not_found("Product not found")
}

pub async fn create(pool: &DbPool, seller_id: Uuid, input: &ProductInput) -> Result<Product, ApiError> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (
            id, seller_id, name, description, category, product_type, condition,
            price, images, location, contact_number
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(seller_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.category.as_str())
    .bind(input.product_type.as_str())
    .bind(input.condition.as_str())
    .bind(input.price)
    .bind(&input.images)
    .bind(&input.location)
    .bind(&input.contact_number)
    .fetch_one(pool)
    .await?;

    Ok(product)
}

pub async fn update(
    pool: &DbPool,
    seller_id: Uuid,
    product_id: Uuid,
    input: &ProductInput,
) -> Result<Product, ApiError> {
    sqlx::query_as::<_, Product>(
        r#"
        UPDATE products SET
            name = $3, description = $4, category = $5, product_type = $6,
            condition = $7, price = $8, images = $9, location = $10,
            contact_number = $11, updated_at = NOW()
        WHERE id = $1 AND seller_id = $2
        RETURNING *
        "#,
    )
    .bind(product_id)
    .bind(seller_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.category.as_str())
    .bind(input.product_type.as_str())
    .bind(input.condition.as_str())
    .bind(input.price)
    .bind(&input.images)
    .bind(&input.location)
    .bind(&input.contact_number)
    .fetch_optional(pool)
    .await?
    .ok_or_else(not_found)
}

/// Delete a listing and return the removed row.
pub async fn delete(pool: &DbPool, seller_id: Uuid, product_id: Uuid) -> Result<Product, ApiError> {
    sqlx::query_as::<_, Product>(
        "DELETE FROM products WHERE id = $1 AND seller_id = $2 RETURNING *",
    )
    .bind(product_id)
    .bind(seller_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(not_found)
}

pub async fn set_active(
    pool: &DbPool,
    seller_id: Uuid,
    product_id: Uuid,
    is_active: bool,
) -> Result<Product, ApiError> {
    sqlx::query_as::<_, Product>(
        r#"
        UPDATE products SET is_active = $3, updated_at = NOW()
        WHERE id = $1 AND seller_id = $2
        RETURNING *
        "#,
    )
    .bind(product_id)
    .bind(seller_id)
    .bind(is_active)
    .fetch_optional(pool)
    .await?
    .ok_or_else(not_found)
}

pub async fn find_by_id(pool: &DbPool, id: Uuid) -> Result<Option<ProductWithSeller>, ApiError> {
    let product = sqlx::query_as::<_, ProductWithSeller>(
        r#"
        SELECT p.*, u.name AS seller_name
        FROM products p
        JOIN users u ON u.id = p.seller_id
        WHERE p.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(product)
}

/// A listing only if it belongs to `seller_id`
pub async fn find_owned(pool: &DbPool, seller_id: Uuid, id: Uuid) -> Result<Option<Product>, ApiError> {
    let product = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = $1 AND seller_id = $2",
    )
    .bind(id)
    .bind(seller_id)
    .fetch_optional(pool)
    .await?;
    Ok(product)
}

pub async fn list_by_seller(pool: &DbPool, seller_id: Uuid) -> Result<Vec<Product>, ApiError> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE seller_id = $1 ORDER BY created_at DESC",
    )
    .bind(seller_id)
    .fetch_all(pool)
    .await?;
    Ok(products)
}

/// Most recent active listings for the home page
pub async fn latest(pool: &DbPool, limit: i64) -> Result<Vec<Product>, ApiError> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE is_active = TRUE ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(products)
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Append the `WHERE` clause for a browse filter.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    builder.push(" WHERE is_active = TRUE");

    if let Some(search) = &filter.search {
        let pattern = escape_like(search);
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = filter.category {
        builder.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(product_type) = filter.product_type {
        builder
            .push(" AND product_type = ")
            .push_bind(product_type.as_str());
    }
    if let Some(condition) = filter.condition {
        builder.push(" AND condition = ").push_bind(condition.as_str());
    }
    if let Some(min) = filter.min_price {
        builder.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        builder.push(" AND price <= ").push_bind(max);
    }
    if let Some(location) = &filter.location {
        builder
            .push(" AND location ILIKE ")
            .push_bind(escape_like(location));
    }
}

fn order_clause(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Newest => " ORDER BY created_at DESC, id",
        SortOrder::PriceAsc => " ORDER BY price ASC, created_at DESC",
        SortOrder::PriceDesc => " ORDER BY price DESC, created_at DESC",
    }
}

fn browse_query(filter: &ProductFilter) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new("SELECT * FROM products");
    push_filters(&mut builder, filter);
    builder.push(order_clause(filter.sort));
    builder
        .push(" LIMIT ")
        .push_bind(filter.per_page as i64)
        .push(" OFFSET ")
        .push_bind(filter.offset());
    builder
}

fn count_query(filter: &ProductFilter) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM products");
    push_filters(&mut builder, filter);
    builder
}

/// Public catalogue search over active listings.
pub async fn browse(pool: &DbPool, filter: &ProductFilter) -> Result<Page<Product>, ApiError> {
    let total: i64 = count_query(filter)
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    let items = browse_query(filter)
        .build_query_as::<Product>()
        .fetch_all(pool)
        .await?;

    Ok(Page::new(items, total, filter.page, filter.per_page))
}

pub async fn seller_stats(pool: &DbPool, seller_id: Uuid) -> Result<SellerStats, ApiError> {
    let stats = sqlx::query_as::<_, SellerStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM products WHERE seller_id = $1) AS total_products,
            (SELECT COUNT(*) FROM products WHERE seller_id = $1 AND is_active) AS active_products,
            COALESCE(SUM(oi.quantity), 0)::BIGINT AS units_sold,
            COALESCE(SUM(oi.price * oi.quantity), 0)::BIGINT AS revenue
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE oi.seller_id = $1 AND o.status <> 'cancelled'
        "#,
    )
    .bind(seller_id)
    .fetch_one(pool)
    .await?;
    Ok(stats)
}

/// Number of active listings, for the `products_listed` gauge
pub async fn count_active(pool: &DbPool) -> Result<i64, ApiError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = TRUE")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Every image URL some listing still points at
pub async fn referenced_images(pool: &DbPool) -> Result<HashSet<String>, ApiError> {
    let urls: Vec<String> = sqlx::query_scalar("SELECT DISTINCT unnest(images) FROM products")
        .fetch_all(pool)
        .await?;
    Ok(urls.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Category, Condition};

    #[test]
    fn test_default_filter_sql() {
        let filter = ProductFilter::default();
        let builder = browse_query(&filter);
        assert_eq!(
            builder.sql(),
            "SELECT * FROM products WHERE is_active = TRUE ORDER BY created_at DESC, id LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn test_filters_compose_with_and() {
        let filter = ProductFilter {
            search: Some("lamp".to_string()),
            category: Some(Category::Home),
            condition: Some(Condition::Good),
            min_price: Some(1_000),
            max_price: Some(5_000),
            location: Some("Austin".to_string()),
            sort: SortOrder::PriceAsc,
            page: 2,
            ..Default::default()
        };
        let builder = browse_query(&filter);
        assert_eq!(
            builder.sql(),
            "SELECT * FROM products WHERE is_active = TRUE \
             AND (name ILIKE $1 OR description ILIKE $2) \
             AND category = $3 AND condition = $4 \
             AND price >= $5 AND price <= $6 \
             AND location ILIKE $7 \
             ORDER BY price ASC, created_at DESC LIMIT $8 OFFSET $9"
        );
    }

    #[test]
    fn test_count_query_has_no_paging() {
        let filter = ProductFilter {
            max_price: Some(10_000),
            sort: SortOrder::PriceDesc,
            ..Default::default()
        };
        let builder = count_query(&filter);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM products WHERE is_active = TRUE AND price <= $1"
        );
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("desk"), "%desk%");
        assert_eq!(escape_like("50%_off"), "%50\\%\\_off%");
    }
}
