//! Demo data for local development
//!
//! Creates one seller and one buyer plus a handful of listings so the
//! browse pages have something to show. Safe to run repeatedly.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::hash_password;

pub const DEMO_PASSWORD: &str = "retrade123";
pub const DEMO_SELLER_EMAIL: &str = "seller@retrade.local";
pub const DEMO_BUYER_EMAIL: &str = "buyer@retrade.local";

async fn ensure_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    phone: &str,
    user_type: &str,
    password_hash: &str,
) -> Result<Uuid> {
    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, phone, user_type)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(phone)
    .bind(user_type)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to create demo user {}", email))?;

    let id: Uuid = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

/// Seed demo accounts and listings (listings only if the seller has none)
pub async fn seed_demo_data(pool: &PgPool) -> Result<()> {
    info!("Seeding demo data...");

    let password_hash = hash_password(DEMO_PASSWORD)
        .map_err(|e| anyhow::anyhow!("Failed to hash demo password: {}", e))?;

    let seller_id = ensure_user(
        pool,
        "Demo Seller",
        DEMO_SELLER_EMAIL,
        "+1 555 010 2000",
        "seller",
        &password_hash,
    )
    .await?;
    ensure_user(
        pool,
        "Demo Buyer",
        DEMO_BUYER_EMAIL,
        "+1 555 010 3000",
        "buyer",
        &password_hash,
    )
    .await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE seller_id = $1")
        .bind(seller_id)
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        info!(seller_id = %seller_id, listings = existing, "Demo listings already present");
        return Ok(());
    }

    // Format: (name, description, category, product_type, condition, price cents, image, location)
    let listings: Vec<(&str, &str, &str, &str, &str, i64, &str, &str)> = vec![
        (
            "Oak dining table",
            "Solid oak table that seats six. Light wear on the top, sturdy legs.",
            "furniture",
            "sell",
            "good",
            18_000,
            "https://images.unsplash.com/photo-1577140917170-285929fb55b7?w=800",
            "Portland, OR",
        ),
        (
            "Road bike, 54cm frame",
            "Aluminium frame, 18 speeds, new tyres fitted last spring.",
            "sports",
            "sell",
            "like_new",
            32_500,
            "https://images.unsplash.com/photo-1485965120184-e220f721d03e?w=800",
            "Seattle, WA",
        ),
        (
            "Noise cancelling headphones",
            "Over-ear wireless headphones with case and charging cable.",
            "electronics",
            "sell",
            "good",
            9_900,
            "https://images.unsplash.com/photo-1505740420928-5e560c06d30e?w=800",
            "Portland, OR",
        ),
        (
            "Camping tent for four",
            "Available to rent by the weekend. Poles and pegs included.",
            "sports",
            "rent",
            "fair",
            2_500,
            "https://images.unsplash.com/photo-1504280390367-361c6d9f38f4?w=800",
            "Eugene, OR",
        ),
        (
            "Box of sci-fi paperbacks",
            "Around thirty classic novels. Happy to swap for fantasy titles.",
            "books",
            "exchange",
            "fair",
            1_000,
            "https://images.unsplash.com/photo-1512820790803-83ca734da794?w=800",
            "Seattle, WA",
        ),
        (
            "Wool winter coat",
            "Men's medium, charcoal grey. Worn one season.",
            "clothing",
            "sell",
            "like_new",
            6_000,
            "https://images.unsplash.com/photo-1539533018447-63fcce2678e3?w=800",
            "Portland, OR",
        ),
    ];

    let listing_count = listings.len();
    for (name, description, category, product_type, condition, price, image, location) in listings {
        sqlx::query(
            r#"
            INSERT INTO products
            (id, seller_id, name, description, category, product_type, condition,
             price, images, location, contact_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(name)
        .bind(description)
        .bind(category)
        .bind(product_type)
        .bind(condition)
        .bind(price)
        .bind(vec![image.to_string()])
        .bind(location)
        .bind("+1 555 010 2000")
        .execute(pool)
        .await
        .with_context(|| format!("Failed to insert demo listing {}", name))?;
    }

    info!("Seeded {} demo listings", listing_count);
    Ok(())
}
