//! Account queries.

use uuid::Uuid;

use super::{DbPool, NewUser, User};
use crate::error::ApiError;

/// Insert a new account. A duplicate email surfaces as a conflict.
pub async fn create(pool: &DbPool, user: &NewUser) -> Result<User, ApiError> {
    let result = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, name, email, password_hash, phone, user_type)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.phone)
    .bind(user.user_type.as_str())
    .fetch_one(pool)
    .await;

    match result {
        Ok(user) => Ok(user),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
            ApiError::validation_field("email", "An account with this email already exists")
                .with_status(axum::http::StatusCode::CONFLICT),
        ),
        Err(e) => Err(e.into()),
    }
}

pub async fn find_by_email(pool: &DbPool, email: &str) -> Result<Option<User>, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_by_id(pool: &DbPool, id: Uuid) -> Result<Option<User>, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn email_exists(pool: &DbPool, email: &str) -> Result<bool, ApiError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}
