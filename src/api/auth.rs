//! Registration, sign-in and sign-out actions.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{
    clear_session_cookie, encode_session, hash_password, session_cookie, verify_login,
    SessionUser,
};
use crate::db::{self, LoginRequest, RegisterRequest, User, UserResponse};
use crate::error::{ok, ApiError};
use crate::AppState;

use super::metrics::record_user_registered;
use super::validation::{new_user, normalize_email, validate_registration};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Validate and create an account.
pub async fn register_user(state: &AppState, req: &RegisterRequest) -> Result<User, ApiError> {
    let (email, user_type) = validate_registration(req)?;

    if db::users::email_exists(&state.db, &email).await? {
        return Err(
            ApiError::validation_field("email", "An account with this email already exists")
                .with_status(StatusCode::CONFLICT),
        );
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to create account")
    })?;

    let user = db::users::create(&state.db, &new_user(req, email, user_type, password_hash)).await?;

    record_user_registered(user_type.as_str());
    info!(user_id = %user.id, role = %user_type, "Account registered");
    Ok(user)
}

/// Check credentials. Unknown email and wrong password look the same.
pub async fn authenticate(state: &AppState, req: &LoginRequest) -> Result<User, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let user = db::users::find_by_email(&state.db, &email).await?;
    let verified = verify_login(&req.password, user.as_ref().map(|u| u.password_hash.as_str()));
    match user {
        Some(user) if verified => Ok(user),
        _ => {
            warn!(email = %email, "Failed sign-in attempt");
            Err(ApiError::unauthorized(INVALID_CREDENTIALS))
        }
    }
}

/// Attach a fresh session cookie for `user`
pub fn start_session(state: &AppState, jar: CookieJar, user: &User) -> Result<CookieJar, ApiError> {
    let session = SessionUser::from_user(user)
        .ok_or_else(|| ApiError::internal("Account has an unknown role"))?;
    let value = encode_session(&session, &state.config.auth.session_secret)?;
    Ok(jar.add(session_cookie(value, &state.config.auth)))
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = register_user(&state, &req).await?;
    let jar = start_session(&state, jar, &user)?;
    Ok((StatusCode::CREATED, jar, ok(UserResponse::from(user))))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    let jar = start_session(&state, jar, &user)?;
    info!(user_id = %user.id, "Signed in");
    Ok((jar, ok(UserResponse::from(user))))
}

/// POST /api/auth/logout
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (jar.add(clear_session_cookie()), ok(serde_json::json!({})))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = db::users::find_by_id(&state.db, session.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Your account no longer exists"))?;
    Ok(ok(UserResponse::from(user)))
}
