//! Passwords, the session cookie, and request extractors.
//!
//! The session is a JSON payload signed with HMAC-SHA256 and stored in the
//! `retrade_session` cookie. Nothing is kept server-side, so extractors never
//! touch the database.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use hmac::{Hmac, Mac};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::{User, UserType};
use crate::error::ApiError;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "retrade_session";

/// Hash a password with argon2 and a random salt
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash; a malformed hash never matches
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

lazy_static::lazy_static! {
    /// Checked when no account matches so unknown emails cost the same argon2 work
    static ref DUMMY_HASH: String =
        hash_password("retrade-no-such-account").unwrap_or_default();
}

/// Verify a sign-in attempt against the account's hash, if there is an account.
///
/// Without one, a throwaway hash is still verified and the result discarded.
pub fn verify_login(password: &str, stored_hash: Option<&str>) -> bool {
    match stored_hash {
        Some(hash) => verify_password(password, hash),
        None => {
            verify_password(password, &DUMMY_HASH);
            false
        }
    }
}

/// The signed-in user as carried by the session cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserType,
}

impl SessionUser {
    pub fn from_user(user: &User) -> Option<Self> {
        Some(Self {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role()?,
        })
    }

    pub fn is_buyer(&self) -> bool {
        self.role == UserType::Buyer
    }

    pub fn is_seller(&self) -> bool {
        self.role == UserType::Seller
    }

    /// Landing page for this role
    pub fn home(&self) -> &'static str {
        home_for(self.role)
    }
}

pub fn home_for(role: UserType) -> &'static str {
    match role {
        UserType::Buyer => "/buyer/browse",
        UserType::Seller => "/seller/dashboard",
    }
}

fn sign(payload: &str, secret: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    Some(mac)
}

/// Serialize and sign a session: `<json>.<hex hmac>`
pub fn encode_session(session: &SessionUser, secret: &str) -> Result<String, ApiError> {
    let payload = serde_json::to_string(session)
        .map_err(|e| ApiError::internal(format!("Failed to encode session: {}", e)))?;
    let mac = sign(&payload, secret).ok_or_else(|| ApiError::internal("Invalid session key"))?;
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("{}.{}", payload, signature))
}

/// Verify and parse a session cookie value
pub fn decode_session(value: &str, secret: &str) -> Option<SessionUser> {
    let (payload, signature) = value.rsplit_once('.')?;
    let expected = hex::decode(signature).ok()?;
    let mac = sign(payload, secret)?;
    mac.verify_slice(&expected).ok()?;
    serde_json::from_str(payload).ok()
}

/// Session cookie for a freshly signed-in user
pub fn session_cookie(value: String, config: &AuthConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(time::Duration::days(config.session_days))
        .build()
}

/// Expired cookie that removes the session
pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

/// Read the session from a cookie jar, ignoring tampered values
pub fn session_from_jar(jar: &CookieJar, secret: &str) -> Option<SessionUser> {
    jar.get(SESSION_COOKIE)
        .and_then(|c| decode_session(c.value(), secret))
}

/// Why an extractor refused a request
#[derive(Debug)]
pub enum AuthRejection {
    SignedOut { api: bool },
    WrongRole { api: bool, actual: UserType, required: UserType },
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::SignedOut { api: true } => {
                ApiError::unauthorized("Please sign in to continue").into_response()
            }
            AuthRejection::SignedOut { api: false } => Redirect::to("/login").into_response(),
            AuthRejection::WrongRole {
                api: true,
                required,
                ..
            } => ApiError::forbidden(format!(
                "This action requires a {} account",
                required.as_str()
            ))
            .into_response(),
            AuthRejection::WrongRole {
                api: false, actual, ..
            } => Redirect::to(home_for(actual)).into_response(),
        }
    }
}

/// JSON callers get an error envelope, page requests get a redirect
fn is_api_request(parts: &Parts) -> bool {
    let path = parts
        .extensions
        .get::<OriginalUri>()
        .map(|uri| uri.0.path())
        .unwrap_or_else(|| parts.uri.path());
    path == "/api" || path.starts_with("/api/")
}

fn read_session(parts: &Parts, state: &AppState) -> Option<SessionUser> {
    let jar = CookieJar::from_headers(&parts.headers);
    session_from_jar(&jar, &state.config.auth.session_secret)
}

fn require_role(
    parts: &Parts,
    state: &AppState,
    required: UserType,
) -> Result<SessionUser, AuthRejection> {
    let api = is_api_request(parts);
    let session = read_session(parts, state).ok_or(AuthRejection::SignedOut { api })?;
    if session.role != required {
        return Err(AuthRejection::WrongRole {
            api,
            actual: session.role,
            required,
        });
    }
    Ok(session)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for SessionUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        read_session(parts, state).ok_or(AuthRejection::SignedOut {
            api: is_api_request(parts),
        })
    }
}

/// A signed-in buyer
#[derive(Debug, Clone)]
pub struct Buyer(pub SessionUser);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Buyer {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, UserType::Buyer).map(Buyer)
    }
}

/// A signed-in seller
#[derive(Debug, Clone)]
pub struct Seller(pub SessionUser);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Seller {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, UserType::Seller).map(Seller)
    }
}

/// The session if there is one; never rejects
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<SessionUser>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(read_session(parts, state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn session() -> SessionUser {
        SessionUser {
            user_id: Uuid::new_v4(),
            email: "ana@example.com".to_string(),
            name: "Ana Lima".to_string(),
            role: UserType::Seller,
        }
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("market123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("market123", &hash));
        assert!(!verify_password("market124", &hash));
    }

    #[test]
    fn test_verify_login_without_account() {
        assert!(DUMMY_HASH.starts_with("$argon2"));
        assert!(!verify_login("retrade-no-such-account", None));
        assert!(!verify_login("market123", None));

        let hash = hash_password("market123").unwrap();
        assert!(verify_login("market123", Some(&hash)));
        assert!(!verify_login("market124", Some(&hash)));
    }

    #[test]
    fn test_verify_malformed_hash() {
        assert!(!verify_password("market123", "not-a-hash"));
        assert!(!verify_password("market123", ""));
    }

    #[test]
    fn test_session_roundtrip() {
        let original = session();
        let value = encode_session(&original, SECRET).unwrap();
        assert_eq!(decode_session(&value, SECRET), Some(original));
    }

    #[test]
    fn test_session_payload_shape() {
        let original = session();
        let value = encode_session(&original, SECRET).unwrap();
        let (payload, _) = value.rsplit_once('.').unwrap();
        let json: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(json["userId"], original.user_id.to_string());
        assert_eq!(json["email"], "ana@example.com");
        assert_eq!(json["name"], "Ana Lima");
        assert_eq!(json["role"], "seller");
    }

    #[test]
    fn test_tampered_session_rejected() {
        let value = encode_session(&session(), SECRET).unwrap();
        let forged = value.replace("\"seller\"", "\"buyer\"");
        assert_ne!(forged, value);
        assert_eq!(decode_session(&forged, SECRET), None);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let value = encode_session(&session(), SECRET).unwrap();
        assert_eq!(
            decode_session(&value, "another-secret-another-secret-xx"),
            None
        );
    }

    #[test]
    fn test_malformed_session_rejected() {
        assert_eq!(decode_session("", SECRET), None);
        assert_eq!(decode_session("no-signature", SECRET), None);
        assert_eq!(decode_session("{}.zz", SECRET), None);

        // Valid signature over something that is not a session
        let payload = "{\"hello\":1}";
        let mac = sign(payload, SECRET).unwrap();
        let value = format!("{}.{}", payload, hex::encode(mac.finalize().into_bytes()));
        assert_eq!(decode_session(&value, SECRET), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let config = AuthConfig {
            session_secret: SECRET.to_string(),
            cookie_secure: true,
            session_days: 7,
        };
        let cookie = session_cookie("value".to_string(), &config);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));

        let cleared = clear_session_cookie();
        assert_eq!(cleared.max_age(), Some(time::Duration::ZERO));
    }

    #[test]
    fn test_session_survives_cookie_encoding() {
        let original = session();
        let value = encode_session(&original, SECRET).unwrap();
        let cookie = Cookie::new(SESSION_COOKIE, value);
        let header = cookie.encoded().to_string();
        assert!(header.contains("%22"));

        let parsed = Cookie::parse_encoded(header).unwrap();
        assert_eq!(decode_session(parsed.value(), SECRET), Some(original));
    }

    #[test]
    fn test_home_for_role() {
        assert_eq!(home_for(UserType::Buyer), "/buyer/browse");
        assert_eq!(home_for(UserType::Seller), "/seller/dashboard");
    }
}
