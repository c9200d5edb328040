//! One-shot toast messages carried to the next page in a cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

pub const FLASH_COOKIE: &str = "retrade_flash";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    /// `success` or `error`, used as a CSS modifier
    pub kind: String,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: "error".to_string(),
            message: message.into(),
        }
    }
}

/// Queue a message for the next rendered page
pub fn set_flash(jar: CookieJar, flash: Flash) -> CookieJar {
    let value = serde_json::to_string(&flash).unwrap_or_default();
    jar.add(
        Cookie::build((FLASH_COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::minutes(1))
            .build(),
    )
}

/// Read and clear the pending message
pub fn take_flash(jar: CookieJar) -> (CookieJar, Option<Flash>) {
    let flash = jar
        .get(FLASH_COOKIE)
        .and_then(|c| serde_json::from_str::<Flash>(c.value()).ok());

    if jar.get(FLASH_COOKIE).is_none() {
        return (jar, None);
    }
    let jar = jar.remove(Cookie::build(FLASH_COOKIE).path("/"));
    (jar, flash)
}
