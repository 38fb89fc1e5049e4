//! Axum state, session extractor and cookie helpers.

use crate::auth::address::EvmAddress;
use crate::auth::service::AuthService;
use crate::config::Config;
use crate::error::AppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

/// Cookie carrying the correlation token between `/nonce` and `/verify`.
pub const CHALLENGE_COOKIE: &str = "siwe_challenge";

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "siwe_session";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub config: Arc<Config>,
}

/// Authenticated session extractor.
///
/// Resolves the `siwe_session` cookie. Returns 401 Unauthorized if it is
/// missing, unknown or expired.
pub struct AuthSession {
    pub address: EvmAddress,
    pub session_id: String,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session_id = cookie_value(&jar, SESSION_COOKIE)
            .ok_or_else(|| AppError::Unauthorized("Not signed in".to_string()))?;

        let session = state.auth.who_am_i(&session_id)?;

        Ok(AuthSession {
            address: session.address,
            session_id,
        })
    }
}

/// Non-empty value of a request cookie.
pub fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Cookie the browser keeps for `max_age_secs`.
///
/// Cookies are HTTP-only, `SameSite=Lax`, scoped to `/`, and `Secure` unless
/// the configuration explicitly turned that off for local development.
pub fn auth_cookie(
    config: &Config,
    name: &'static str,
    value: String,
    max_age_secs: i64,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs.max(0)))
        .build()
}

/// Cookie that removes `name` from the browser.
pub fn expired_cookie(config: &Config, name: &'static str) -> Cookie<'static> {
    auth_cookie(config, name, String::new(), 0)
}
