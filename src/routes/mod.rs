//! API route handlers.

pub mod auth;
pub mod protected;

use crate::auth::middleware::AppState;
use crate::middleware::security_headers;
use crate::models::OkResponse;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::get,
    routing::post,
    Json, Router,
};
use tower_http::cors::CorsLayer;

/// GET /ping: Liveness check
pub async fn ping() -> Json<OkResponse> {
    Json(OkResponse { ok: true })
}

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        // Sign-in flow
        .route("/nonce", get(auth::nonce))
        .route("/verify", post(auth::verify))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout))
        // Session-gated resources
        .route("/secret", get(protected::secret))
}

/// Full application: API routes, body limit, CORS and security headers.
///
/// CORS admits exactly the configured origin, with credentials so the
/// browser sends the session cookie.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.config.cors_origin.clone())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    api_router()
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(cors)
        .layer(axum::middleware::from_fn(security_headers))
        .with_state(state)
}
