//! Endpoints that require a signed-in session.

use crate::auth::middleware::AuthSession;
use crate::models::SecretResponse;
use axum::Json;

/// GET /secret: Example protected resource
pub async fn secret(session: AuthSession) -> Json<SecretResponse> {
    Json(SecretResponse {
        ok: true,
        msg: format!("Hello {}, here is your protected data.", session.address),
    })
}
