//! Sign-in endpoints.

use crate::auth::middleware::{
    auth_cookie, cookie_value, expired_cookie, AppState, AuthSession, CHALLENGE_COOKIE,
    SESSION_COOKIE,
};
use crate::error::AppError;
use crate::models::{AddressResponse, NonceResponse, OkResponse, VerifyRequest};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;

/// GET /nonce: Issue a challenge nonce
///
/// The nonce goes into the body for the wallet to sign; the correlation
/// token that binds it to this browser goes into an HTTP-only cookie.
pub async fn nonce(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let challenge = state.auth.request_challenge();
    let max_age = state.auth.settings().nonce_ttl.num_seconds();

    let jar = jar.add(auth_cookie(
        &state.config,
        CHALLENGE_COOKIE,
        challenge.correlation_token,
        max_age,
    ));

    (
        jar,
        Json(NonceResponse {
            nonce: challenge.nonce,
        }),
    )
}

/// POST /verify: Verify a signed message and open a session
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    if req.message.is_empty() || req.signature.is_empty() {
        return Err(AppError::BadRequest("Missing message/signature".to_string()));
    }

    let token = cookie_value(&jar, CHALLENGE_COOKIE);
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());

    let sign_in =
        state
            .auth
            .complete_sign_in(&req.message, &req.signature, token.as_deref(), host)?;

    let max_age = state.auth.settings().session_ttl.num_seconds();
    let jar = jar
        .add(expired_cookie(&state.config, CHALLENGE_COOKIE))
        .add(auth_cookie(
            &state.config,
            SESSION_COOKIE,
            sign_in.session_id,
            max_age,
        ));

    Ok((
        jar,
        Json(AddressResponse {
            ok: true,
            address: sign_in.address.to_string(),
        }),
    ))
}

/// GET /me: Address bound to the current session
pub async fn me(session: AuthSession) -> Json<AddressResponse> {
    Json(AddressResponse {
        ok: true,
        address: session.address.to_string(),
    })
}

/// POST /logout: End the current session, if any
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(session_id) = cookie_value(&jar, SESSION_COOKIE) {
        state.auth.sign_out(&session_id);
    }

    (
        jar.add(expired_cookie(&state.config, SESSION_COOKIE)),
        Json(OkResponse { ok: true }),
    )
}
