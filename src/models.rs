//! Request and response models for the API.
//!
//! All models use serde for serialization/deserialization. Error bodies are
//! built in `error.rs`.

use serde::{Deserialize, Serialize};

/// Response containing a fresh challenge nonce.
#[derive(Debug, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
}

/// Request to verify a signed sign-in message.
///
/// Missing fields deserialize to empty strings so the handler can answer
/// with a `bad_request` body instead of a framework rejection.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub signature: String, // 0x-prefixed hex, 65 bytes
}

/// Response carrying the signed-in address (`/verify`, `/me`).
#[derive(Debug, Serialize, Deserialize)]
pub struct AddressResponse {
    pub ok: bool,
    /// Lowercase `0x`-prefixed hex.
    pub address: String,
}

/// Response from the protected resource.
#[derive(Debug, Serialize, Deserialize)]
pub struct SecretResponse {
    pub ok: bool,
    pub msg: String,
}

/// Bare acknowledgement (`/ping`, `/logout`).
#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    pub code: String,
}
