//! Random token generation for nonces, correlation tokens and session ids.

use rand::Rng;

/// Source of cryptographically secure random bytes.
pub trait RandomSource: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// Thread-local OS-seeded CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::rng().fill(dest);
    }
}

/// Nonce entropy in bytes (128 bits).
pub const NONCE_BYTES: usize = 16;

/// Session id and correlation token entropy in bytes (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Generate a challenge nonce.
///
/// Returns 32 lowercase hex characters, which also satisfies the EIP-4361
/// nonce grammar (alphanumeric, at least 8 characters).
pub fn generate_nonce(random: &dyn RandomSource) -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    random.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate an opaque session id or correlation token.
///
/// Returns 64 lowercase hex characters, safe to place in a cookie verbatim.
pub fn generate_token(random: &dyn RandomSource) -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    random.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
