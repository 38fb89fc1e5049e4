//! Signer recovery for EIP-191 `personal_sign` signatures.

use crate::auth::address::{keccak256, EvmAddress};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecoverError {
    /// The signature cannot have been produced over this message.
    #[error("{0}")]
    Malformed(String),

    /// The recovery primitive itself failed.
    #[error("signature recovery fault: {0}")]
    Internal(String),
}

/// Capability boundary around the signature scheme.
///
/// Implementations return the address whose key produced `signature` over
/// `message`. They must be pure and fast: the verifier calls them inline.
pub trait SignatureRecovery: Send + Sync {
    fn recover(&self, message: &str, signature: &str) -> Result<EvmAddress, RecoverError>;
}

/// Digest a wallet signs for `personal_sign`:
/// `keccak256("\x19Ethereum Signed Message:\n" ++ len ++ message)`.
pub fn eip191_digest(message: &str) -> [u8; 32] {
    let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
    keccak256(prefixed.as_bytes())
}

/// secp256k1 recovery of `0x`-prefixed 65-byte `r || s || v` signatures.
#[derive(Debug, Default, Clone, Copy)]
pub struct Eip191Recovery;

impl SignatureRecovery for Eip191Recovery {
    fn recover(&self, message: &str, signature: &str) -> Result<EvmAddress, RecoverError> {
        let sig_bytes = hex::decode(signature.strip_prefix("0x").unwrap_or(signature))
            .map_err(|e| RecoverError::Malformed(format!("Invalid signature hex: {}", e)))?;

        if sig_bytes.len() != 65 {
            return Err(RecoverError::Malformed(format!(
                "Invalid signature length: expected 65 bytes, got {}",
                sig_bytes.len()
            )));
        }

        let (rs, v) = sig_bytes.split_at(64);
        let is_y_odd = match v[0] {
            0 | 27 => false,
            1 | 28 => true,
            other => {
                return Err(RecoverError::Malformed(format!(
                    "Invalid recovery id: {}",
                    other
                )))
            }
        };

        let signature = Signature::from_slice(rs)
            .map_err(|e| RecoverError::Malformed(format!("Invalid ECDSA signature: {}", e)))?;
        let recovery_id = RecoveryId::new(is_y_odd, false);

        let verifying_key =
            VerifyingKey::recover_from_prehash(&eip191_digest(message), &signature, recovery_id)
                .map_err(|e| RecoverError::Malformed(format!("Signature recovery failed: {}", e)))?;

        let point = verifying_key.to_encoded_point(false);
        let uncompressed = point
            .as_bytes()
            .get(1..)
            .filter(|key| key.len() == 64)
            .ok_or_else(|| RecoverError::Internal("Unexpected public key encoding".to_string()))?;

        Ok(EvmAddress::from_public_key(uncompressed))
    }
}
