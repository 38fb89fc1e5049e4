//! Local secp256k1 wallet producing EIP-191 `personal_sign` signatures.
//!
//! This is the client side of the signing step: it stands in for a browser
//! wallet in the `login` subcommand and in tests.

use crate::auth::address::EvmAddress;
use crate::auth::recover::eip191_digest;
use crate::auth::token::{OsRandom, RandomSource};
use k256::ecdsa::SigningKey;
use zeroize::Zeroizing;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

pub struct LocalSigner {
    key: SigningKey,
    address: EvmAddress,
}

impl LocalSigner {
    pub fn from_signing_key(key: SigningKey) -> Self {
        let point = key.verifying_key().to_encoded_point(false);
        let address = EvmAddress::from_public_key(&point.as_bytes()[1..]);
        Self { key, address }
    }

    /// Generate a fresh key from the OS random source.
    pub fn random() -> Result<Self, SignerError> {
        let mut seed = Zeroizing::new([0u8; 32]);
        OsRandom.fill_bytes(&mut seed[..]);
        let key = SigningKey::from_slice(&seed[..])
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self::from_signing_key(key))
    }

    /// Load a key from 32 bytes of hex, with or without `0x`.
    pub fn from_hex(private_key: &str) -> Result<Self, SignerError> {
        let digits = private_key.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        let bytes = Zeroizing::new(
            hex::decode(digits).map_err(|e| SignerError::InvalidKey(e.to_string()))?,
        );
        if bytes.len() != 32 {
            return Err(SignerError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let key =
            SigningKey::from_slice(&bytes).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self::from_signing_key(key))
    }

    pub fn address(&self) -> EvmAddress {
        self.address
    }

    /// Private key as `0x`-prefixed hex.
    pub fn to_hex(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.key.to_bytes().to_vec());
        Zeroizing::new(format!("0x{}", hex::encode(bytes.as_slice())))
    }

    /// Sign `message` as `personal_sign` does; returns `0x` + hex(`r || s || v`)
    /// with `v` in {27, 28}.
    pub fn sign_message(&self, message: &str) -> Result<String, SignerError> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&eip191_digest(message))
            .map_err(|e| SignerError::Signing(e.to_string()))?;

        let mut sig_bytes = Vec::with_capacity(65);
        sig_bytes.extend_from_slice(&signature.to_bytes());
        sig_bytes.push(recovery_id.to_byte() + 27);
        Ok(format!("0x{}", hex::encode(&sig_bytes)))
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("key", &"[REDACTED]")
            .field("address", &self.address)
            .finish()
    }
}
