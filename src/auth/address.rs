//! Ethereum account addresses (20 bytes) and EIP-55 checksum encoding.

use std::fmt;
use std::str::FromStr;
use tiny_keccak::{Hasher, Keccak};

/// Keccak-256 digest as used throughout Ethereum.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address must start with 0x")]
    MissingPrefix,

    #[error("address must be 40 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("address contains non-hex characters")]
    InvalidHex,

    #[error("address is not in EIP-55 checksum form")]
    InvalidChecksum,
}

/// A 20-byte account address.
///
/// `Display` renders the canonical lower-case form (`0x` + 40 hex digits),
/// which is the form sessions are bound to.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvmAddress([u8; 20]);

impl EvmAddress {
    /// Derive the address of an uncompressed secp256k1 public key
    /// (64 bytes, without the `0x04` SEC1 tag).
    pub fn from_public_key(uncompressed: &[u8]) -> Self {
        let hash = keccak256(uncompressed);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash[12..]);
        Self(bytes)
    }

    /// Parse an address that must be written in EIP-55 checksum form.
    pub fn parse_checksummed(s: &str) -> Result<Self, AddressError> {
        let address = s.parse::<Self>()?;
        if address.to_checksum() != s {
            return Err(AddressError::InvalidChecksum);
        }
        Ok(address)
    }

    /// EIP-55 mixed-case rendering.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

/// Accepts any letter case; checksum is not enforced here.
impl FromStr for EvmAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(AddressError::MissingPrefix)?;

        if digits.len() != 40 {
            return Err(AddressError::InvalidLength(digits.len()));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressError::InvalidHex)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvmAddress({self})")
    }
}
