//! Canonical EIP-4361 challenge message.
//!
//! The signature covers the exact message bytes, so [`ChallengeMessage::build`]
//! and [`ChallengeMessage::parse`] are strict inverses: parsing accepts only
//! text that building the parsed record would reproduce byte-for-byte.
//!
//! ```text
//! {domain} wants you to sign in with your Ethereum account:
//! {address}
//!
//! {statement}                        (line omitted when empty)
//!
//! URI: {uri}
//! Version: 1
//! Chain ID: {chain_id}
//! Nonce: {nonce}
//! Issued At: {issued_at}
//! Expiration Time: {expiration_time}   (optional)
//! Not Before: {not_before}             (optional)
//! ```

use crate::auth::address::{AddressError, EvmAddress};
use chrono::{DateTime, SecondsFormat, Utc};

/// The only protocol version defined by EIP-4361.
pub const MESSAGE_VERSION: &str = "1";

const HEADER_SUFFIX: &str = " wants you to sign in with your Ethereum account:";
const URI_TAG: &str = "URI: ";
const VERSION_TAG: &str = "Version: ";
const CHAIN_ID_TAG: &str = "Chain ID: ";
const NONCE_TAG: &str = "Nonce: ";
const ISSUED_AT_TAG: &str = "Issued At: ";
const EXPIRATION_TIME_TAG: &str = "Expiration Time: ";
const NOT_BEFORE_TAG: &str = "Not Before: ";

/// Lines from `URI:` through `Issued At:`.
const BODY_LINES: usize = 5;
const OPTIONAL_LINES: usize = 2;
const MIN_LINES: usize = 4 + BODY_LINES;
const MAX_LINES: usize = 5 + BODY_LINES + OPTIONAL_LINES;
const MIN_NONCE_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("expected 9 to 12 lines, got {0}")]
    LineCount(usize),

    #[error("missing or misplaced '{0}' line")]
    MissingMarker(&'static str),

    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid chain id: {0}")]
    InvalidChainId(String),

    #[error("invalid {field} timestamp: {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}

/// Structured form of the message a wallet signs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMessage {
    /// Relying-party host requesting the sign-in.
    pub domain: String,
    pub address: EvmAddress,
    /// Human-readable text; may be empty, never multi-line.
    pub statement: String,
    pub uri: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
}

impl ChallengeMessage {
    /// Serialize into the canonical text that gets signed.
    pub fn build(&self) -> Result<String, MessageError> {
        self.validate()?;

        let mut lines = vec![
            format!("{}{HEADER_SUFFIX}", self.domain),
            self.address.to_checksum(),
            String::new(),
        ];
        if !self.statement.is_empty() {
            lines.push(self.statement.clone());
        }
        lines.extend([
            String::new(),
            format!("{URI_TAG}{}", self.uri),
            format!("{VERSION_TAG}{MESSAGE_VERSION}"),
            format!("{CHAIN_ID_TAG}{}", self.chain_id),
            format!("{NONCE_TAG}{}", self.nonce),
            format!("{ISSUED_AT_TAG}{}", format_timestamp(&self.issued_at)),
        ]);
        if let Some(t) = &self.expiration_time {
            lines.push(format!("{EXPIRATION_TIME_TAG}{}", format_timestamp(t)));
        }
        if let Some(t) = &self.not_before {
            lines.push(format!("{NOT_BEFORE_TAG}{}", format_timestamp(t)));
        }

        Ok(lines.join("\n"))
    }

    /// Strictly parse canonical message text.
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let lines: Vec<&str> = text.split('\n').collect();
        if !(MIN_LINES..=MAX_LINES).contains(&lines.len()) {
            return Err(MessageError::LineCount(lines.len()));
        }

        let domain = lines[0]
            .strip_suffix(HEADER_SUFFIX)
            .ok_or(MessageError::MissingMarker("wants you to sign in"))?;
        let address = EvmAddress::parse_checksummed(lines[1])?;
        if !lines[2].is_empty() {
            return Err(MessageError::MissingMarker("blank line after address"));
        }

        // An empty statement is written as no statement line at all.
        let (statement, body_start) = if lines[3].is_empty() {
            ("", 4)
        } else {
            if !lines[4].is_empty() {
                return Err(MessageError::MissingMarker("blank line after statement"));
            }
            (lines[3], 5)
        };

        let required = body_start + BODY_LINES;
        if !(required..=required + OPTIONAL_LINES).contains(&lines.len()) {
            return Err(MessageError::LineCount(lines.len()));
        }
        let body = &lines[body_start..];

        let uri = tagged(body[0], URI_TAG)?;

        let version = tagged(body[1], VERSION_TAG)?;
        if version != MESSAGE_VERSION {
            return Err(MessageError::UnsupportedVersion(version.to_string()));
        }

        let chain_id = parse_chain_id(tagged(body[2], CHAIN_ID_TAG)?)?;
        let nonce = tagged(body[3], NONCE_TAG)?;
        let issued_at = parse_timestamp("issued-at", tagged(body[4], ISSUED_AT_TAG)?)?;

        let mut rest = body[BODY_LINES..].iter().peekable();
        let expiration_time = match rest.peek() {
            Some(line) if line.starts_with(EXPIRATION_TIME_TAG) => {
                let value = tagged(line, EXPIRATION_TIME_TAG)?;
                rest.next();
                Some(parse_timestamp("expiration-time", value)?)
            }
            _ => None,
        };
        let not_before = match rest.next() {
            Some(line) => Some(parse_timestamp(
                "not-before",
                tagged(line, NOT_BEFORE_TAG)?,
            )?),
            None => None,
        };
        if rest.next().is_some() {
            return Err(MessageError::MissingMarker(NOT_BEFORE_TAG.trim_end()));
        }

        let message = Self {
            domain: domain.to_string(),
            address,
            statement: statement.to_string(),
            uri: uri.to_string(),
            chain_id,
            nonce: nonce.to_string(),
            issued_at,
            expiration_time,
            not_before,
        };
        message.validate()?;
        Ok(message)
    }

    fn validate(&self) -> Result<(), MessageError> {
        validate_token("domain", &self.domain)?;
        validate_token("uri", &self.uri)?;

        if self.statement.chars().any(|c| c == '\n' || c == '\r') {
            return Err(MessageError::InvalidField {
                field: "statement",
                reason: "must be a single line".to_string(),
            });
        }

        if self.nonce.len() < MIN_NONCE_LEN
            || !self.nonce.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(MessageError::InvalidField {
                field: "nonce",
                reason: format!("must be at least {MIN_NONCE_LEN} alphanumeric characters"),
            });
        }

        check_precision("issued-at", &self.issued_at)?;
        if let Some(t) = &self.expiration_time {
            check_precision("expiration-time", t)?;
        }
        if let Some(t) = &self.not_before {
            check_precision("not-before", t)?;
        }

        Ok(())
    }
}

/// Canonical timestamp rendering: RFC 3339, UTC, millisecond precision, `Z`.
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Sub-millisecond instants cannot be rendered canonically.
fn check_precision(field: &'static str, t: &DateTime<Utc>) -> Result<(), MessageError> {
    if t.timestamp_subsec_nanos() % 1_000_000 != 0 {
        return Err(MessageError::InvalidTimestamp {
            field,
            value: t.to_rfc3339_opts(SecondsFormat::Nanos, true),
        });
    }
    Ok(())
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, MessageError> {
    let invalid = || MessageError::InvalidTimestamp {
        field,
        value: value.to_string(),
    };

    let parsed = DateTime::parse_from_rfc3339(value)
        .map_err(|_| invalid())?
        .with_timezone(&Utc);

    // Other renderings of the same instant would not survive a rebuild.
    if format_timestamp(&parsed) != value {
        return Err(invalid());
    }
    Ok(parsed)
}

fn parse_chain_id(value: &str) -> Result<u64, MessageError> {
    let chain_id = value
        .parse::<u64>()
        .map_err(|_| MessageError::InvalidChainId(value.to_string()))?;
    if chain_id.to_string() != value {
        return Err(MessageError::InvalidChainId(value.to_string()));
    }
    Ok(chain_id)
}

fn tagged<'a>(line: &'a str, tag: &'static str) -> Result<&'a str, MessageError> {
    line.strip_prefix(tag)
        .ok_or(MessageError::MissingMarker(tag.trim_end()))
}

fn validate_token(field: &'static str, value: &str) -> Result<(), MessageError> {
    if value.is_empty() {
        return Err(MessageError::InvalidField {
            field,
            reason: "cannot be empty".to_string(),
        });
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(MessageError::InvalidField {
            field,
            reason: "may not contain whitespace".to_string(),
        });
    }
    Ok(())
}
