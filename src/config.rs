use crate::auth::AuthSettings;
use axum::http::HeaderValue;
use chrono::TimeDelta;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    pub max_body_bytes: usize,

    // Cookies
    pub cookie_secure: bool,

    // Domain binding
    pub strict_domain: bool,
    pub expected_domain: Option<String>,

    // TTLs (in seconds)
    pub nonce_ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub max_clock_skew_secs: u64,

    // Background cleanup
    pub cleanup_interval_secs: u64,
}

/// Defaults match `from_env` with no variables set.
impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            cors_origin: HeaderValue::from_static("http://localhost:5173"),
            max_body_bytes: 16_384,
            cookie_secure: true,
            strict_domain: false,
            expected_domain: None,
            nonce_ttl_secs: 300,
            session_ttl_secs: 86_400,
            max_clock_skew_secs: 60,
            cleanup_interval_secs: 60,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        let _ = dotenvy::dotenv();
        let defaults = Config::default();

        // Server
        let bind_addr = match env::var("BIND_ADDR") {
            Ok(val) => val
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?,
            Err(_) => defaults.bind_addr,
        };

        let cors_origin = match env::var("CORS_ORIGIN") {
            Ok(val) => parse_origin(&val)?,
            Err(_) => defaults.cors_origin,
        };

        let max_body_bytes = parse_env_or_default("MAX_BODY_BYTES", defaults.max_body_bytes)?;

        // Cookies: Secure may only be dropped when serving loopback (local dev)
        let cookie_secure = parse_env_or_default("COOKIE_SECURE", defaults.cookie_secure)?;
        if !cookie_secure && !bind_addr.ip().is_loopback() {
            return Err(ConfigError::InvalidValue(
                "COOKIE_SECURE".to_string(),
                "may only be false when BIND_ADDR is a loopback address".to_string(),
            ));
        }

        // Domain binding
        let strict_domain = parse_env_or_default("STRICT_DOMAIN", defaults.strict_domain)?;
        let expected_domain = match env::var("EXPECTED_DOMAIN") {
            Ok(val) if val.trim().is_empty() => None,
            Ok(val) => {
                let val = val.trim().to_string();
                if val.chars().any(|c| c.is_whitespace() || c == '/') {
                    return Err(ConfigError::InvalidValue(
                        "EXPECTED_DOMAIN".to_string(),
                        "must be a bare host, e.g. app.example".to_string(),
                    ));
                }
                Some(val)
            }
            Err(_) => None,
        };

        // TTLs
        let nonce_ttl_secs = parse_env_or_default("NONCE_TTL_SECS", defaults.nonce_ttl_secs)?;
        let session_ttl_secs =
            parse_env_or_default("SESSION_TTL_SECS", defaults.session_ttl_secs)?;
        let max_clock_skew_secs =
            parse_env_or_default("MAX_CLOCK_SKEW_SECS", defaults.max_clock_skew_secs)?;
        for (key, value) in [
            ("NONCE_TTL_SECS", nonce_ttl_secs),
            ("SESSION_TTL_SECS", session_ttl_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue(
                    key.to_string(),
                    "must be greater than zero".to_string(),
                ));
            }
        }

        // Background cleanup
        let cleanup_interval_secs =
            parse_env_or_default("CLEANUP_INTERVAL_SECS", defaults.cleanup_interval_secs)?;
        if cleanup_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "CLEANUP_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            bind_addr,
            cors_origin,
            max_body_bytes,
            cookie_secure,
            strict_domain,
            expected_domain,
            nonce_ttl_secs,
            session_ttl_secs,
            max_clock_skew_secs,
            cleanup_interval_secs,
        })
    }

    /// Settings for the auth service derived from this configuration.
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            nonce_ttl: secs(self.nonce_ttl_secs),
            session_ttl: secs(self.session_ttl_secs),
            max_clock_skew: secs(self.max_clock_skew_secs),
            strict_domain: self.strict_domain,
            expected_domain: self.expected_domain.clone(),
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Durations are capped at ten years so timestamp arithmetic cannot overflow.
const MAX_DURATION_SECS: u64 = 10 * 365 * 86_400;

fn secs(value: u64) -> TimeDelta {
    TimeDelta::seconds(value.min(MAX_DURATION_SECS) as i64)
}

fn parse_origin(value: &str) -> Result<HeaderValue, ConfigError> {
    let value = value.trim().trim_end_matches('/');
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::InvalidValue(
            "CORS_ORIGIN".to_string(),
            "must start with http:// or https://".to_string(),
        ));
    }
    HeaderValue::from_str(value)
        .map_err(|e| ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string()))
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}
