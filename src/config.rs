//! Environment-sourced settings, resolved once in `main` and handed to the
//! components that need them.

use std::env;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/attendance";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
/// Twilio's shared WhatsApp sandbox sender.
pub const DEFAULT_SENDER: &str = "whatsapp:+14155238886";
pub const DEFAULT_API_BASE: &str = "https://api.twilio.com";
pub const DEFAULT_PACING_MS: u64 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl StoreConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
        })
    }
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub sender: String,
    pub api_base: String,
    pub pacing: Duration,
}

// Keeps the auth token out of logs.
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("sender", &self.sender)
            .field("api_base", &self.api_base)
            .field("pacing", &self.pacing)
            .finish()
    }
}

impl GatewayConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        Ok(Self {
            account_sid: required("TWILIO_SID")?,
            auth_token: required("TWILIO_TOKEN")?,
            sender: lookup("TWILIO_FROM").unwrap_or_else(|| DEFAULT_SENDER.to_string()),
            api_base: lookup("TWILIO_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            pacing: Duration::from_millis(parse_or(&lookup, "NOTIFY_PACING_MS", DEFAULT_PACING_MS)?),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> ConfigResult<T> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
