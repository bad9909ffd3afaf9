//! Configuration loading and representation.
//!
//! Everything comes from environment variables; unset variables take defaults,
//! set-but-malformed variables are rejected.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use gatekeeper_auth::{GatePolicy, Role};

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(2000);
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatekeeperConfig {
    pub bind: SocketAddr,
    pub jwt_secret: String,
    /// `true` when `JWT_SECRET` was unset and the development secret is in use.
    pub jwt_secret_is_default: bool,
    pub database_url: Option<String>,
    pub store_timeout: Duration,
    pub db_max_connections: u32,
    pub policy: GatePolicy,
}

impl GatekeeperConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get("GATEKEEPER_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = parse("GATEKEEPER_BIND", &bind_raw)?;

        let (jwt_secret, jwt_secret_is_default) = match get("JWT_SECRET") {
            Some(secret) => (secret, false),
            None => (DEFAULT_JWT_SECRET.to_string(), true),
        };

        let store_timeout = match get("GATEKEEPER_STORE_TIMEOUT_MS") {
            Some(raw) => {
                let ms: u64 = parse("GATEKEEPER_STORE_TIMEOUT_MS", &raw)?;
                if ms == 0 {
                    return Err(invalid("GATEKEEPER_STORE_TIMEOUT_MS", raw));
                }
                Duration::from_millis(ms)
            }
            None => DEFAULT_STORE_TIMEOUT,
        };

        let db_max_connections = match get("GATEKEEPER_DB_MAX_CONNECTIONS") {
            Some(raw) => {
                let n: u32 = parse("GATEKEEPER_DB_MAX_CONNECTIONS", &raw)?;
                if n == 0 {
                    return Err(invalid("GATEKEEPER_DB_MAX_CONNECTIONS", raw));
                }
                n
            }
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };

        let mut policy = GatePolicy::default();
        if let Some(role) = get("GATEKEEPER_ADMIN_ROLE") {
            policy.admin_role = Role::new(role.trim().to_string());
        }
        if let Some(raw) = get("GATEKEEPER_CATALOG_REQUIRES_ADMIN") {
            policy.catalog_requires_admin = parse_bool("GATEKEEPER_CATALOG_REQUIRES_ADMIN", &raw)?;
        }

        Ok(Self {
            bind,
            jwt_secret,
            jwt_secret_is_default,
            database_url: get("DATABASE_URL"),
            store_timeout,
            db_max_connections,
            policy,
        })
    }
}

fn invalid(key: &'static str, value: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { key, value: value.into() }
}

fn parse<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(key, raw))
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw)),
    }
}
