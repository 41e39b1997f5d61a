//! Server configuration, read once from the environment at startup.

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use bonus_core::EarnRate;
use tracing::info;

/// Invalid or missing configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid {key} value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Tunables of the bonus ledger and order intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    pub earn_rate: EarnRate,
    /// Per-order bonus usage limit; `None` means unlimited.
    pub max_bonus_per_order: Option<i64>,
    /// Bound on every individual store call.
    pub store_timeout: Duration,
    /// Compare-and-swap attempts before giving up with `Contention`.
    pub cas_max_attempts: u32,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            earn_rate: EarnRate::default(),
            max_bonus_per_order: None,
            store_timeout: Duration::from_millis(2000),
            cas_max_attempts: 5,
        }
    }
}

/// Full server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub ledger: LedgerSettings,
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the raw value
    /// of a variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let earn_rate = match lookup("EARN_RATE_PERCENT") {
            Some(raw) => EarnRate::from_percent_str(&raw).map_err(|e| ConfigError::Invalid {
                key: "EARN_RATE_PERCENT",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => EarnRate::default(),
        };

        let max_bonus_per_order = match lookup("MAX_BONUS_PER_ORDER") {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => {
                let limit: i64 = parse_value("MAX_BONUS_PER_ORDER", &raw)?;
                if limit < 0 {
                    return Err(ConfigError::Invalid {
                        key: "MAX_BONUS_PER_ORDER",
                        value: raw,
                        reason: "must not be negative".to_string(),
                    });
                }
                Some(limit)
            }
            None => None,
        };

        let store_timeout_ms: u64 = try_load(&lookup, "STORE_TIMEOUT_MS", "2000")?;
        if store_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "STORE_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let cas_max_attempts: u32 = try_load(&lookup, "CAS_MAX_ATTEMPTS", "5")?;
        if cas_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "CAS_MAX_ATTEMPTS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let db_max_connections: u32 = try_load(&lookup, "DB_MAX_CONNECTIONS", "10")?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_MAX_CONNECTIONS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url,
            bind_addr: try_load(&lookup, "BIND_ADDR", "0.0.0.0:8080")?,
            db_max_connections,
            ledger: LedgerSettings {
                earn_rate,
                max_bonus_per_order,
                store_timeout: Duration::from_millis(store_timeout_ms),
                cas_max_attempts,
            },
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    parse_value(key, &raw)
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
