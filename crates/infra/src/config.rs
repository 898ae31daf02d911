//! Process configuration, read from the environment.

use std::net::SocketAddr;

use chrono::FixedOffset;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    InMemory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub storage: StorageConfig,
    /// Load the starter catalog at boot (no-op when the registry is non-empty).
    pub seed_on_startup: bool,
    /// Offset used to decide which calendar day a transfer belongs to when grouping.
    pub operation_day_offset: FixedOffset,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let bind_addr = bind_raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: bind_raw.clone(),
            reason: e.to_string(),
        })?;

        let storage = if parse_bool("USE_PERSISTENT_STORES", lookup("USE_PERSISTENT_STORES"), false)? {
            let database_url = lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            StorageConfig::Postgres { database_url }
        } else {
            StorageConfig::InMemory
        };

        let seed_on_startup = parse_bool("SEED_ON_STARTUP", lookup("SEED_ON_STARTUP"), true)?;

        let offset_raw = lookup("OPERATION_DAY_OFFSET_MINUTES").unwrap_or_else(|| "0".to_string());
        let invalid_offset = |reason: String| ConfigError::Invalid {
            name: "OPERATION_DAY_OFFSET_MINUTES",
            value: offset_raw.clone(),
            reason,
        };
        let minutes: i32 = offset_raw
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| invalid_offset(e.to_string()))?;
        let operation_day_offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| invalid_offset("offset must be within ±24h".to_string()))?;

        Ok(Self {
            bind_addr,
            storage,
            seed_on_startup,
            operation_day_offset,
        })
    }
}

fn parse_bool(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: "expected true or false".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_are_in_memory_seeded_utc() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.storage, StorageConfig::InMemory);
        assert!(cfg.seed_on_startup);
        assert_eq!(cfg.operation_day_offset.local_minus_utc(), 0);
    }

    #[test]
    fn persistent_mode_requires_database_url() {
        assert_eq!(
            config(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );

        let cfg = config(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/stock"),
        ])
        .unwrap();
        assert_eq!(
            cfg.storage,
            StorageConfig::Postgres {
                database_url: "postgres://localhost/stock".into()
            }
        );
    }

    #[test]
    fn offset_is_validated() {
        let cfg = config(&[("OPERATION_DAY_OFFSET_MINUTES", "180")]).unwrap();
        assert_eq!(cfg.operation_day_offset.local_minus_utc(), 3 * 3600);

        assert!(config(&[("OPERATION_DAY_OFFSET_MINUTES", "3000")]).is_err());
        assert!(config(&[("OPERATION_DAY_OFFSET_MINUTES", "soon")]).is_err());
        assert!(config(&[("SEED_ON_STARTUP", "maybe")]).is_err());
    }
}
