//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where the `DatabaseService` port is backed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub storage_backend: StorageBackend,
    /// Always present when the backend is `Postgres`.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub oracle_model: String,
    pub oracle_timeout: Duration,
    pub allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Storage ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let backend_str = var("STORAGE_BACKEND").unwrap_or_else(|| "postgres".to_string());
        let storage_backend = match backend_str.to_ascii_lowercase().as_str() {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORAGE_BACKEND".to_string(),
                    format!("'{}' is not one of postgres, memory", other),
                ))
            }
        };

        let database_url = var("DATABASE_URL").filter(|v| !v.trim().is_empty());
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingVar("DATABASE_URL".to_string()));
        }

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Oracle ---
        let openai_api_key = var("OPENAI_API_KEY").filter(|v| !v.trim().is_empty());
        let oracle_model = var("ORACLE_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());

        let timeout_str = var("ORACLE_TIMEOUT_SECS").unwrap_or_else(|| "60".to_string());
        let oracle_timeout = match timeout_str.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                return Err(ConfigError::InvalidValue(
                    "ORACLE_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                ))
            }
        };

        let allowed_origin =
            var("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            storage_backend,
            database_url,
            log_level,
            openai_api_key,
            oracle_model,
            oracle_timeout,
            allowed_origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_for_memory_backend() {
        let config = load(&[("STORAGE_BACKEND", "memory")]).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.oracle_model, "gpt-4o-mini");
        assert_eq!(config.oracle_timeout, Duration::from_secs(60));
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn postgres_requires_a_database_url() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(_))));
        let config = load(&[("DATABASE_URL", "postgres://localhost/moazer")]).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Postgres);
    }

    #[test]
    fn bad_values_are_rejected() {
        let bad_timeout = load(&[("STORAGE_BACKEND", "memory"), ("ORACLE_TIMEOUT_SECS", "0")]);
        assert!(matches!(bad_timeout, Err(ConfigError::InvalidValue(_, _))));
        let bad_backend = load(&[("STORAGE_BACKEND", "sqlite")]);
        assert!(matches!(bad_backend, Err(ConfigError::InvalidValue(_, _))));
        let bad_addr = load(&[("STORAGE_BACKEND", "memory"), ("BIND_ADDRESS", "nowhere")]);
        assert!(matches!(bad_addr, Err(ConfigError::InvalidValue(_, _))));
    }
}
