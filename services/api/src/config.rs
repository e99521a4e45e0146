//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use smart_cart_core::PointRules;
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which store implementation backs the ports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    /// Process-local store seeded with a demo catalog. Data is lost on exit.
    Memory,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub store: StoreBackend,
    pub log_level: Level,
    pub toss_secret_key: String,
    pub toss_api_base: String,
    pub allowed_origin: String,
    pub point_rules: PointRules,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Store Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let backend = std::env::var("STORE_BACKEND").unwrap_or_else(|_| "postgres".to_string());
        let store = match backend.to_lowercase().as_str() {
            "postgres" => StoreBackend::Postgres {
                database_url: std::env::var("DATABASE_URL")
                    .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?,
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORE_BACKEND".to_string(),
                    format!("'{}' is not one of postgres, memory", other),
                ))
            }
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Payment Gateway ---
        // The secret key stays on the server; clients only ever see payment keys.
        let toss_secret_key = std::env::var("TOSS_SECRET_KEY")
            .map_err(|_| ConfigError::MissingVar("TOSS_SECRET_KEY".to_string()))?;
        let toss_api_base = std::env::var("TOSS_API_BASE")
            .unwrap_or_else(|_| "https://api.tosspayments.com".to_string());

        let allowed_origin = std::env::var("ALLOWED_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        // --- Loyalty Rules ---
        let defaults = PointRules::default();
        let distance_per_point = parse_var("DISTANCE_PER_POINT", defaults.distance_per_point)?;
        if !(distance_per_point > 0.0) {
            return Err(ConfigError::InvalidValue(
                "DISTANCE_PER_POINT".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let point_to_won = parse_var("POINT_TO_WON", defaults.point_to_won)?;

        Ok(Self {
            bind_address,
            store,
            log_level,
            toss_secret_key,
            toss_api_base,
            allowed_origin,
            point_rules: PointRules {
                distance_per_point,
                point_to_won,
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
