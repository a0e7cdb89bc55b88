//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::jobs::JobSchedulerConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Seconds between recurring sweeps
    pub sweep_interval_secs: u64,

    /// Occurrences materialized per definition per sweep
    pub max_catch_up_iterations: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10)?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_or("PORT", 3000)?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let sweep_interval_secs: u64 = parse_or("SWEEP_INTERVAL_SECS", 3600)?;
        if sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("SWEEP_INTERVAL_SECS"));
        }

        let max_catch_up_iterations: usize = parse_or("MAX_CATCH_UP_ITERATIONS", 24)?;
        if max_catch_up_iterations == 0 {
            return Err(ConfigError::InvalidValue("MAX_CATCH_UP_ITERATIONS"));
        }

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            sweep_interval_secs,
            max_catch_up_iterations,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Settings for the background sweep
    pub fn scheduler(&self) -> JobSchedulerConfig {
        JobSchedulerConfig {
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            max_catch_up_iterations: self.max_catch_up_iterations,
        }
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
