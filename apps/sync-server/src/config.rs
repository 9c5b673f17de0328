//! Sync server configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Sync server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind (`TILL_SERVER_BIND`, default 0.0.0.0)
    pub bind: String,

    /// HTTP port (`TILL_SERVER_PORT`, default 3000)
    pub port: u16,

    /// JSON catalog to seed from (`TILL_SERVER_SEED`)
    pub seed_path: Option<PathBuf>,

    /// Seed the built-in demo catalog when no seed file is given
    /// (`TILL_SERVER_DEMO_SEED`, default true)
    pub demo_seed: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            seed_path: None,
            demo_seed: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn load_from<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();

        let port = match lookup("TILL_SERVER_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TILL_SERVER_PORT".to_string()))?,
            None => defaults.port,
        };

        let demo_seed = match lookup("TILL_SERVER_DEMO_SEED") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TILL_SERVER_DEMO_SEED".to_string()))?,
            None => defaults.demo_seed,
        };

        let config = ServerConfig {
            bind: lookup("TILL_SERVER_BIND").unwrap_or(defaults.bind),
            port,
            seed_path: lookup("TILL_SERVER_SEED").map(PathBuf::from),
            demo_seed,
        };

        config.socket_addr()?;
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("TILL_SERVER_BIND".to_string()))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Failed to read seed file {path}: {reason}")]
    SeedFile { path: String, reason: String },
}
