//! Service configuration

use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::repositories::token::DEFAULT_TOKEN_TTL_SECONDS;

/// Where the archive keeps its collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    /// Process-local; everything is lost on exit
    Memory,
}

/// Archive service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Socket address to listen on
    pub server_address: String,
    pub store_backend: StoreBackend,
    /// Requests running longer than this are aborted along with their store calls
    pub request_timeout_seconds: u64,
    /// Lifetime of tokens issued without `expiresIn`
    pub token_default_ttl_seconds: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_address: "0.0.0.0:8080".to_string(),
            store_backend: StoreBackend::Postgres,
            request_timeout_seconds: 30,
            token_default_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Environment Variables
    /// - `SERVER_ADDRESS`: Listen address (default: "0.0.0.0:8080")
    /// - `STORE_BACKEND`: `postgres` or `memory` (default: "postgres")
    /// - `REQUEST_TIMEOUT_SECONDS`: Per-request deadline (default: 30)
    /// - `TOKEN_DEFAULT_TTL_SECONDS`: Default token lifetime (default: 2592000)
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Config::builder()
            .set_default("server_address", defaults.server_address)?
            .set_default("store_backend", "postgres")?
            .set_default("request_timeout_seconds", defaults.request_timeout_seconds)?
            .set_default("token_default_ttl_seconds", defaults.token_default_ttl_seconds)?
            .add_source(Environment::default().try_parsing(true))
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        if config.token_default_ttl_seconds <= 0 {
            return Err(ConfigError::Message(
                "TOKEN_DEFAULT_TTL_SECONDS must be positive".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
