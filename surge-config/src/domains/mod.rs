//! Domain-specific configuration modules

pub mod auth;
pub mod http;
pub mod load;
pub mod logging;
pub mod server;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Surge configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SurgeConfig {
    /// Probe HTTP client configuration
    #[serde(default)]
    pub http: http::HttpConfig,

    /// Pool/ramp configuration
    #[serde(default)]
    pub load: load::LoadConfig,

    /// Capability token configuration
    #[serde(default)]
    pub auth: auth::AuthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,

    /// Server configuration (optional, for server mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<server::ServerConfig>,
}

impl SurgeConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.http.validate()?;
        self.load.validate()?;
        self.auth.validate()?;
        self.logging.validate()?;

        if let Some(ref server) = self.server {
            server.validate()?;
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = SurgeConfig {
            server: Some(server::ServerConfig::default()),
            ..SurgeConfig::default()
        };
        serde_yaml::to_string(&config).unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
