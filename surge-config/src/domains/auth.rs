//! Capability token configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capability token signing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret shared between the control plane and execution sites
    #[serde(default)]
    pub token_secret: String,

    /// Token lifetime. The TTL is the hard outer timeout of a run, so it
    /// must cover the longest plannable ramp.
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_token_ttl"
    )]
    pub token_ttl: Duration,

    /// Token issuer claim
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            token_ttl: default_token_ttl(),
            issuer: default_issuer(),
        }
    }
}

impl Validatable for AuthConfig {
    fn validate(&self) -> ConfigResult<()> {
        // Empty means "not configured yet"; callers that need signing
        // reject it at startup. A configured secret must not be guessable.
        if !self.token_secret.is_empty() && self.token_secret.len() < 16 {
            return Err(self.validation_error(
                "token_secret must be at least 16 bytes (set SURGE_TOKEN_SECRET)",
            ));
        }
        validate_positive(self.token_ttl.as_secs(), "token_ttl", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "auth"
    }
}

// Default value functions
fn default_token_ttl() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_issuer() -> String {
    "surge-control".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_secret_passes_short_secret_fails() {
        assert!(AuthConfig::default().validate().is_ok());

        let config = AuthConfig {
            token_secret: "short".to_string(),
            ..AuthConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reasonable_secret_accepted() {
        let config = AuthConfig {
            token_secret: "0123456789abcdef0123456789abcdef".to_string(),
            ..AuthConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.token_ttl, Duration::from_secs(900));
    }
}
