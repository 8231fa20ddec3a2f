//! Domain-driven configuration management for Surge
//!
//! Configuration is split by functional domain, with validation, defaults,
//! and environment variable support (`SURGE_*` overrides).

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

// Re-export domain configurations
pub use domains::{
    auth::AuthConfig, http::HttpConfig, load::LoadConfig, logging::LoggingConfig,
    server::ServerConfig, SurgeConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;
