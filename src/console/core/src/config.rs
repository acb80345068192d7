//! Configuration management.
//!
//! Sources, lowest precedence first: built-in defaults, an optional config
//! file, then `OPSDESK__*` environment variables (e.g.
//! `OPSDESK__API__BASE_URL`, `OPSDESK__SESSION__SUBJECT_ID`).

use serde::Deserialize;

use crate::error::Result;
use crate::telemetry::LoggingConfig;
use crate::transport::HttpTransportConfig;

/// Main console configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsoleConfig {
    /// REST backend connection
    #[serde(default)]
    pub api: HttpTransportConfig,

    /// Session identity
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Subject the permission manifest is requested for
    #[serde(default)]
    pub subject_id: Option<String>,
}

impl ConsoleConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("OPSDESK").separator("__"))
            .build()?;

        let cfg: ConsoleConfig = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("OPSDESK").separator("__"))
            .build()?;

        let cfg: ConsoleConfig = config.try_deserialize()?;
        Ok(cfg)
    }
}
