//! Telemetry: structured logging and metric counters.
//!
//! # Example
//!
//! ```rust,no_run
//! use opsdesk_core::telemetry::{init_telemetry, LoggingConfig};
//!
//! init_telemetry(&LoggingConfig::default()).expect("Failed to initialize telemetry");
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig, SensitiveFieldRedactor};
pub use metrics::describe_metrics;

/// Initialize logging and register metric descriptions. Call once at
/// startup.
pub fn init_telemetry(config: &LoggingConfig) -> anyhow::Result<()> {
    init_logging(config)?;
    describe_metrics();
    Ok(())
}
