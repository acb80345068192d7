//! Error handling for the OpsDesk core.
//!
//! This module provides:
//! - [`ConsoleError`], the crate-wide error enum
//! - Stable [`ErrorCode`]s for machine-readable reporting
//! - Severity-aware logging through `tracing` and an error counter
//!
//! Transport failures never escape the sync core as faults: the orchestrator
//! converts them to slice state and hands callers a `ConsoleError` carrying
//! the same normalized message.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

use crate::rbac::models::{Capability, ModuleCode};
use crate::transport::{MutationOp, ResourceKind};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for OpsDesk operations.
pub type Result<T> = std::result::Result<T, ConsoleError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authorization (1000-1099)
    AuthorizationDenied,
    PermissionLoadFailed,

    // Resource sync (1100-1199)
    ResourceFetchFailed,
    ResourceMutationFailed,
    SliceClosed,

    // Serialization (2200-2299)
    SerializationError,

    // Network (3000-3099)
    NetworkError,

    // Configuration (5000-5099)
    ConfigurationError,

    // Internal (9000-9099)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::AuthorizationDenied => 1000,
            Self::PermissionLoadFailed => 1001,
            Self::ResourceFetchFailed => 1100,
            Self::ResourceMutationFailed => 1101,
            Self::SliceClosed => 1102,
            Self::SerializationError => 2200,
            Self::NetworkError => 3000,
            Self::ConfigurationError => 5000,
            Self::InternalError => 9000,
        }
    }

    /// Coarse category used as a metric label.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::AuthorizationDenied | Self::PermissionLoadFailed => "authorization",
            Self::ResourceFetchFailed | Self::ResourceMutationFailed | Self::SliceClosed => "sync",
            Self::SerializationError => "serialization",
            Self::NetworkError => "network",
            Self::ConfigurationError => "configuration",
            Self::InternalError => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Expected outcomes (denied gates, rejected input)
    Low,
    /// Operational issues (backend rejected or unreachable)
    Medium,
    /// Local faults (bad config, dead actor)
    High,
}

impl ErrorSeverity {
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::AuthorizationDenied => Self::Low,

            ErrorCode::PermissionLoadFailed
            | ErrorCode::ResourceFetchFailed
            | ErrorCode::ResourceMutationFailed
            | ErrorCode::NetworkError => Self::Medium,

            ErrorCode::SliceClosed
            | ErrorCode::SerializationError
            | ErrorCode::ConfigurationError
            | ErrorCode::InternalError => Self::High,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Console Error
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors surfaced by the permission and sync core.
///
/// Every variant carries text rather than a source error so that one outcome
/// can be handed to several waiters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("access denied: {capability} on {module}")]
    AuthorizationDenied {
        module: ModuleCode,
        capability: Capability,
    },

    #[error("failed to load permissions: {0}")]
    PermissionLoadFailed(String),

    #[error("{message}")]
    ResourceFetchFailed {
        resource: ResourceKind,
        message: String,
    },

    #[error("{message}")]
    ResourceMutationFailed {
        resource: ResourceKind,
        op: MutationOp,
        message: String,
    },

    #[error("sync slice for {0} is no longer running")]
    SliceClosed(ResourceKind),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConsoleError {
    pub fn fetch_failed(resource: &ResourceKind, message: impl Into<String>) -> Self {
        Self::ResourceFetchFailed {
            resource: resource.clone(),
            message: message.into(),
        }
    }

    pub fn mutation_failed(resource: &ResourceKind, op: MutationOp, message: impl Into<String>) -> Self {
        Self::ResourceMutationFailed {
            resource: resource.clone(),
            op,
            message: message.into(),
        }
    }

    pub fn denied(module: impl Into<ModuleCode>, capability: Capability) -> Self {
        Self::AuthorizationDenied {
            module: module.into(),
            capability,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthorizationDenied { .. } => ErrorCode::AuthorizationDenied,
            Self::PermissionLoadFailed(_) => ErrorCode::PermissionLoadFailed,
            Self::ResourceFetchFailed { .. } => ErrorCode::ResourceFetchFailed,
            Self::ResourceMutationFailed { .. } => ErrorCode::ResourceMutationFailed,
            Self::SliceClosed(_) => ErrorCode::SliceClosed,
            Self::Serialization(_) => ErrorCode::SerializationError,
            Self::Network(_) => ErrorCode::NetworkError,
            Self::Configuration(_) => ErrorCode::ConfigurationError,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code())
    }

    /// Log this error with appropriate severity and count it.
    pub fn log(&self) {
        let code = self.code();

        match self.severity() {
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    numeric_code = code.numeric_code(),
                    category = code.category(),
                    message = %self,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    numeric_code = code.numeric_code(),
                    category = code.category(),
                    message = %self,
                    "Operation failed"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    numeric_code = code.numeric_code(),
                    category = code.category(),
                    message = %self,
                    "Low severity error"
                );
            }
        }

        self.record_metrics();
    }

    fn record_metrics(&self) {
        let code = self.code();
        counter!(
            "opsdesk_errors_total",
            "code" => code.to_string(),
            "category" => code.category().to_string(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Common Error Types
// ═══════════════════════════════════════════════════════════════════════════════

impl From<serde_json::Error> for ConsoleError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            Self::Configuration(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<config::ConfigError> for ConsoleError {
    fn from(error: config::ConfigError) -> Self {
        Self::Configuration(error.to_string())
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(error: std::io::Error) -> Self {
        Self::Internal(error.to_string())
    }
}
