#![allow(clippy::result_large_err)]
//! # OpsDesk Core
//!
//! Permission-gated data synchronization for the OpsDesk operations console.
//!
//! ## Architecture
//!
//! - **Transport**: REST seam (`PermissionSource`, `ResourceTransport`) with a reqwest implementation
//! - **Normalize**: Turns any failure shape into one human-readable message
//! - **RBAC**: Per-module capability model, the session-wide permission store and access gates
//! - **Sync**: One async slice per resource kind (list, current entity, mutations, refresh)
//! - **Catalog**: The resource kinds the console manages and their gating modules
//! - **Telemetry**: Structured logging and metric counters

pub mod catalog;
pub mod config;
pub mod error;
pub mod normalize;
pub mod rbac;
pub mod sync;
pub mod telemetry;
pub mod transport;

pub use error::{ConsoleError, ErrorCode, ErrorSeverity, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{capability_for, ResourceEntry, RESOURCES};
    pub use crate::config::ConsoleConfig;
    pub use crate::error::{ConsoleError, ErrorCode, ErrorSeverity, Result};
    pub use crate::normalize::{normalize, ErrorNormalizer};
    pub use crate::rbac::{
        AccessGate, Capability, CapabilityRecord, CapabilitySource, Fallback, GateDecision, Gated,
        ModuleCode, PermissionModel, PermissionStore, SubjectId,
    };
    pub use crate::sync::{ResourceSyncSlice, SliceState, SyncStatus};
    pub use crate::transport::{
        EntityId, Filters, HttpTransport, HttpTransportConfig, MutationOp, PermissionSource,
        ResourceKind, ResourceTransport, TransportError,
    };
}
