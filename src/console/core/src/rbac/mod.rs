//! Client-side authorization for the operations console.
//!
//! This module provides:
//! - **Models**: subject identity, module codes, capability records and the
//!   server-issued permission manifest
//! - **Store**: the session's current [`PermissionModel`], replaced atomically
//!   on load and dropped on logout
//! - **Gate**: [`AccessGate`], which decides at render time whether a UI
//!   affordance exists for this session
//!
//! # Usage
//!
//! ```rust,ignore
//! use opsdesk_core::rbac::{AccessGate, Capability, PermissionStore};
//!
//! let store = PermissionStore::new(transport.clone());
//! store.begin_session("u-42");
//! store.load().await?;
//!
//! if AccessGate::new("CLIENTS").require(Capability::Delete).allows(&store) {
//!     // show the delete button
//! }
//! ```

pub mod gate;
pub mod models;
pub mod store;

pub use gate::{AccessGate, CapabilitySource, Fallback, GateDecision, Gated};
pub use models::{
    Capability, CapabilityRecord, ModuleCode, ModuleGrant, PermissionManifest, PermissionModel,
    SubjectId,
};
pub use store::PermissionStore;
