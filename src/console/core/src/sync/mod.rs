//! Resource synchronization: one slice per resource kind.
//!
//! A [`ResourceSyncSlice`] caches a resource's list and its currently opened
//! entity, tracks fetch and mutation progress, and keeps the last error or
//! success message for the UI. Its [`SyncOrchestrator`] is the single task
//! that applies commands and transport results to that state.
//!
//! # Usage
//!
//! ```rust,ignore
//! use opsdesk_core::sync::ResourceSyncSlice;
//!
//! let clients: ResourceSyncSlice<Client> = ResourceSyncSlice::spawn("clients", transport);
//! clients.fetch_list(Filters::new()).await.ok();
//! clients.create(json!({ "CLIENT_NAME": "Acme" })).await.ok();
//!
//! let state = clients.snapshot();
//! if !state.error_text().is_empty() {
//!     toast(state.error_text());
//!     clients.clear_messages().await.ok();
//! }
//! ```

pub mod orchestrator;
pub mod slice;
pub mod state;

pub use orchestrator::{default_success_message, SyncOrchestrator};
pub use slice::ResourceSyncSlice;
pub use state::{MutationPhase, RequestPhase, SliceState, SyncStatus};
