//! One authenticated CLI session: the HTTP transport plus a loaded
//! permission store.

use anyhow::{Context, Result};
use opsdesk_core::catalog::ResourceEntry;
use opsdesk_core::config::ConsoleConfig;
use opsdesk_core::rbac::PermissionStore;
use opsdesk_core::sync::ResourceSyncSlice;
use opsdesk_core::transport::HttpTransport;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct Session {
    transport: Arc<HttpTransport>,
    store: PermissionStore,
}

impl Session {
    /// Connect to the backend and load the permission manifest.
    pub async fn open(settings: &ConsoleConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(settings.api.clone())?);
        let store = PermissionStore::new(transport.clone());

        if let Some(subject) = &settings.session.subject_id {
            store.begin_session(subject.as_str());
        }

        store
            .load()
            .await
            .with_context(|| format!("Could not open a session at {}", transport.base_url()))?;

        debug!(api = %transport.base_url(), "Session opened");
        Ok(Self { transport, store })
    }

    pub fn store(&self) -> &PermissionStore {
        &self.store
    }

    /// Slice for `entry`, with records kept as raw JSON.
    pub fn slice(&self, entry: &ResourceEntry) -> ResourceSyncSlice<Value> {
        ResourceSyncSlice::spawn(entry.resource_kind(), self.transport.clone())
    }
}
