//! Caller-facing handle of a resource slice.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::wrappers::WatchStream;

use super::orchestrator::{Command, Reply, SyncOrchestrator};
use super::state::SliceState;
use crate::error::{ConsoleError, Result};
use crate::transport::{EntityId, Filters, MutationOp, ResourceKind, ResourceTransport};

/// Handle to one resource kind's synchronized state.
///
/// Commands are queued to the slice's orchestrator task and resolve once
/// their own transport call settles. Every outcome is also written into the
/// slice state, so UIs can ignore the returned `Result` and render from
/// [`snapshot`](Self::snapshot) or [`subscribe`](Self::subscribe) instead.
pub struct ResourceSyncSlice<T> {
    kind: ResourceKind,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SliceState<T>>,
}

impl<T> Clone for ResourceSyncSlice<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            commands: self.commands.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ResourceSyncSlice<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSyncSlice")
            .field("kind", &self.kind)
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

impl<T> ResourceSyncSlice<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Build a slice and its orchestrator without spawning, for callers that
    /// drive the orchestrator on their own runtime or task set.
    pub fn new(
        kind: impl Into<ResourceKind>,
        transport: Arc<dyn ResourceTransport>,
    ) -> (Self, SyncOrchestrator<T>) {
        let kind = kind.into();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SliceState::default());

        let orchestrator = SyncOrchestrator::new(kind.clone(), transport, command_rx, state_tx);
        let slice = Self {
            kind,
            commands: command_tx,
            state: state_rx,
        };
        (slice, orchestrator)
    }

    /// Build a slice and spawn its orchestrator on the current tokio runtime.
    pub fn spawn(kind: impl Into<ResourceKind>, transport: Arc<dyn ResourceTransport>) -> Self {
        let (slice, orchestrator) = Self::new(kind, transport);
        tokio::spawn(orchestrator.run());
        slice
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace `collection` with the server's list for `filters`.
    pub async fn fetch_list(&self, filters: Filters) -> Result<()> {
        self.dispatch(|reply| Command::FetchList { filters, reply }).await
    }

    /// Replace `current` with the entity `id`.
    pub async fn fetch_one(&self, id: impl Into<EntityId>) -> Result<()> {
        let id = id.into();
        self.dispatch(|reply| Command::FetchOne { id, reply }).await
    }

    /// Create an entity. On success the list is refreshed automatically.
    pub async fn create(&self, payload: Value) -> Result<()> {
        self.mutate(MutationOp::Create, None, Some(payload)).await
    }

    /// Update entity `id`. On success the list (and `current`, if it is the
    /// same entity) is refreshed automatically.
    pub async fn update(&self, id: impl Into<EntityId>, payload: Value) -> Result<()> {
        self.mutate(MutationOp::Update, Some(id.into()), Some(payload))
            .await
    }

    /// Delete entity `id`. On success the list is refreshed automatically.
    pub async fn delete(&self, id: impl Into<EntityId>) -> Result<()> {
        self.mutate(MutationOp::Delete, Some(id.into()), None).await
    }

    /// Serialize `payload` and create an entity from it.
    pub async fn create_from<P: Serialize>(&self, payload: &P) -> Result<()> {
        let payload = serde_json::to_value(payload)?;
        self.create(payload).await
    }

    /// Clear both `last_error` and `last_success_message`.
    pub async fn clear_messages(&self) -> Result<()> {
        self.dispatch(|reply| Command::ClearMessages { reply }).await
    }

    async fn mutate(&self, op: MutationOp, id: Option<EntityId>, payload: Option<Value>) -> Result<()> {
        self.dispatch(|reply| Command::Mutate {
            op,
            id,
            payload,
            reply,
        })
        .await
    }

    async fn dispatch(&self, build: impl FnOnce(Reply) -> Command) -> Result<()> {
        let (reply, outcome) = oneshot::channel();
        if self.commands.send(build(reply)).is_err() {
            return Err(self.closed());
        }
        match outcome.await {
            Ok(result) => result,
            Err(_) => Err(self.closed()),
        }
    }

    fn closed(&self) -> ConsoleError {
        let err = ConsoleError::SliceClosed(self.kind.clone());
        err.log();
        err
    }
}

impl<T> ResourceSyncSlice<T> {
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Copy of the latest state.
    pub fn snapshot(&self) -> SliceState<T>
    where
        T: Clone,
    {
        self.state.borrow().clone()
    }

    /// Run `f` against the latest state without cloning it.
    pub fn with_state<R>(&self, f: impl FnOnce(&SliceState<T>) -> R) -> R {
        f(&self.state.borrow())
    }

    /// Receiver notified after every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SliceState<T>> {
        self.state.clone()
    }

    /// Stream of state snapshots, starting with the current one. Intermediate
    /// states may be skipped when the consumer falls behind.
    pub fn updates(&self) -> WatchStream<SliceState<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        WatchStream::new(self.state.clone())
    }
}
