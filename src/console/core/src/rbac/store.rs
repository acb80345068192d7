//! Session-scoped holder of the current [`PermissionModel`].
//!
//! The model lives in a `watch` channel: writers replace the whole
//! `Arc<PermissionModel>` in one step and readers either borrow the latest
//! value or subscribe to replacements. Nothing ever edits a model in place.
//!
//! Loading is single-flight. Concurrent [`PermissionStore::load`] calls share
//! one transport request through a [`Shared`] future and all observe its
//! outcome. A failed load keeps whatever model was already there.

use futures::future::{BoxFuture, FutureExt, Shared};
use metrics::counter;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use super::models::{CapabilityRecord, PermissionModel, SubjectId};
use crate::error::{ConsoleError, Result};
use crate::normalize::normalize;
use crate::transport::PermissionSource;

type LoadOutcome = Result<Arc<PermissionModel>>;
type InflightLoad = Shared<BoxFuture<'static, LoadOutcome>>;

/// Cheaply cloneable handle to the session's permission state.
#[derive(Clone)]
pub struct PermissionStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    source: Arc<dyn PermissionSource>,
    model: watch::Sender<Option<Arc<PermissionModel>>>,
    subject: RwLock<Option<SubjectId>>,
    last_error: RwLock<Option<String>>,
    /// Bumped by `clear()`; loads started under an older generation are
    /// discarded when they finish.
    generation: AtomicU64,
    inflight: Mutex<Option<InflightLoad>>,
}

impl std::fmt::Debug for PermissionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionStore")
            .field("loaded", &self.is_loaded())
            .field("generation", &self.inner.generation.load(Ordering::SeqCst))
            .finish()
    }
}

impl PermissionStore {
    /// Create an empty store (no session) backed by `source`.
    pub fn new(source: Arc<dyn PermissionSource>) -> Self {
        let (model, _) = watch::channel(None);
        Self {
            inner: Arc::new(StoreInner {
                source,
                model,
                subject: RwLock::new(None),
                last_error: RwLock::new(None),
                generation: AtomicU64::new(0),
                inflight: Mutex::new(None),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Record the authenticated subject so the first `load()` can name it.
    pub fn begin_session(&self, subject: impl Into<SubjectId>) {
        let subject = subject.into();
        debug!(subject = %subject, "Permission session started");
        *self.inner.subject.write() = Some(subject);
    }

    /// Fetch the manifest and replace the stored model.
    ///
    /// Callers arriving while a load is in flight await that same load. On
    /// failure the previous model stays authoritative and the normalized
    /// message is kept in [`last_error`](Self::last_error).
    pub async fn load(&self) -> LoadOutcome {
        let load = {
            let mut slot = self.inner.inflight.lock();
            match slot.as_ref() {
                Some(existing) => {
                    debug!("Joining in-flight permission load");
                    existing.clone()
                }
                None => {
                    let generation = self.inner.generation.load(Ordering::SeqCst);
                    let load = Self::fetch_and_apply(self.inner.clone(), generation)
                        .boxed()
                        .shared();
                    *slot = Some(load.clone());
                    load
                }
            }
        };

        load.await
    }

    /// Drop the model and return to the "no session" state. Idempotent.
    ///
    /// A load still in flight when this runs is discarded on completion.
    pub fn clear(&self) {
        let mut slot = self.inner.inflight.lock();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        *slot = None;
        *self.inner.subject.write() = None;
        *self.inner.last_error.write() = None;
        let had_model = self.inner.model.send_replace(None).is_some();
        if had_model {
            info!("Permission model cleared");
        }
    }

    /// Fetch under `generation`, the generation current when the load was
    /// registered. The result is dropped if `clear()` has run since.
    async fn fetch_and_apply(inner: Arc<StoreInner>, generation: u64) -> LoadOutcome {
        let subject = inner.subject_hint();

        let fetched = inner.source.fetch_permissions(subject.as_ref()).await;

        let mut slot = inner.inflight.lock();
        if inner.generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding permission load that finished after the session was cleared");
            return Err(ConsoleError::PermissionLoadFailed(
                "session was cleared while permissions were loading".to_string(),
            ));
        }
        *slot = None;

        match fetched {
            Ok(manifest) => {
                let model = Arc::new(PermissionModel::from_manifest(manifest));
                *inner.last_error.write() = None;
                inner.model.send_replace(Some(model.clone()));
                counter!("opsdesk_permission_loads_total", "outcome" => "success").increment(1);
                info!(
                    subject = %model.subject_id(),
                    modules = model.module_count(),
                    "Permission model loaded"
                );
                Ok(model)
            }
            Err(failure) => {
                let message = normalize(&failure);
                *inner.last_error.write() = Some(message.clone());
                counter!("opsdesk_permission_loads_total", "outcome" => "failure").increment(1);
                debug!(kept_previous = inner.model.borrow().is_some(), "Permission load failed");
                let err = ConsoleError::PermissionLoadFailed(message);
                err.log();
                Err(err)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Capability record for `module`; all-false when absent or when no
    /// model is loaded.
    pub fn current_capability(&self, module: &str) -> CapabilityRecord {
        self.inner
            .model
            .borrow()
            .as_ref()
            .map(|model| model.capability(module))
            .unwrap_or_default()
    }

    /// The current model, if a session has loaded one.
    pub fn snapshot(&self) -> Option<Arc<PermissionModel>> {
        self.inner.model.borrow().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.model.borrow().is_some()
    }

    /// Receiver notified on every replacement or clear.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PermissionModel>>> {
        self.inner.model.subscribe()
    }

    /// Message of the most recent failed load, until the next success or
    /// `clear()`.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().clone()
    }

    /// Subject this session is bound to, if known.
    pub fn subject(&self) -> Option<SubjectId> {
        self.inner.subject_hint()
    }
}

impl StoreInner {
    fn subject_hint(&self) -> Option<SubjectId> {
        self.subject.read().clone().or_else(|| {
            self.model
                .borrow()
                .as_ref()
                .map(|model| model.subject_id().clone())
        })
    }
}
