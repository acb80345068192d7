//! In-memory transport doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use opsdesk_core::rbac::{PermissionManifest, SubjectId};
use opsdesk_core::transport::{
    EntityId, Filters, MutationOp, MutationReceipt, PermissionSource, ResourceKind,
    ResourceTransport, TransportError,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

// ═══════════════════════════════════════════════════════════════════════════════
// Entities
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
}

pub fn client(id: i64, name: &str) -> Value {
    json!({ "id": id, "name": name })
}

pub fn rejected(status: u16, body: Value) -> TransportError {
    TransportError::Response { status, body }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scripted steps
// ═══════════════════════════════════════════════════════════════════════════════

/// One scripted answer. When `gate` is set the call parks until the test
/// releases it with `notify_one`.
pub struct Step<R> {
    pub gate: Option<Arc<Notify>>,
    pub result: Result<R, TransportError>,
}

impl<R> Step<R> {
    pub fn ok(value: R) -> Self {
        Self { gate: None, result: Ok(value) }
    }

    pub fn err(error: TransportError) -> Self {
        Self { gate: None, result: Err(error) }
    }

    pub fn gated(mut self, gate: &Arc<Notify>) -> Self {
        self.gate = Some(gate.clone());
        self
    }
}

async fn play<R>(step: Step<R>) -> Result<R, TransportError> {
    if let Some(gate) = step.gate {
        gate.notified().await;
    }
    step.result
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resource transport
// ═══════════════════════════════════════════════════════════════════════════════

/// Backend double holding a record table keyed by the `id` field.
///
/// Unscripted calls are served from the table; scripted steps take
/// precedence in FIFO order per operation.
#[derive(Default)]
pub struct MockBackend {
    records: Mutex<Vec<Value>>,
    list_script: Mutex<VecDeque<Step<Vec<Value>>>>,
    one_script: Mutex<VecDeque<Step<Value>>>,
    mutate_script: Mutex<VecDeque<Step<MutationReceipt>>>,
    list_calls: AtomicUsize,
    one_calls: AtomicUsize,
    mutate_calls: AtomicUsize,
    last_filters: Mutex<Option<Filters>>,
}

impl MockBackend {
    pub fn with_records(records: Vec<Value>) -> Arc<Self> {
        let backend = Self::default();
        *backend.records.lock() = records;
        Arc::new(backend)
    }

    pub fn script_list(&self, step: Step<Vec<Value>>) {
        self.list_script.lock().push_back(step);
    }

    pub fn script_one(&self, step: Step<Value>) {
        self.one_script.lock().push_back(step);
    }

    pub fn script_mutation(&self, step: Step<MutationReceipt>) {
        self.mutate_script.lock().push_back(step);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn one_calls(&self) -> usize {
        self.one_calls.load(Ordering::SeqCst)
    }

    pub fn mutate_calls(&self) -> usize {
        self.mutate_calls.load(Ordering::SeqCst)
    }

    pub fn last_filters(&self) -> Option<Filters> {
        self.last_filters.lock().clone()
    }

    pub fn records(&self) -> Vec<Value> {
        self.records.lock().clone()
    }

    fn position(&self, id: &EntityId) -> Option<usize> {
        self.records
            .lock()
            .iter()
            .position(|r| r["id"].to_string() == id.as_str())
    }
}

#[async_trait]
impl ResourceTransport for MockBackend {
    async fn fetch_list(
        &self,
        _kind: &ResourceKind,
        filters: &Filters,
    ) -> Result<Vec<Value>, TransportError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_filters.lock() = Some(filters.clone());

        let scripted = self.list_script.lock().pop_front();
        match scripted {
            Some(step) => play(step).await,
            None => Ok(self.records()),
        }
    }

    async fn fetch_one(&self, _kind: &ResourceKind, id: &EntityId) -> Result<Value, TransportError> {
        self.one_calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self.one_script.lock().pop_front();
        if let Some(step) = scripted {
            return play(step).await;
        }

        match self.position(id) {
            Some(index) => Ok(self.records.lock()[index].clone()),
            None => Err(rejected(404, json!({ "message": "Not found" }))),
        }
    }

    async fn mutate(
        &self,
        _kind: &ResourceKind,
        op: MutationOp,
        id: Option<&EntityId>,
        payload: Option<&Value>,
    ) -> Result<MutationReceipt, TransportError> {
        self.mutate_calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self.mutate_script.lock().pop_front();
        if let Some(step) = scripted {
            let receipt = play(step).await?;
            self.apply(op, id, payload);
            return Ok(receipt);
        }

        self.apply(op, id, payload);
        Ok(MutationReceipt::default())
    }
}

impl MockBackend {
    fn apply(&self, op: MutationOp, id: Option<&EntityId>, payload: Option<&Value>) {
        let index = id.and_then(|id| self.position(id));
        let mut records = self.records.lock();
        match (op, index, payload) {
            (MutationOp::Create, _, Some(payload)) => records.push(payload.clone()),
            (MutationOp::Update, Some(index), Some(payload)) => records[index] = payload.clone(),
            (MutationOp::Delete, Some(index), _) => {
                records.remove(index);
            }
            _ => {}
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission source
// ═══════════════════════════════════════════════════════════════════════════════

pub struct MockPermissions {
    script: Mutex<VecDeque<Step<PermissionManifest>>>,
    calls: AtomicUsize,
    subjects: Mutex<Vec<Option<SubjectId>>>,
}

impl MockPermissions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            subjects: Mutex::new(Vec::new()),
        })
    }

    pub fn script(&self, step: Step<PermissionManifest>) {
        self.script.lock().push_back(step);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn subjects(&self) -> Vec<Option<SubjectId>> {
        self.subjects.lock().clone()
    }
}

#[async_trait]
impl PermissionSource for MockPermissions {
    async fn fetch_permissions(
        &self,
        subject: Option<&SubjectId>,
    ) -> Result<PermissionManifest, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.subjects.lock().push(subject.cloned());

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(step) => play(step).await,
            None => Err(rejected(503, json!({ "message": "No manifest scripted" }))),
        }
    }
}

pub fn manifest(subject: &str, modules: Value) -> PermissionManifest {
    serde_json::from_value(json!({ "subjectId": subject, "modules": modules }))
        .expect("valid manifest")
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Wait until `condition` holds for the watched value, failing after a
/// second.
pub async fn wait_until<S>(rx: &mut watch::Receiver<S>, condition: impl FnMut(&S) -> bool) {
    tokio::time::timeout(Duration::from_secs(1), rx.wait_for(condition))
        .await
        .expect("condition not reached in time")
        .expect("state channel closed");
}

/// Spin until `probe` returns true, failing after a second.
pub async fn eventually(mut probe: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !probe() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}
