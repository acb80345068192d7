//! The per-slice actor that owns a slice's state.
//!
//! One tokio task per slice receives commands over an mpsc channel and owns
//! every piece of mutable state. Transport calls are pushed into a
//! `FuturesUnordered` polled by that same task, so completions come back as
//! ordinary events and are applied one at a time. State transitions on either
//! side of a transport call are plain synchronous code; the only suspension
//! point is the call itself.
//!
//! After a successful mutation the actor schedules a list refresh. The
//! refresh is not issued until the actor has drained every command already
//! waiting in its queue, which lets a `fetch_list` submitted at the same time
//! join the refresh instead of causing a second request. While the refresh is
//! on the wire, further `fetch_list` calls are parked in one follow-up fetch
//! that carries the newest filters and is issued once the refresh settles.

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use metrics::counter;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use super::state::{MutationPhase, RequestPhase, SliceState};
use crate::error::{ConsoleError, Result};
use crate::normalize::normalize;
use crate::transport::{EntityId, Filters, MutationOp, MutationReceipt, ResourceKind, ResourceTransport};

pub(crate) type Reply = oneshot::Sender<Result<()>>;

/// Commands accepted by a slice, in submission order.
pub(crate) enum Command {
    FetchList {
        filters: Filters,
        reply: Reply,
    },
    FetchOne {
        id: EntityId,
        reply: Reply,
    },
    Mutate {
        op: MutationOp,
        id: Option<EntityId>,
        payload: Option<Value>,
        reply: Reply,
    },
    ClearMessages {
        reply: Reply,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::FetchList { .. } => "fetch_list",
            Self::FetchOne { .. } => "fetch_one",
            Self::Mutate { op, .. } => op.as_str(),
            Self::ClearMessages { .. } => "clear_messages",
        }
    }
}

/// A finished transport call, routed back into the actor.
enum Completion<T> {
    List {
        refresh: bool,
        result: std::result::Result<Vec<T>, String>,
        waiters: Vec<Reply>,
    },
    One {
        id: EntityId,
        result: std::result::Result<T, String>,
        waiters: Vec<Reply>,
    },
    Mutation {
        seq: u64,
        op: MutationOp,
        id: Option<EntityId>,
        result: std::result::Result<MutationReceipt, String>,
        reply: Reply,
    },
}

enum Event<T> {
    Command(Option<Command>),
    Completed(Completion<T>),
}

/// A list fetch waiting for the next refresh slot. `after_mutation` is set
/// when a successful mutation asked for it.
struct PendingRefresh {
    filters: Filters,
    waiters: Vec<Reply>,
    after_mutation: bool,
}

/// Default confirmation when the server sends none.
pub fn default_success_message(op: MutationOp) -> &'static str {
    match op {
        MutationOp::Create => "Created successfully",
        MutationOp::Update => "Saved successfully",
        MutationOp::Delete => "Deleted successfully",
    }
}

/// Drives one slice: command intake, transport calls, state transitions.
pub struct SyncOrchestrator<T> {
    kind: ResourceKind,
    transport: Arc<dyn ResourceTransport>,
    state: watch::Sender<SliceState<T>>,
    commands: mpsc::UnboundedReceiver<Command>,
    inflight: FuturesUnordered<BoxFuture<'static, Completion<T>>>,
    lists_in_flight: usize,
    details_in_flight: usize,
    /// In-flight mutations in start order; the newest one names the phase.
    mutations: Vec<(u64, MutationPhase)>,
    next_mutation_seq: u64,
    pending_refresh: Option<PendingRefresh>,
    /// A post-mutation refresh is on the wire.
    refresh_in_flight: bool,
    pending_detail_refresh: Option<EntityId>,
    /// Entities deleted through this slice since they were last requested.
    deleted: HashSet<EntityId>,
}

impl<T> SyncOrchestrator<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub(crate) fn new(
        kind: ResourceKind,
        transport: Arc<dyn ResourceTransport>,
        commands: mpsc::UnboundedReceiver<Command>,
        state: watch::Sender<SliceState<T>>,
    ) -> Self {
        Self {
            kind,
            transport,
            state,
            commands,
            inflight: FuturesUnordered::new(),
            lists_in_flight: 0,
            details_in_flight: 0,
            mutations: Vec::new(),
            next_mutation_seq: 0,
            pending_refresh: None,
            refresh_in_flight: false,
            pending_detail_refresh: None,
            deleted: HashSet::new(),
        }
    }

    /// Run until every slice handle is dropped and all calls have settled.
    pub async fn run(mut self) {
        debug!(resource = %self.kind, "Sync orchestrator started");
        let mut open = true;

        loop {
            let event = tokio::select! {
                biased;
                Some(done) = self.inflight.next(), if !self.inflight.is_empty() => Event::Completed(done),
                cmd = self.commands.recv(), if open => Event::Command(cmd),
                else => break,
            };

            match event {
                Event::Completed(done) => self.complete(done),
                Event::Command(Some(cmd)) => self.accept(cmd),
                Event::Command(None) => open = false,
            }

            if open {
                open = self.drain_ready();
            }
            self.flush_refresh();
        }

        debug!(resource = %self.kind, "Sync orchestrator stopped");
    }

    /// Accept every command already queued. Returns `false` once all senders
    /// are gone.
    fn drain_ready(&mut self) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(cmd) => self.accept(cmd),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Command intake
    // ─────────────────────────────────────────────────────────────────────────

    fn accept(&mut self, cmd: Command) {
        counter!(
            "opsdesk_sync_commands_total",
            "resource" => self.kind.to_string(),
            "command" => cmd.name(),
        )
        .increment(1);

        match cmd {
            Command::FetchList { filters, reply } => {
                self.state.send_modify(|s| {
                    s.list_phase = RequestPhase::LoadingList;
                    s.last_filters = filters.clone();
                });

                match self.pending_refresh.as_mut() {
                    Some(pending) => {
                        debug!(resource = %self.kind, "Coalescing list fetch into pending refresh");
                        pending.filters = filters;
                        pending.waiters.push(reply);
                    }
                    None if self.refresh_in_flight => {
                        debug!(resource = %self.kind, "Parking list fetch behind in-flight refresh");
                        self.pending_refresh = Some(PendingRefresh {
                            filters,
                            waiters: vec![reply],
                            after_mutation: false,
                        });
                    }
                    None => self.start_list(filters, vec![reply], false),
                }
            }
            Command::FetchOne { id, reply } => {
                self.deleted.remove(&id);
                self.state.send_modify(|s| s.detail_phase = RequestPhase::LoadingOne);
                self.start_one(id, vec![reply]);
            }
            Command::Mutate {
                op,
                id,
                payload,
                reply,
            } => {
                let phase = MutationPhase::for_op(op);
                let seq = self.next_mutation_seq;
                self.next_mutation_seq += 1;
                self.mutations.push((seq, phase));
                self.state.send_modify(|s| s.mutation_phase = phase);
                self.start_mutation(seq, op, id, payload, reply);
            }
            Command::ClearMessages { reply } => {
                self.state.send_modify(|s| s.clear_messages());
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn start_list(&mut self, filters: Filters, waiters: Vec<Reply>, refresh: bool) {
        self.lists_in_flight += 1;
        self.refresh_in_flight |= refresh;
        let transport = self.transport.clone();
        let kind = self.kind.clone();

        debug!(resource = %kind, filters = ?filters, "Fetching list");
        self.inflight.push(
            async move {
                let result = match transport.fetch_list(&kind, &filters).await {
                    Ok(records) => records
                        .into_iter()
                        .map(|record| decode(&kind, record))
                        .collect(),
                    Err(failure) => Err(normalize(&failure)),
                };
                Completion::List {
                    refresh,
                    result,
                    waiters,
                }
            }
            .boxed(),
        );
    }

    fn start_one(&mut self, id: EntityId, waiters: Vec<Reply>) {
        self.details_in_flight += 1;
        let transport = self.transport.clone();
        let kind = self.kind.clone();

        debug!(resource = %kind, id = %id, "Fetching entity");
        self.inflight.push(
            async move {
                let result = match transport.fetch_one(&kind, &id).await {
                    Ok(record) => decode(&kind, record),
                    Err(failure) => Err(normalize(&failure)),
                };
                Completion::One { id, result, waiters }
            }
            .boxed(),
        );
    }

    fn start_mutation(
        &mut self,
        seq: u64,
        op: MutationOp,
        id: Option<EntityId>,
        payload: Option<Value>,
        reply: Reply,
    ) {
        let transport = self.transport.clone();
        let kind = self.kind.clone();

        debug!(resource = %kind, op = %op, id = ?id, "Submitting mutation");
        self.inflight.push(
            async move {
                let result = transport
                    .mutate(&kind, op, id.as_ref(), payload.as_ref())
                    .await
                    .map_err(|failure| normalize(&failure));
                Completion::Mutation {
                    seq,
                    op,
                    id,
                    result,
                    reply,
                }
            }
            .boxed(),
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Completions
    // ─────────────────────────────────────────────────────────────────────────

    fn complete(&mut self, done: Completion<T>) {
        match done {
            Completion::List {
                refresh,
                result,
                waiters,
            } => {
                self.lists_in_flight -= 1;
                if refresh {
                    self.refresh_in_flight = false;
                }
                let settled = self.lists_in_flight == 0 && self.pending_refresh.is_none();

                match result {
                    Ok(items) => {
                        debug!(resource = %self.kind, count = items.len(), "List fetched");
                        self.state.send_modify(|s| {
                            s.collection = items;
                            s.list_loaded = true;
                            if settled {
                                s.list_phase = RequestPhase::Idle;
                            }
                        });
                        reply_all(waiters, Ok(()));
                    }
                    Err(message) => {
                        let err = ConsoleError::fetch_failed(&self.kind, message.clone());
                        self.record_failure("fetch_list", &err);
                        self.state.send_modify(|s| {
                            s.set_error(message);
                            if settled {
                                s.list_phase = RequestPhase::Idle;
                            }
                        });
                        reply_all(waiters, Err(err));
                    }
                }
            }
            Completion::One {
                id,
                result,
                waiters,
            } => {
                self.details_in_flight -= 1;
                let settled = self.details_in_flight == 0 && self.pending_detail_refresh.is_none();

                // A fetch that was on the wire when its entity got deleted
                // must not bring the entity back.
                let result = match result {
                    Ok(_) if self.deleted.contains(&id) => {
                        debug!(resource = %self.kind, id = %id, "Dropping entity fetched before its deletion");
                        Err(format!("{} {} was deleted", self.kind, id))
                    }
                    other => other,
                };

                match result {
                    Ok(item) => {
                        debug!(resource = %self.kind, id = %id, "Entity fetched");
                        self.state.send_modify(|s| {
                            s.current = Some(item);
                            s.current_id = Some(id);
                            if settled {
                                s.detail_phase = RequestPhase::Idle;
                            }
                        });
                        reply_all(waiters, Ok(()));
                    }
                    Err(message) => {
                        let err = ConsoleError::fetch_failed(&self.kind, message.clone());
                        self.record_failure("fetch_one", &err);
                        self.state.send_modify(|s| {
                            s.set_error(message);
                            if settled {
                                s.detail_phase = RequestPhase::Idle;
                            }
                        });
                        reply_all(waiters, Err(err));
                    }
                }
            }
            Completion::Mutation {
                seq,
                op,
                id,
                result,
                reply,
            } => {
                self.mutations.retain(|(s, _)| *s != seq);
                let phase = self
                    .mutations
                    .last()
                    .map(|(_, phase)| *phase)
                    .unwrap_or(MutationPhase::Idle);

                match result {
                    Ok(receipt) => {
                        let message = receipt
                            .message
                            .filter(|m| !m.trim().is_empty())
                            .unwrap_or_else(|| default_success_message(op).to_string());
                        let touches_current = id.is_some() && self.state.borrow().current_id == id;

                        debug!(resource = %self.kind, op = %op, id = ?id, "Mutation succeeded");
                        self.state.send_modify(|s| {
                            s.mutation_phase = phase;
                            s.set_success(message);
                            if touches_current && op == MutationOp::Delete {
                                s.current = None;
                                s.current_id = None;
                            }
                        });

                        if op == MutationOp::Delete {
                            if let Some(id) = &id {
                                self.deleted.insert(id.clone());
                            }
                        }
                        self.schedule_refresh();
                        if touches_current && op == MutationOp::Update {
                            self.pending_detail_refresh = id;
                        }
                        let _ = reply.send(Ok(()));
                    }
                    Err(message) => {
                        let err = ConsoleError::mutation_failed(&self.kind, op, message.clone());
                        self.record_failure(op.as_str(), &err);
                        self.state.send_modify(|s| {
                            s.mutation_phase = phase;
                            s.set_error(message);
                        });
                        let _ = reply.send(Err(err));
                    }
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Refresh after mutation
    // ─────────────────────────────────────────────────────────────────────────

    fn schedule_refresh(&mut self) {
        match self.pending_refresh.as_mut() {
            Some(pending) => pending.after_mutation = true,
            None => {
                let filters = self.state.borrow().last_filters.clone();
                self.pending_refresh = Some(PendingRefresh {
                    filters,
                    waiters: Vec::new(),
                    after_mutation: true,
                });
            }
        }
    }

    /// Issue the pending list fetch unless a refresh is still on the wire.
    fn flush_refresh(&mut self) {
        if !self.refresh_in_flight {
            if let Some(pending) = self.pending_refresh.take() {
                debug!(
                    resource = %self.kind,
                    joined = pending.waiters.len(),
                    after_mutation = pending.after_mutation,
                    "Refreshing list"
                );
                if pending.after_mutation {
                    counter!("opsdesk_sync_refreshes_total", "resource" => self.kind.to_string())
                        .increment(1);
                }
                self.state.send_modify(|s| s.list_phase = RequestPhase::LoadingList);
                self.start_list(pending.filters, pending.waiters, pending.after_mutation);
            }
        }

        if let Some(id) = self.pending_detail_refresh.take() {
            self.state.send_modify(|s| s.detail_phase = RequestPhase::LoadingOne);
            self.start_one(id, Vec::new());
        }
    }

    fn record_failure(&self, command: &'static str, err: &ConsoleError) {
        debug!(resource = %self.kind, command, "Sync command failed");
        err.log();
        counter!(
            "opsdesk_sync_failures_total",
            "resource" => self.kind.to_string(),
            "command" => command,
        )
        .increment(1);
    }
}

fn decode<T: DeserializeOwned>(kind: &ResourceKind, record: Value) -> std::result::Result<T, String> {
    serde_json::from_value(record).map_err(|e| format!("Could not read {} record: {}", kind, e))
}

fn reply_all(waiters: Vec<Reply>, outcome: Result<()>) {
    for waiter in waiters {
        let _ = waiter.send(outcome.clone());
    }
}
