//! Observable state of a resource slice.

use serde::Serialize;

use crate::transport::{EntityId, Filters, MutationOp};

/// Fetch progress on one axis (list or detail).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum RequestPhase {
    #[default]
    Idle,
    LoadingList,
    LoadingOne,
}

/// Write progress, independent of fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum MutationPhase {
    #[default]
    Idle,
    Creating,
    Saving,
    Deleting,
}

impl MutationPhase {
    pub fn for_op(op: MutationOp) -> Self {
        match op {
            MutationOp::Create => Self::Creating,
            MutationOp::Update => Self::Saving,
            MutationOp::Delete => Self::Deleting,
        }
    }

    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Single coarse indicator for UIs that do not care which axis is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    Idle,
    Loading,
    Success,
    Fail,
}

/// Snapshot of one slice.
///
/// List and detail fetches are tracked separately (`list_phase`,
/// `detail_phase`) so a list refresh never looks like it blocks a detail
/// view. At most one of `last_error` / `last_success_message` is set by any
/// transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliceState<T> {
    /// Last successfully fetched list, in server order.
    pub collection: Vec<T>,
    /// Last successfully fetched single entity.
    pub current: Option<T>,
    /// Id `current` was fetched with.
    pub current_id: Option<EntityId>,
    /// `Idle` or `LoadingList`.
    pub list_phase: RequestPhase,
    /// `Idle` or `LoadingOne`.
    pub detail_phase: RequestPhase,
    pub mutation_phase: MutationPhase,
    pub last_error: Option<String>,
    pub last_success_message: Option<String>,
    /// Filters of the most recent list fetch; auto-refresh reuses them.
    pub last_filters: Filters,
    /// Whether any list fetch has ever succeeded.
    pub list_loaded: bool,
}

impl<T> Default for SliceState<T> {
    fn default() -> Self {
        Self {
            collection: Vec::new(),
            current: None,
            current_id: None,
            list_phase: RequestPhase::Idle,
            detail_phase: RequestPhase::Idle,
            mutation_phase: MutationPhase::Idle,
            last_error: None,
            last_success_message: None,
            last_filters: Filters::new(),
            list_loaded: false,
        }
    }
}

impl<T> SliceState<T> {
    /// `last_error` as display text, empty when unset.
    pub fn error_text(&self) -> &str {
        self.last_error.as_deref().unwrap_or("")
    }

    /// `last_success_message` as display text, empty when unset.
    pub fn success_text(&self) -> &str {
        self.last_success_message.as_deref().unwrap_or("")
    }

    pub fn is_loading(&self) -> bool {
        self.list_phase != RequestPhase::Idle
            || self.detail_phase != RequestPhase::Idle
            || self.mutation_phase.is_busy()
    }

    pub fn status(&self) -> SyncStatus {
        if self.is_loading() {
            SyncStatus::Loading
        } else if self.last_error.is_some() {
            SyncStatus::Fail
        } else if self.last_success_message.is_some() || self.list_loaded || self.current.is_some() {
            SyncStatus::Success
        } else {
            SyncStatus::Idle
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Message transitions
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn set_error(&mut self, message: String) {
        self.last_success_message = None;
        self.last_error = Some(message);
    }

    pub(crate) fn set_success(&mut self, message: String) {
        self.last_error = None;
        self.last_success_message = Some(message);
    }

    pub(crate) fn clear_messages(&mut self) {
        self.last_error = None;
        self.last_success_message = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_mutually_exclusive() {
        let mut state: SliceState<u32> = SliceState::default();

        state.set_success("Saved".into());
        state.set_error("Conflict".into());
        assert_eq!(state.error_text(), "Conflict");
        assert_eq!(state.success_text(), "");

        state.set_success("Saved".into());
        assert_eq!(state.error_text(), "");

        state.clear_messages();
        state.clear_messages();
        assert_eq!(state.last_error, None);
        assert_eq!(state.last_success_message, None);
    }

    #[test]
    fn test_status_derivation() {
        let mut state: SliceState<u32> = SliceState::default();
        assert_eq!(state.status(), SyncStatus::Idle);

        state.list_phase = RequestPhase::LoadingList;
        assert_eq!(state.status(), SyncStatus::Loading);

        state.list_phase = RequestPhase::Idle;
        state.set_error("down".into());
        assert_eq!(state.status(), SyncStatus::Fail);

        state.clear_messages();
        state.list_loaded = true;
        assert_eq!(state.status(), SyncStatus::Success);
    }

    #[test]
    fn test_mutation_phase_for_op() {
        assert_eq!(MutationPhase::for_op(MutationOp::Create), MutationPhase::Creating);
        assert_eq!(MutationPhase::for_op(MutationOp::Update), MutationPhase::Saving);
        assert_eq!(MutationPhase::for_op(MutationOp::Delete), MutationPhase::Deleting);
        assert!(!MutationPhase::Idle.is_busy());
    }
}
