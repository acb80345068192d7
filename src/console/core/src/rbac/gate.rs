//! Render-time access gate.
//!
//! An [`AccessGate`] names a module and a capability and decides, every time
//! it is evaluated, whether the wrapped content may be shown. Evaluation is a
//! synchronous read of the current permission snapshot; the gate never loads
//! permissions itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use opsdesk_core::rbac::{AccessGate, Capability, Fallback, Gated};
//!
//! let gate = AccessGate::new("HR_USERS")
//!     .require(Capability::Create)
//!     .fallback(Fallback::message("You cannot add users"));
//!
//! match gate.render(&store, || new_user_form()) {
//!     Gated::Content(form) => show(form),
//!     Gated::Fallback(fallback) => show_fallback(fallback),
//! }
//! ```

use std::sync::Arc;
use tracing::debug;

use super::models::{Capability, CapabilityRecord, ModuleCode, PermissionModel};
use super::store::PermissionStore;
use crate::error::ConsoleError;

// ═══════════════════════════════════════════════════════════════════════════════
// Capability sources
// ═══════════════════════════════════════════════════════════════════════════════

/// Anything that can answer "what may this session do on module X".
pub trait CapabilitySource {
    fn capability(&self, module: &str) -> CapabilityRecord;
}

impl CapabilitySource for PermissionStore {
    fn capability(&self, module: &str) -> CapabilityRecord {
        self.current_capability(module)
    }
}

impl CapabilitySource for PermissionModel {
    fn capability(&self, module: &str) -> CapabilityRecord {
        PermissionModel::capability(self, module)
    }
}

impl CapabilitySource for Option<Arc<PermissionModel>> {
    fn capability(&self, module: &str) -> CapabilityRecord {
        self.as_ref()
            .map(|model| model.capability(module))
            .unwrap_or_default()
    }
}

impl<S: CapabilitySource + ?Sized> CapabilitySource for &S {
    fn capability(&self, module: &str) -> CapabilityRecord {
        (**self).capability(module)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Fallback and decisions
// ═══════════════════════════════════════════════════════════════════════════════

/// What a denied gate shows instead of its content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Fallback {
    /// Render nothing.
    #[default]
    Nothing,
    /// Render a message in place of the content.
    Message(String),
    /// Navigate elsewhere (e.g. `/unauthorized`).
    Redirect(String),
}

impl Fallback {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }

    pub fn redirect(target: impl Into<String>) -> Self {
        Self::Redirect(target.into())
    }

    /// Text to show the operator, if the fallback carries any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Nothing => None,
            Self::Message(text) | Self::Redirect(text) => Some(text),
        }
    }
}

/// Outcome of evaluating a gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// Not an error: the denied branch is an ordinary render path.
    Deny { record: CapabilityRecord },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }
}

/// Result of rendering through a gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gated<T> {
    Content(T),
    Fallback(Fallback),
}

impl<T> Gated<T> {
    pub fn is_content(&self) -> bool {
        matches!(self, Self::Content(_))
    }

    pub fn content(self) -> Option<T> {
        match self {
            Self::Content(value) => Some(value),
            Self::Fallback(_) => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Gate
// ═══════════════════════════════════════════════════════════════════════════════

/// Guard requiring one capability on one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGate {
    module: ModuleCode,
    capability: Capability,
    fallback: Fallback,
}

impl AccessGate {
    /// Gate requiring `view` on `module`, rendering nothing when denied.
    pub fn new(module: impl Into<ModuleCode>) -> Self {
        Self {
            module: module.into(),
            capability: Capability::View,
            fallback: Fallback::Nothing,
        }
    }

    pub fn require(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }

    pub fn fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn module(&self) -> &ModuleCode {
        &self.module
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Evaluate against the current permissions of `source`.
    pub fn evaluate<S: CapabilitySource + ?Sized>(&self, source: &S) -> GateDecision {
        let record = source.capability(self.module.as_str());
        if record.allows(self.capability) {
            GateDecision::Allow
        } else {
            debug!(
                module = %self.module,
                capability = %self.capability,
                active = record.active,
                "Access gate denied"
            );
            GateDecision::Deny { record }
        }
    }

    pub fn allows<S: CapabilitySource + ?Sized>(&self, source: &S) -> bool {
        self.evaluate(source).is_allowed()
    }

    /// Produce the content when allowed, the configured fallback otherwise.
    /// `children` is only invoked on the allowed branch.
    pub fn render<S, T, F>(&self, source: &S, children: F) -> Gated<T>
    where
        S: CapabilitySource + ?Sized,
        F: FnOnce() -> T,
    {
        match self.evaluate(source) {
            GateDecision::Allow => Gated::Content(children()),
            GateDecision::Deny { .. } => Gated::Fallback(self.fallback.clone()),
        }
    }

    /// `Ok(())` when allowed, [`ConsoleError::AuthorizationDenied`] otherwise.
    pub fn enforce<S: CapabilitySource + ?Sized>(&self, source: &S) -> Result<(), ConsoleError> {
        match self.evaluate(source) {
            GateDecision::Allow => Ok(()),
            GateDecision::Deny { .. } => {
                let err = ConsoleError::denied(self.module.clone(), self.capability);
                err.log();
                Err(err)
            }
        }
    }
}
