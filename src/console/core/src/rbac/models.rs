//! Permission data models: subject identity, module capabilities, and the
//! server-issued manifest they are built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed identifier of the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SubjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stable key of a permission-gated feature area (e.g. `HR_USERS`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleCode(pub String);

impl ModuleCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ModuleCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ModuleCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for ModuleCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Capability
// ═══════════════════════════════════════════════════════════════════════════════

/// One of the four actions a module can grant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    #[default]
    View,
    Create,
    Edit,
    Delete,
}

impl Capability {
    pub fn all() -> [Capability; 4] {
        [Self::View, Self::Create, Self::Edit, Self::Delete]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "view" | "read" => Ok(Self::View),
            "create" => Ok(Self::Create),
            "edit" | "update" => Ok(Self::Edit),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown capability: {}", other)),
        }
    }
}

/// Capability flags granted for one module.
///
/// The default value (all `false`) is what an unknown module resolves to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRecord {
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub active: bool,
}

impl CapabilityRecord {
    /// Record granting nothing.
    pub const fn none() -> Self {
        Self {
            can_view: false,
            can_create: false,
            can_edit: false,
            can_delete: false,
            active: false,
        }
    }

    /// Record granting every capability on an active module.
    pub const fn full() -> Self {
        Self {
            can_view: true,
            can_create: true,
            can_edit: true,
            can_delete: true,
            active: true,
        }
    }

    /// The raw flag for `capability`, ignoring `active`.
    pub fn flag(&self, capability: Capability) -> bool {
        match capability {
            Capability::View => self.can_view,
            Capability::Create => self.can_create,
            Capability::Edit => self.can_edit,
            Capability::Delete => self.can_delete,
        }
    }

    /// Effective grant: an inactive module allows nothing.
    pub fn allows(&self, capability: Capability) -> bool {
        self.active && self.flag(capability)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Manifest (wire format)
// ═══════════════════════════════════════════════════════════════════════════════

/// One module entry of the permission manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleGrant {
    pub code: ModuleCode,
    #[serde(flatten)]
    pub record: CapabilityRecord,
}

impl ModuleGrant {
    pub fn new(code: impl Into<ModuleCode>, record: CapabilityRecord) -> Self {
        Self {
            code: code.into(),
            record,
        }
    }
}

/// The permission manifest served by the backend for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionManifest {
    pub subject_id: SubjectId,
    #[serde(default)]
    pub modules: Vec<ModuleGrant>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission model
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable snapshot of what the current session may do.
///
/// Never mutated after construction; a reload builds a new model and the
/// store swaps it in whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionModel {
    subject_id: SubjectId,
    capabilities: HashMap<ModuleCode, CapabilityRecord>,
    loaded_at: DateTime<Utc>,
}

impl PermissionModel {
    /// Build a model from a manifest. Later duplicates of a module code
    /// replace earlier ones.
    pub fn from_manifest(manifest: PermissionManifest) -> Self {
        let capabilities = manifest
            .modules
            .into_iter()
            .map(|grant| (grant.code, grant.record))
            .collect();

        Self {
            subject_id: manifest.subject_id,
            capabilities,
            loaded_at: Utc::now(),
        }
    }

    pub fn subject_id(&self) -> &SubjectId {
        &self.subject_id
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Capability record for `module`, or the all-false record if absent.
    pub fn capability(&self, module: &str) -> CapabilityRecord {
        self.capabilities
            .get(module)
            .copied()
            .unwrap_or_default()
    }

    /// Whether `capability` is effectively granted on `module`.
    pub fn allows(&self, module: &str, capability: Capability) -> bool {
        self.capability(module).allows(capability)
    }

    /// All modules in the manifest, sorted by code.
    pub fn modules(&self) -> Vec<(&ModuleCode, &CapabilityRecord)> {
        let mut modules: Vec<_> = self.capabilities.iter().collect();
        modules.sort_by(|a, b| a.0.cmp(b.0));
        modules
    }

    pub fn module_count(&self) -> usize {
        self.capabilities.len()
    }
}
