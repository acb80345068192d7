//! Collaborator contracts between the sync core and the REST backend.
//!
//! The core never talks HTTP itself. It calls [`PermissionSource`] to obtain
//! the session's permission manifest and [`ResourceTransport`] to list, fetch
//! and mutate resources. [`http::HttpTransport`] is the reqwest-backed
//! implementation used by the CLI; tests substitute in-memory doubles.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::rbac::models::{PermissionManifest, SubjectId};

pub use http::{HttpTransport, HttpTransportConfig};

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Name of a resource collection on the backend (e.g. `"clients"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKind(pub String);

impl ResourceKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceKind {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ResourceKind {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a single entity. Backends use both numeric and string keys,
/// so the id is carried as its path-segment text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl From<u64> for EntityId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// Query filters for a list fetch, sent as query-string pairs.
pub type Filters = BTreeMap<String, String>;

// ═══════════════════════════════════════════════════════════════════════════════
// Mutations
// ═══════════════════════════════════════════════════════════════════════════════

/// The three write operations a resource supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOp {
    Create,
    Update,
    Delete,
}

impl MutationOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the backend returns for a successful mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationReceipt {
    /// Optional human-readable confirmation supplied by the server.
    #[serde(default)]
    pub message: Option<String>,
}

impl MutationReceipt {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Transport errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Failure reported by a transport.
///
/// The payload is deliberately loose: backends disagree on error bodies, and
/// the [`ErrorNormalizer`](crate::normalize::ErrorNormalizer) is responsible
/// for turning any of these into a message.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("server responded with status {status}")]
    Response { status: u16, body: Value },

    /// No response arrived (connection refused, timeout, TLS failure...).
    #[error("network failure: {0}")]
    Network(String),

    /// The response arrived but could not be understood.
    #[error("malformed response: {0}")]
    Decode(String),

    /// Any other failure shape, carried verbatim.
    #[error("transport failure")]
    Opaque(Value),
}

impl TransportError {
    /// View this failure as a JSON document for message extraction.
    ///
    /// Server responses are nested under `response.data`, the layout most
    /// REST clients use for rejected requests.
    pub fn shape(&self) -> Value {
        match self {
            Self::Response { status, body } => json!({
                "status": status,
                "response": { "status": status, "data": body },
            }),
            Self::Network(message) | Self::Decode(message) => json!({ "message": message }),
            Self::Opaque(value) => value.clone(),
        }
    }

    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Collaborator traits
// ═══════════════════════════════════════════════════════════════════════════════

/// Supplies the permission manifest for a session.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn fetch_permissions(
        &self,
        subject: Option<&SubjectId>,
    ) -> Result<PermissionManifest, TransportError>;
}

/// List, fetch and mutate operations against one REST backend.
///
/// Records are returned as raw JSON; the slice decodes them into its entity
/// type.
#[async_trait]
pub trait ResourceTransport: Send + Sync {
    async fn fetch_list(
        &self,
        kind: &ResourceKind,
        filters: &Filters,
    ) -> Result<Vec<Value>, TransportError>;

    async fn fetch_one(&self, kind: &ResourceKind, id: &EntityId) -> Result<Value, TransportError>;

    async fn mutate(
        &self,
        kind: &ResourceKind,
        op: MutationOp,
        id: Option<&EntityId>,
        payload: Option<&Value>,
    ) -> Result<MutationReceipt, TransportError>;
}
