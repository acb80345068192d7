//! The resource kinds the console manages and the modules that gate them.

use serde::Serialize;

use crate::rbac::{AccessGate, Capability, Fallback, ModuleCode};
use crate::transport::{MutationOp, ResourceKind};

/// One manageable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceEntry {
    /// REST collection path, also the slice's resource kind.
    pub kind: &'static str,
    /// Module code gating every operation on the resource.
    pub module: &'static str,
    /// Area of the console the resource belongs to.
    pub area: &'static str,
    /// Display label.
    pub label: &'static str,
    /// Field holding the entity id in records.
    pub id_field: &'static str,
}

impl ResourceEntry {
    pub fn resource_kind(&self) -> ResourceKind {
        ResourceKind::new(self.kind)
    }

    pub fn module_code(&self) -> ModuleCode {
        ModuleCode::new(self.module)
    }

    /// Gate for `capability` on this resource's module, with a message
    /// fallback naming the resource.
    pub fn gate(&self, capability: Capability) -> AccessGate {
        AccessGate::new(self.module)
            .require(capability)
            .fallback(Fallback::message(format!(
                "You do not have permission to {} {}",
                capability, self.label
            )))
    }
}

/// Capability a mutation requires.
pub fn capability_for(op: MutationOp) -> Capability {
    match op {
        MutationOp::Create => Capability::Create,
        MutationOp::Update => Capability::Edit,
        MutationOp::Delete => Capability::Delete,
    }
}

pub const RESOURCES: &[ResourceEntry] = &[
    ResourceEntry { kind: "clients", module: "CONTRACTING_CLIENTS", area: "Contracting", label: "clients", id_field: "CLIENT_ID" },
    ResourceEntry { kind: "hotels", module: "CONTRACTING_HOTELS", area: "Contracting", label: "hotels", id_field: "HOTEL_ID" },
    ResourceEntry { kind: "restaurants", module: "CONTRACTING_RESTAURANTS", area: "Contracting", label: "restaurants", id_field: "RESTAURANT_ID" },
    ResourceEntry { kind: "routes", module: "TRANSPORTATION_ROUTES", area: "Transportation", label: "routes", id_field: "ROUTE_ID" },
    ResourceEntry { kind: "transportation-companies", module: "TRANSPORTATION_COMPANIES", area: "Transportation", label: "transportation companies", id_field: "COMPANY_ID" },
    ResourceEntry { kind: "quotations", module: "QUOTATIONS", area: "Quotations", label: "quotations", id_field: "QUOTATION_ID" },
    ResourceEntry { kind: "employees", module: "HR_EMPLOYEES", area: "HR", label: "employees", id_field: "EMPLOYEE_ID" },
    ResourceEntry { kind: "users", module: "HR_USERS", area: "HR", label: "users", id_field: "USER_ID" },
    ResourceEntry { kind: "system-lists", module: "SYSTEM_LISTS", area: "System", label: "system lists", id_field: "LIST_ID" },
];

/// Look up a resource by kind (case-insensitive; `_` and `-` are equivalent).
pub fn find(kind: &str) -> Option<&'static ResourceEntry> {
    let wanted = kind.trim().to_ascii_lowercase().replace('_', "-");
    RESOURCES.iter().find(|entry| entry.kind == wanted)
}
