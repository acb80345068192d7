//! Resource commands.
//!
//! Each command resolves the resource in the catalog, passes the access gate
//! for the capability it needs, then drives a sync slice and renders the
//! slice state it leaves behind.

use anyhow::{anyhow, bail, Context, Result};
use clap::Subcommand;
use opsdesk_core::catalog::{self, capability_for, ResourceEntry, RESOURCES};
use opsdesk_core::rbac::{Capability, Gated};
use opsdesk_core::sync::ResourceSyncSlice;
use opsdesk_core::transport::{Filters, MutationOp};
use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use crate::session::Session;

#[derive(Subcommand)]
pub enum ResourceCommands {
    /// List the resource kinds the console manages
    Kinds,

    /// List records of a kind
    List {
        /// Resource kind (e.g. clients, hotels)
        kind: String,

        /// Filter as key=value (repeatable)
        #[arg(short, long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },

    /// Show one record
    Show {
        /// Resource kind
        kind: String,
        /// Record ID
        id: String,
    },

    /// Create a record from a JSON object
    Create {
        /// Resource kind
        kind: String,
        /// Record as JSON
        #[arg(short, long)]
        data: String,
    },

    /// Update a record from a JSON object
    Update {
        /// Resource kind
        kind: String,
        /// Record ID
        id: String,
        /// Record as JSON
        #[arg(short, long)]
        data: String,
    },

    /// Delete a record
    Delete {
        /// Resource kind
        kind: String,
        /// Record ID
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct KindRow {
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Module")]
    module: &'static str,
    #[tabled(rename = "Area")]
    area: &'static str,
    #[tabled(rename = "ID Field")]
    id_field: &'static str,
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

fn parse_payload(data: &str) -> Result<Value> {
    let payload: Value = serde_json::from_str(data).context("--data is not valid JSON")?;
    if !payload.is_object() {
        bail!("--data must be a JSON object");
    }
    Ok(payload)
}

fn resolve(kind: &str) -> Result<&'static ResourceEntry> {
    catalog::find(kind).ok_or_else(|| {
        let known: Vec<&str> = RESOURCES.iter().map(|e| e.kind).collect();
        anyhow!("Unknown resource '{}' (expected one of: {})", kind, known.join(", "))
    })
}

/// Pass the entry's gate for `capability` or fail with its fallback text.
fn authorize(session: &Session, entry: &ResourceEntry, capability: Capability) -> Result<()> {
    match entry.gate(capability).render(session.store(), || ()) {
        Gated::Content(()) => Ok(()),
        Gated::Fallback(fallback) => Err(anyhow!(fallback
            .text()
            .unwrap_or("Access denied")
            .to_string())),
    }
}

pub fn list_kinds(format: OutputFormat) -> Result<()> {
    let rows: Vec<KindRow> = RESOURCES
        .iter()
        .map(|e| KindRow {
            kind: e.kind,
            module: e.module,
            area: e.area,
            id_field: e.id_field,
        })
        .collect();
    output::print_list(&rows, format)
}

pub async fn execute(cmd: ResourceCommands, session: &Session, format: OutputFormat) -> Result<()> {
    match cmd {
        ResourceCommands::Kinds => list_kinds(format)?,

        ResourceCommands::List { kind, filters } => {
            let entry = resolve(&kind)?;
            authorize(session, entry, Capability::View)?;

            let slice = session.slice(entry);
            slice.fetch_list(filters.into_iter().collect::<Filters>()).await?;

            slice.with_state(|state| output::print_records(&state.collection, format))?;
        }

        ResourceCommands::Show { kind, id } => {
            let entry = resolve(&kind)?;
            authorize(session, entry, Capability::View)?;

            let slice = session.slice(entry);
            slice.fetch_one(id.as_str()).await?;

            let title = format!("{} {}", entry.label, id);
            slice.with_state(|state| match &state.current {
                Some(record) => output::print_record(&title, record, format),
                None => Err(anyhow!("{} {} not found", entry.label, id)),
            })?;
        }

        ResourceCommands::Create { kind, data } => {
            let entry = resolve(&kind)?;
            authorize(session, entry, capability_for(MutationOp::Create))?;

            let slice = session.slice(entry);
            slice.create(parse_payload(&data)?).await?;
            report_success(&slice, format)?;
        }

        ResourceCommands::Update { kind, id, data } => {
            let entry = resolve(&kind)?;
            authorize(session, entry, capability_for(MutationOp::Update))?;

            let slice = session.slice(entry);
            slice.update(id.as_str(), parse_payload(&data)?).await?;
            report_success(&slice, format)?;
        }

        ResourceCommands::Delete { kind, id, force } => {
            let entry = resolve(&kind)?;
            authorize(session, entry, capability_for(MutationOp::Delete))?;

            if !force {
                output::print_info(&format!(
                    "This will delete {} {}. Use --force to skip confirmation.",
                    entry.label, id
                ));
                return Ok(());
            }

            let slice = session.slice(entry);
            slice.delete(id.as_str()).await?;
            report_success(&slice, format)?;
        }
    }

    Ok(())
}

fn report_success(slice: &ResourceSyncSlice<Value>, format: OutputFormat) -> Result<()> {
    let message = slice.with_state(|state| state.success_text().to_string());
    match format {
        OutputFormat::Table => {
            output::print_success(&message);
            Ok(())
        }
        _ => output::print_item(&serde_json::json!({ "message": message }), format),
    }
}
