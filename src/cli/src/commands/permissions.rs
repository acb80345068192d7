//! Permission inspection commands.

use anyhow::{bail, Result};
use clap::Subcommand;
use opsdesk_core::rbac::{AccessGate, Capability, CapabilityRecord, GateDecision};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use crate::session::Session;

#[derive(Subcommand)]
pub enum PermissionCommands {
    /// Show every module the session has a grant for
    Show,

    /// Check one capability on one module
    Check {
        /// Module code (e.g. HR_USERS)
        module: String,

        /// Capability to check
        #[arg(short, long, default_value = "view")]
        capability: Capability,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct ModuleRow {
    #[tabled(rename = "Module")]
    module: String,
    #[tabled(rename = "View")]
    view: &'static str,
    #[tabled(rename = "Create")]
    create: &'static str,
    #[tabled(rename = "Edit")]
    edit: &'static str,
    #[tabled(rename = "Delete")]
    delete: &'static str,
    #[tabled(rename = "Active")]
    active: &'static str,
}

fn mark(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "-"
    }
}

impl ModuleRow {
    fn new(module: String, record: &CapabilityRecord) -> Self {
        Self {
            module,
            view: mark(record.allows(Capability::View)),
            create: mark(record.allows(Capability::Create)),
            edit: mark(record.allows(Capability::Edit)),
            delete: mark(record.allows(Capability::Delete)),
            active: mark(record.active),
        }
    }
}

pub async fn execute(cmd: PermissionCommands, session: &Session, format: OutputFormat) -> Result<()> {
    match cmd {
        PermissionCommands::Show => {
            let Some(model) = session.store().snapshot() else {
                bail!("No permissions loaded");
            };

            match format {
                OutputFormat::Table => {
                    output::print_header(&format!("Permissions: {}", model.subject_id()));
                    let rows: Vec<ModuleRow> = model
                        .modules()
                        .into_iter()
                        .map(|(code, record)| ModuleRow::new(code.to_string(), record))
                        .collect();
                    output::print_list(&rows, format)?;
                }
                _ => output::print_item(model.as_ref(), format)?,
            }
        }

        PermissionCommands::Check { module, capability } => {
            let gate = AccessGate::new(module.as_str()).require(capability);

            match gate.evaluate(session.store()) {
                GateDecision::Allow => match format {
                    OutputFormat::Table => {
                        output::print_success(&format!("{} on {}: allowed", capability, module))
                    }
                    _ => output::print_item(
                        &serde_json::json!({ "module": module, "capability": capability, "allowed": true }),
                        format,
                    )?,
                },
                GateDecision::Deny { record } => {
                    if format != OutputFormat::Table {
                        output::print_item(
                            &serde_json::json!({
                                "module": module,
                                "capability": capability,
                                "allowed": false,
                                "active": record.active,
                            }),
                            format,
                        )?;
                    }
                    bail!("{} on {}: denied", capability, module);
                }
            }
        }
    }

    Ok(())
}
