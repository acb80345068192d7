//! OpsDesk CLI - terminal console for the OpsDesk operations backend.
//!
//! Provides permission, resource, and configuration commands. Every resource
//! command is checked against the session's permission manifest before it
//! reaches the backend.

mod commands;
mod output;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use opsdesk_core::config::ConsoleConfig;
use opsdesk_core::telemetry;

use commands::{config, permissions, resource};
use output::OutputFormat;
use session::Session;

/// OpsDesk - operations console CLI
#[derive(Parser)]
#[command(
    name = "opsdesk",
    version = "0.1.0",
    about = "OpsDesk - operations console",
    long_about = "Browse and edit OpsDesk resources within the permissions granted to your session.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API base URL
    #[arg(long, global = true, env = "OPSDESK_API_URL")]
    api_url: Option<String>,

    /// Subject whose permissions are loaded
    #[arg(long, global = true, env = "OPSDESK_SUBJECT")]
    subject: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the session's permissions
    #[command(subcommand)]
    Permissions(permissions::PermissionCommands),

    /// List, show, create, update and delete resources
    #[command(subcommand)]
    Resource(resource::ResourceCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

/// Layer flags and `~/.opsdesk/config.toml` values over the `OPSDESK__*`
/// settings. A flag beats the file, and the file beats the environment.
fn apply_overrides(
    settings: &mut ConsoleConfig,
    api_url: Option<String>,
    subject: Option<String>,
    file_value: impl Fn(&str) -> Option<String>,
) {
    if let Some(url) = api_url.or_else(|| file_value("api-url")) {
        settings.api.base_url = url;
    }
    if let Some(subject) = subject.or_else(|| file_value("subject")) {
        settings.session.subject_id = Some(subject);
    }
    if let Some(token) = file_value("token") {
        settings.api.bearer_token = Some(token);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = ConsoleConfig::load().inspect_err(|e| e.log())?;
    telemetry::init_telemetry(&settings.logging)?;

    apply_overrides(&mut settings, cli.api_url.clone(), cli.subject.clone(), config::load_value);

    let format = cli.output;

    match cli.command {
        Commands::Config(cmd) => config::execute(cmd, format).await,
        Commands::Resource(resource::ResourceCommands::Kinds) => resource::list_kinds(format),
        Commands::Permissions(cmd) => {
            let session = Session::open(&settings).await?;
            permissions::execute(cmd, &session, format).await
        }
        Commands::Resource(cmd) => {
            let session = Session::open(&settings).await?;
            resource::execute(cmd, &session, format).await
        }
    }
}
