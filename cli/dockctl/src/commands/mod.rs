//! CLI commands.

mod check;
mod describe;
mod links;
mod ports;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use dockyard_deployment::Instance;

use crate::config::Config;
use crate::output::OutputFormat;

/// dockyard - Reconcile container deployments across hosts.
#[derive(Debug, Parser)]
#[command(name = "dockyard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Log filter, overriding the configured level.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compute the next deployment for a set of hosts.
    Describe(describe::DescribeCommand),

    /// Record the external ports an install reported.
    Ports(ports::PortsCommand),

    /// Validate a descriptor.
    Check(check::CheckCommand),

    /// Show resolved links.
    Links(links::LinksCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let format = OutputFormat::parse(&self.format);
        let config = Config::load()?;

        let level = self.log_level.as_deref().unwrap_or(&config.log_level);
        crate::init_tracing(level, format);

        let ctx = CommandContext { config, format };

        match self.command {
            Commands::Describe(cmd) => cmd.run(ctx).await,
            Commands::Ports(cmd) => cmd.run(ctx),
            Commands::Check(cmd) => cmd.run(ctx),
            Commands::Links(cmd) => cmd.run(ctx),
            Commands::Version => {
                println!("dockyard {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
}

/// One instance as listed by `describe` and `check`.
#[derive(Debug, Clone, Serialize, Tabled)]
struct InstanceRow {
    #[tabled(rename = "ID")]
    id: String,

    #[tabled(rename = "From")]
    from: String,

    #[tabled(rename = "On")]
    on: String,

    #[tabled(rename = "Ports")]
    ports: String,

    #[tabled(rename = "Links")]
    links: usize,
}

impl From<&Instance> for InstanceRow {
    fn from(instance: &Instance) -> Self {
        Self {
            id: instance.id.to_string(),
            from: instance.from.clone(),
            on: display_on(instance),
            ports: display_ports(instance),
            links: instance.links.len(),
        }
    }
}

fn display_on(instance: &Instance) -> String {
    instance
        .on
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string())
}

/// `internal:external->shared` per port.
fn display_ports(instance: &Instance) -> String {
    if instance.ports.is_empty() {
        return "-".to_string();
    }
    instance
        .ports
        .iter()
        .map(|a| format!("{}->{}", a.pair(), a.shared()))
        .collect::<Vec<_>>()
        .join(", ")
}
