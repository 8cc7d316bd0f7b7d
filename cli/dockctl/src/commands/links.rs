//! Links command: show resolved links per instance.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use dockyard_deployment::Deployment;
use serde::Serialize;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::{print_output, print_warning, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct LinksCommand {
    /// Descriptor to read.
    file: PathBuf,

    /// Only show links still waiting for a port or host.
    #[arg(long)]
    incomplete: bool,
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct LinkRow {
    #[tabled(rename = "Instance")]
    instance: String,

    #[tabled(rename = "To")]
    to: String,

    #[tabled(rename = "Port")]
    port: u16,

    #[tabled(rename = "Link")]
    link: String,

    #[tabled(rename = "Complete")]
    complete: bool,
}

fn link_rows(deployment: &Deployment, incomplete_only: bool) -> Vec<LinkRow> {
    deployment
        .instances
        .iter()
        .flat_map(|i| i.links.iter().map(move |l| (i, l)))
        .filter(|(_, l)| !incomplete_only || !l.is_complete())
        .map(|(i, l)| LinkRow {
            instance: i.id.to_string(),
            to: l.from.clone(),
            port: l.from_internal.value(),
            link: l.network().to_string(),
            complete: l.is_complete(),
        })
        .collect()
}

impl LinksCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        let deployment = Deployment::from_file(&self.file).map_err(CliError::from)?;
        let rows = link_rows(&deployment, self.incomplete);
        print_output(&rows, ctx.format);

        let waiting = deployment.incomplete_links().count();
        if ctx.format == OutputFormat::Table && waiting > 0 {
            print_warning(&format!(
                "{waiting} link(s) have no destination port yet; record ports with `dockyard ports`"
            ));
        }
        Ok(())
    }
}
