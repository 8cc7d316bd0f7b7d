//! Ports command: record the external ports an install reported.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use dockyard_deployment::Deployment;
use dockyard_ports::PortPairs;
use tracing::info;

use crate::error::CliError;
use crate::output::{print_single, print_success, print_warning, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct PortsCommand {
    /// Descriptor to update in place.
    file: PathBuf,

    /// Instance the ports belong to.
    instance: String,

    /// Confirmed ports as `internal:external,...`.
    pairs: String,
}

impl PortsCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        let pairs: PortPairs = self
            .pairs
            .parse()
            .map_err(|e| CliError::InvalidArgument(format!("{e}")))?;

        let mut deployment = Deployment::from_file(&self.file).map_err(CliError::from)?;
        let matched = record_ports(&mut deployment, &self.instance, &pairs)?;
        deployment.write_to(&self.file).map_err(CliError::from)?;

        let waiting = deployment.incomplete_links().count();
        info!(instance = %self.instance, ports = %pairs, waiting, "recorded ports");

        match ctx.format {
            OutputFormat::Json => {
                if let Some(instance) = deployment.instance(&self.instance) {
                    print_single(instance);
                }
            }
            OutputFormat::Table => {
                if !matched {
                    print_warning(&format!(
                        "Not all ports listed ({pairs}) belong to {}",
                        self.instance
                    ));
                }
                print_success(&format!(
                    "Updated {} ({waiting} link(s) still waiting for ports)",
                    self.file.display()
                ));
            }
        }
        Ok(())
    }
}

/// Applies `pairs` to the instance and repoints links. Returns whether
/// every pair matched one of the instance's ports.
fn record_ports(deployment: &mut Deployment, id: &str, pairs: &PortPairs) -> Result<bool, CliError> {
    let instance = deployment
        .instance_mut(id)
        .ok_or_else(|| CliError::UnknownInstance(id.to_string()))?;
    let matched = instance.update_ports(pairs);
    deployment.update_links();
    Ok(matched)
}
