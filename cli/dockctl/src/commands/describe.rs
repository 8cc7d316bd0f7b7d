//! Describe command: compute and save the next deployment.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use dockyard_deployment::{Described, HostLocator, Instance, NetworkLink};
use dockyard_id::{Identifier, RequestId};
use serde::Serialize;
use tabled::Tabled;
use tracing::debug;

use crate::error::CliError;
use crate::output::{print_output, print_single, print_step, print_success, OutputFormat};

use super::{CommandContext, InstanceRow};

#[derive(Debug, Args)]
pub struct DescribeCommand {
    /// Descriptor path or URL (file://, http://, https://).
    source: String,

    /// Hosts to place instances on (`host` or `host:port`).
    hosts: Vec<String>,

    /// Print the plan without writing the next descriptor.
    #[arg(long)]
    dry_run: bool,

    /// Directory for the next descriptor.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Skip TLS verification when fetching the descriptor.
    #[arg(long)]
    insecure: bool,

    /// Fetch timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
}

/// The install request sent for one new instance.
#[derive(Debug, Clone, Serialize)]
struct InstallRequest {
    request: RequestId,
    id: Identifier,
    image: String,
    on: String,
    ports: String,
    #[serde(rename = "networklinks", skip_serializing_if = "Vec::is_empty")]
    network_links: Vec<NetworkLink>,
}

impl From<&Instance> for InstallRequest {
    fn from(instance: &Instance) -> Self {
        Self {
            request: RequestId::new(),
            id: instance.id.clone(),
            image: instance.image.clone(),
            on: super::display_on(instance),
            ports: instance.ports.port_pairs().to_header(),
            network_links: instance.network_links(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct InstallRow {
    #[tabled(rename = "Request")]
    request: String,

    #[tabled(rename = "ID")]
    id: String,

    #[tabled(rename = "Image")]
    image: String,

    #[tabled(rename = "On")]
    on: String,

    #[tabled(rename = "Ports")]
    ports: String,
}

impl From<&InstallRequest> for InstallRow {
    fn from(req: &InstallRequest) -> Self {
        Self {
            request: req.request.short(),
            id: req.id.to_string(),
            image: req.image.clone(),
            on: req.on.clone(),
            ports: if req.ports.is_empty() { "-".to_string() } else { req.ports.clone() },
        }
    }
}

/// A link line printed for the first instance of each container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct LinkLine {
    container: String,
    link: NetworkLink,
}

/// Everything a describe run reports.
#[derive(Debug, Serialize)]
struct Plan {
    removed: Vec<InstanceRow>,
    install: Vec<InstallRequest>,
    links: Vec<LinkLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved: Option<PathBuf>,
}

impl Plan {
    fn new(described: &Described) -> Self {
        Self {
            removed: described.removed.iter().map(InstanceRow::from).collect(),
            install: described.added().map(InstallRequest::from).collect(),
            links: link_lines(described),
            saved: None,
        }
    }
}

/// Links of the first instance of each container, in template order.
fn link_lines(described: &Described) -> Vec<LinkLine> {
    let next = &described.next;
    next.containers
        .iter()
        .filter_map(|c| next.instances_of(&c.name).next().map(|i| (c, i)))
        .flat_map(|(c, i)| {
            i.links.iter().map(move |l| LinkLine {
                container: c.name.clone(),
                link: l.network().clone(),
            })
        })
        .collect()
}

/// Hosts from the command line, else from config, else the local machine.
fn resolve_hosts(args: &[String], configured: &[String]) -> Result<Vec<HostLocator>> {
    let names = if args.is_empty() { configured } else { args };
    if names.is_empty() {
        return Ok(vec![HostLocator::local()]);
    }
    names
        .iter()
        .map(|h| {
            h.parse::<HostLocator>()
                .map_err(|e| CliError::InvalidArgument(e.to_string()).into())
        })
        .collect()
}

impl DescribeCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let options = ctx.config.fetch_options(self.insecure, self.timeout);
        let hosts = resolve_hosts(&self.hosts, &ctx.config.hosts)?;
        debug!(source = %self.source, hosts = hosts.len(), "describing deployment");

        let deployment = dockyard_deployment::Deployment::load(&self.source, &options)
            .await
            .with_context(|| format!("Failed to load deployment from {}", self.source))?;
        let described = deployment.describe(&hosts).map_err(CliError::from)?;

        let mut plan = Plan::new(&described);
        if !self.dry_run {
            let dir = self
                .out_dir
                .or_else(|| ctx.config.out_dir.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            let now = chrono::Local::now().naive_local();
            let path = described
                .next
                .save_next(&self.source, &dir, now)
                .map_err(CliError::from)?;
            plan.saved = Some(path);
        }

        match ctx.format {
            OutputFormat::Json => print_single(&plan),
            OutputFormat::Table => print_plan(&plan),
        }
        Ok(())
    }
}

fn print_plan(plan: &Plan) {
    if !plan.removed.is_empty() {
        print_step("Removing");
        print_output(&plan.removed, OutputFormat::Table);
    }
    if !plan.install.is_empty() {
        print_step("Installing");
        let rows: Vec<InstallRow> = plan.install.iter().map(InstallRow::from).collect();
        print_output(&rows, OutputFormat::Table);
    }
    for line in &plan.links {
        print_step(&format!("Linking {}: {}", line.container, line.link));
    }
    match &plan.saved {
        Some(path) => print_success(&format!("Saved next deployment to {}", path.display())),
        None if plan.removed.is_empty() && plan.install.is_empty() => {
            print_success("Deployment is up to date")
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockyard_deployment::{Container, Deployment, Link};

    #[test]
    fn resolve_hosts_prefers_arguments() {
        let args = vec!["10.0.0.1".to_string()];
        let configured = vec!["10.0.0.2".to_string(), "10.0.0.3".to_string()];
        assert_eq!(resolve_hosts(&args, &configured).unwrap().len(), 1);
        assert_eq!(resolve_hosts(&[], &configured).unwrap().len(), 2);
        assert_eq!(resolve_hosts(&[], &[]).unwrap(), [HostLocator::local()]);
        assert!(resolve_hosts(&["a b".to_string()], &[]).is_err());
    }

    #[test]
    fn plan_lists_installs_and_first_instance_links() {
        let dep = Deployment::new(vec![
            Container::new("web", "org/app", 2)
                .with_public_port(8080, 0)
                .with_link(Link::to("db")),
            Container::new("db", "org/db", 2).with_public_port(27017, 0),
        ]);
        let described = dep.describe(&[HostLocator::local()]).unwrap();
        let plan = Plan::new(&described);

        assert!(plan.removed.is_empty());
        assert_eq!(plan.install.len(), 4);
        assert_eq!(plan.install[0].ports, "8080:0");
        assert_eq!(plan.install[0].network_links.len(), 2);
        assert_ne!(plan.install[0].request, plan.install[1].request);

        assert_eq!(plan.links.len(), 2);
        assert!(plan.links.iter().all(|l| l.container == "web"));
        assert_eq!(plan.links[0].link.to_string(), ":27017 -> localhost:0");
    }
}
