//! Check command: validate a descriptor without describing it.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use dockyard_deployment::Deployment;
use serde::Serialize;

use crate::error::CliError;
use crate::output::{print_output, print_single, print_success, OutputFormat};

use super::{CommandContext, InstanceRow};

#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Descriptor to validate.
    file: PathBuf,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    problems: Vec<String>,
    instances: Vec<InstanceRow>,
}

impl CheckCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        let deployment = Deployment::from_file(&self.file).map_err(CliError::from)?;
        let report = CheckReport {
            problems: problems(&deployment),
            instances: deployment.instances.iter().map(InstanceRow::from).collect(),
        };

        match ctx.format {
            OutputFormat::Json => print_single(&report),
            OutputFormat::Table => {
                print_output(&report.instances, OutputFormat::Table);
                for problem in &report.problems {
                    eprintln!("{} {}", "-".red(), problem);
                }
                if report.problems.is_empty() {
                    print_success(&format!("{} is valid", self.file.display()));
                }
            }
        }

        if report.problems.is_empty() {
            Ok(())
        } else {
            Err(CliError::Check(report.problems.len()).into())
        }
    }
}

/// Everything wrong with a descriptor, in a stable order.
fn problems(deployment: &Deployment) -> Vec<String> {
    let mut problems = Vec::new();

    let mut names = HashSet::new();
    for container in &deployment.containers {
        if !names.insert(container.name.as_str()) {
            problems.push(format!("container {} is declared more than once", container.name));
        }
        for link in &container.links {
            match deployment.container(&link.to) {
                None => problems.push(format!(
                    "container {} links to unknown container {}",
                    container.name, link.to
                )),
                Some(target) if target.public_ports.is_empty() => problems.push(format!(
                    "container {} links to {}, which has no public ports",
                    container.name, link.to
                )),
                Some(target) => {
                    for port in &link.ports {
                        if !target.public_ports.contains_internal(*port) {
                            problems.push(format!(
                                "container {} links to port {} on {}, which is not public",
                                container.name, port, link.to
                            ));
                        }
                    }
                }
            }
        }
    }

    let mut ids = HashSet::new();
    for instance in &deployment.instances {
        if let Err(e) = instance.id.validate() {
            problems.push(format!("instance {}: {}", instance.id, e));
        }
        if !ids.insert(&instance.id) {
            problems.push(format!("instance {} is declared more than once", instance.id));
        }
        for link in instance.network_links() {
            if let Err(e) = link.check() {
                problems.push(format!("instance {} link {}: {}", instance.id, link, e));
            }
        }
    }

    if let Err(e) = deployment.port_table() {
        problems.push(e.to_string());
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_descriptor_has_no_problems() {
        let dep = Deployment::from_json_str(
            r#"{"containers": [
                {"name": "web", "count": 1, "links": [{"to": "db"}]},
                {"name": "db", "count": 1, "publicports": [{"internal": 27017}]}
            ]}"#,
        )
        .unwrap();
        assert!(problems(&dep).is_empty());
    }

    #[test]
    fn reports_each_problem() {
        let dep = Deployment::from_json_str(
            r#"{
              "containers": [
                {"name": "web", "count": 1, "links": [{"to": "cache"}, {"to": "db", "ports": [5432]}]},
                {"name": "web", "count": 1},
                {"name": "db", "count": 1, "publicports": [{"internal": 27017}]}
              ],
              "instances": [
                {"id": "foo", "from": "web", "ports": [{"internal": 8080, "shared": {"port": 8080}}]},
                {"id": "web-2", "from": "web", "ports": [{"internal": 8080, "shared": {"port": 8080}}]}
              ]
            }"#,
        )
        .unwrap();

        let found = problems(&dep);
        assert_eq!(found.len(), 5, "{found:#?}");
        assert!(found[0].contains("unknown container cache"));
        assert!(found[1].contains("port 5432 on db"));
        assert!(found[2].contains("declared more than once"));
        assert!(found[3].starts_with("instance foo"));
        assert!(found[4].contains("assigned to multiple instances (last: web-2)"));
    }
}
