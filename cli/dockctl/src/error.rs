//! Error handling and display for the CLI.

use colored::Colorize;
use dockyard_deployment::DeploymentError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Instance not found: {0}")]
    UnknownInstance(String),

    #[error("Descriptor has {0} problem(s)")]
    Check(usize),

    #[error(transparent)]
    Deployment(#[from] DeploymentError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let hint = match err.downcast_ref::<CliError>() {
        Some(CliError::UnknownInstance(_)) => {
            Some("Run `dockyard check <FILE>` to list the instances in a descriptor.")
        }
        Some(CliError::Deployment(e)) => deployment_hint(e),
        Some(_) => None,
        None => err.downcast_ref::<DeploymentError>().and_then(deployment_hint),
    };

    if let Some(hint) = hint {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}

fn deployment_hint(err: &DeploymentError) -> Option<&'static str> {
    match err {
        DeploymentError::NoHosts => Some("Pass one or more hosts, or set DOCKYARD_HOSTS."),
        DeploymentError::PortNotExposed { .. } => {
            Some("Declare the port under the target container's publicports.")
        }
        DeploymentError::NoPublicPorts { .. } | DeploymentError::LinkTargetNotFound { .. } => {
            Some("Check the container names and ports used by links.")
        }
        DeploymentError::Http(_) | DeploymentError::Fetch { .. } => {
            Some("Check the descriptor URL, or pass --insecure for self-signed certificates.")
        }
        DeploymentError::Identifier(_) => {
            Some("Instance ids are 4-24 characters; shorten the container name or id prefix.")
        }
        e if e.is_io_error() => Some("Check that the descriptor path exists and is readable."),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_errors_have_hints() {
        let err = DeploymentError::LinkTargetNotFound {
            from: "web".to_string(),
            to: "db".to_string(),
        };
        assert!(deployment_hint(&err).is_some());
        assert!(deployment_hint(&DeploymentError::InvalidLink("x".to_string())).is_none());
    }

    #[test]
    fn test_deployment_errors_display_verbatim() {
        let err = CliError::from(DeploymentError::NoHosts);
        assert_eq!(err.to_string(), "deployment: one or more hosts required");
    }
}
