//! Deployment errors.

use std::path::PathBuf;

use dockyard_id::{IdError, Identifier};
use dockyard_ports::{HostPort, Port};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type DeploymentResult<T> = Result<T, DeploymentError>;

/// Errors raised while describing, linking or loading a deployment.
#[derive(Debug, Error)]
pub enum DeploymentError {
    /// Describe was called without any hosts to place on.
    #[error("deployment: one or more hosts required")]
    NoHosts,

    /// A link names a container that is not part of the deployment.
    #[error("deployment: target {to} not found for source {from}")]
    LinkTargetNotFound { from: String, to: String },

    /// The link target declares no public ports.
    #[error("deployment: target {to} has no public ports to link to from {from}")]
    NoPublicPorts { from: String, to: String },

    /// A link references a port the target never declares.
    #[error("deployment: target port {port} on {to} is not found, cannot link from {from}")]
    PortNotExposed { port: Port, from: String, to: String },

    /// Two instances claim the same shared host/port.
    #[error("deployment: the port {target} is assigned to multiple instances (last: {instance})")]
    PortConflict { target: HostPort, instance: Identifier },

    /// No free port or address was left to reserve.
    #[error("deployment: no free shared port available starting from {from}")]
    PortsExhausted { from: Port },

    /// An instance was expected to be placed on a host.
    #[error("deployment: instance {instance} is not assigned to a host")]
    Unplaced { instance: Identifier },

    /// A host locator could not be parsed.
    #[error("deployment: invalid host locator '{0}'")]
    InvalidLocator(String),

    /// A network link carries out-of-range ports.
    #[error("deployment: invalid link: {0}")]
    InvalidLink(String),

    /// Identifier generation or validation failed.
    #[error(transparent)]
    Identifier(#[from] IdError),

    /// Reading or writing a descriptor failed.
    #[error("deployment: unable to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The descriptor is not valid JSON for a deployment.
    #[error("deployment: invalid descriptor: {0}")]
    Parse(#[from] serde_json::Error),

    /// The descriptor URL answered with a non-200 status.
    #[error("Get({url}): {status}")]
    Fetch { url: String, status: u16 },

    /// The HTTP request itself failed.
    #[error("deployment: request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The descriptor location is neither a path nor a supported URL.
    #[error("Unsupported URL Scheme '{0}' for deployment")]
    UnsupportedScheme(String),
}

impl DeploymentError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for errors in the link declarations of the templates.
    pub fn is_link_error(&self) -> bool {
        matches!(
            self,
            Self::LinkTargetNotFound { .. } | Self::NoPublicPorts { .. } | Self::PortNotExposed { .. }
        )
    }

    /// Returns true for errors raised while loading or saving a descriptor.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::Parse(_)
                | Self::Fetch { .. }
                | Self::Http(_)
                | Self::UnsupportedScheme(_)
        )
    }
}
