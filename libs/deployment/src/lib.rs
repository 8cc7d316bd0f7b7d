//! Deployment reconciliation.
//!
//! A [`Deployment`] describes containers to run (templates with an image,
//! replica count, public ports and links to other templates) together with
//! the instances already materialized from them. [`Deployment::describe`]
//! turns that into the next state for a set of hosts:
//!
//! - instances on hosts that are gone, or whose template was deleted, are
//!   removed, and templates over their count lose the excess
//! - missing replicas are created and placed round-robin over the hosts
//! - every port gets a shared port other instances link against
//! - template links are expanded into one link per source instance, target
//!   instance and port
//!
//! After installation reports the real external ports,
//! [`Deployment::update_links`] points links at them.
//!
//! # Invariants
//!
//! - `describe` never modifies its receiver
//! - retained instances keep their id, host and ports across passes
//! - every instance in the result is placed on a host

mod describe;
mod error;
mod fingerprint;
mod links;
mod load;
mod locator;
mod model;
mod reservation;

pub use error::{DeploymentError, DeploymentResult};
pub use fingerprint::Fingerprint;
pub use load::{next_descriptor_name, FetchOptions, DEFAULT_FETCH_TIMEOUT};
pub use locator::{HostLocator, Locator, LOCAL_HOST};
pub use model::{
    Container, Deployment, Described, Instance, InstanceLink, Link, NetworkLink, PortAssignment,
    PortAssignments,
};
pub use reservation::{InstancePortTable, PortReservation, LOOPBACK_BASE, PRIVATE_BASE, WRAP_FLOOR};
