//! The deployment data model.
//!
//! A [`Deployment`] holds container templates ([`Container`]) and the
//! concrete [`Instance`]s materialized from them. Field names serialize in
//! lowercase; input keys are matched case-insensitively by the loader.

use dockyard_id::Identifier;
use dockyard_ports::{HostPort, Port, PortPair, PortPairs};
use serde::{Deserialize, Serialize};

use crate::error::{DeploymentError, DeploymentResult};
use crate::locator::{HostLocator, Locator};

fn is_false(value: &bool) -> bool {
    !*value
}

// ============================================================================
// Templates
// ============================================================================

/// A container template: what to run and how many copies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,

    #[serde(default)]
    pub image: String,

    /// Ports other containers may reach. External 0 means the host picks.
    #[serde(rename = "publicports", default, skip_serializing_if = "PortPairs::is_empty")]
    pub public_ports: PortPairs,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    #[serde(default)]
    pub count: usize,

    /// Carried through, not used for placement.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub affinity: String,
}

impl Container {
    pub fn new(name: impl Into<String>, image: impl Into<String>, count: usize) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            count,
            ..Self::default()
        }
    }

    pub fn with_public_port(mut self, internal: u16, external: u16) -> Self {
        self.public_ports
            .push(PortPair::new(internal.into(), external.into()));
        self
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }
}

/// A declared relationship from one template to another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub to: String,

    /// Ports to link. Empty means every public port of the target; the
    /// resolved set is written back after a describe.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,

    #[serde(rename = "useprimary", default, skip_serializing_if = "is_false")]
    pub use_primary: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub combine: bool,
}

impl Link {
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            to: target.into(),
            ..Self::default()
        }
    }

    pub fn on_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.ports = ports.into_iter().map(Port::new).collect();
        self
    }
}

// ============================================================================
// Port assignments
// ============================================================================

/// One port of an instance: its pair plus the shared host/port other
/// instances link against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAssignment {
    #[serde(flatten)]
    pair: PortPair,

    #[serde(default, skip_serializing_if = "HostPort::is_empty")]
    shared: HostPort,
}

impl PortAssignment {
    pub fn new(pair: PortPair, shared: HostPort) -> Self {
        Self { pair, shared }
    }

    /// An assignment with nothing shared yet.
    pub fn unshared(pair: PortPair) -> Self {
        Self {
            pair,
            shared: HostPort::default(),
        }
    }

    pub fn internal(&self) -> Port {
        self.pair.internal
    }

    pub fn external(&self) -> Port {
        self.pair.external
    }

    pub fn set_external(&mut self, external: Port) {
        self.pair.external = external;
    }

    /// The port used for linking.
    pub fn shared(&self) -> Port {
        self.shared.port
    }

    /// The full shared host/port.
    pub fn target(&self) -> &HostPort {
        &self.shared
    }

    pub fn set_target(&mut self, target: HostPort) {
        self.shared = target;
    }

    pub fn pair(&self) -> PortPair {
        self.pair
    }
}

/// The ports of one instance. Internal ports are unique within the list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortAssignments(Vec<PortAssignment>);

impl PortAssignments {
    /// Seeds assignments from a template's public ports.
    pub fn from_pairs(pairs: &PortPairs) -> Self {
        Self(pairs.iter().copied().map(PortAssignment::unshared).collect())
    }

    pub fn find(&self, internal: Port) -> Option<&PortAssignment> {
        self.0.iter().find(|a| a.internal() == internal)
    }

    pub fn find_mut(&mut self, internal: Port) -> Option<&mut PortAssignment> {
        self.0.iter_mut().find(|a| a.internal() == internal)
    }

    /// Finds the assignment shared on `target`.
    pub fn find_target(&self, target: &HostPort) -> Option<&PortAssignment> {
        self.0.iter().find(|a| a.target() == target)
    }

    pub fn push(&mut self, assignment: PortAssignment) {
        self.0.push(assignment);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PortAssignment> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, PortAssignment> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The internal/external pairs, as sent in an install request.
    pub fn port_pairs(&self) -> PortPairs {
        self.0.iter().map(PortAssignment::pair).collect()
    }

    /// Copies confirmed external ports in by internal port. Returns true only
    /// when every pair matched an assignment.
    pub fn update(&mut self, changed: &PortPairs) -> bool {
        let mut matched = true;
        for pair in changed {
            match self.find_mut(pair.internal) {
                Some(assignment) => assignment.set_external(pair.external),
                None => matched = false,
            }
        }
        matched
    }
}

impl<'a> IntoIterator for &'a PortAssignments {
    type Item = &'a PortAssignment;
    type IntoIter = std::slice::Iter<'a, PortAssignment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// Links
// ============================================================================

/// The link shape a host agent consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkLink {
    #[serde(rename = "fromhost", default, skip_serializing_if = "String::is_empty")]
    pub from_host: String,

    #[serde(rename = "fromport", default)]
    pub from_port: Port,

    #[serde(rename = "toport", default, skip_serializing_if = "Port::is_zero")]
    pub to_port: Port,

    #[serde(rename = "tohost", default, skip_serializing_if = "String::is_empty")]
    pub to_host: String,
}

impl NetworkLink {
    /// True once the destination port and host are known.
    pub fn is_complete(&self) -> bool {
        !self.to_port.is_zero() && !self.to_host.is_empty()
    }

    /// The from port must be set; a zero to port means "not yet known".
    pub fn check(&self) -> DeploymentResult<()> {
        if self.from_port.is_zero() {
            return Err(DeploymentError::InvalidLink(
                "the from port value must be a positive integer less than 65536".to_string(),
            ));
        }
        Ok(())
    }

    /// Tab-separated line as written to a host agent's links file.
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}",
            self.from_host, self.from_port, self.to_port, self.to_host
        )
    }
}

impl std::fmt::Display for NetworkLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.from_host, self.from_port, self.to_host, self.to_port
        )
    }
}

/// A resolved link from a source instance to one target instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceLink {
    #[serde(flatten)]
    link: NetworkLink,

    /// Target container name.
    #[serde(default)]
    pub from: String,

    /// Target internal port.
    #[serde(rename = "frominternal", default)]
    pub from_internal: Port,

    #[serde(default, skip_serializing_if = "is_false")]
    pub matched: bool,
}

impl InstanceLink {
    pub fn new(link: NetworkLink, from: impl Into<String>, from_internal: Port) -> Self {
        Self {
            link,
            from: from.into(),
            from_internal,
            matched: false,
        }
    }

    pub fn network(&self) -> &NetworkLink {
        &self.link
    }

    pub fn from_host(&self) -> &str {
        &self.link.from_host
    }

    pub fn from_port(&self) -> Port {
        self.link.from_port
    }

    pub fn to_port(&self) -> Port {
        self.link.to_port
    }

    pub fn set_to_port(&mut self, port: Port) {
        self.link.to_port = port;
    }

    pub fn to_host(&self) -> &str {
        &self.link.to_host
    }

    /// The shared host/port this link points at.
    pub fn shared_target(&self) -> HostPort {
        HostPort::new(self.link.from_host.clone(), self.link.from_port)
    }

    pub fn is_complete(&self) -> bool {
        self.link.is_complete()
    }
}

// ============================================================================
// Instances
// ============================================================================

/// One replica of a container template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: Identifier,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Owning template name.
    #[serde(default)]
    pub from: String,

    /// Placement. `None` until the instance is put on a host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<HostLocator>,

    #[serde(default, skip_serializing_if = "PortAssignments::is_empty")]
    pub ports: PortAssignments,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<InstanceLink>,

    /// Set only on the describe pass that created the instance.
    #[serde(skip)]
    pub added: bool,
}

impl Instance {
    pub fn new(id: Identifier, template: &Container) -> Self {
        Self {
            id,
            image: template.image.clone(),
            from: template.name.clone(),
            on: None,
            ports: PortAssignments::from_pairs(&template.public_ports),
            links: Vec::new(),
            added: false,
        }
    }

    /// Places the instance.
    pub fn place(&mut self, on: HostLocator) {
        self.on = Some(on);
    }

    pub fn is_placed(&self) -> bool {
        self.on.is_some()
    }

    /// Hostname of the host this instance runs on.
    pub fn resolve_hostname(&self) -> DeploymentResult<String> {
        self.on
            .as_ref()
            .ok_or_else(|| DeploymentError::Unplaced {
                instance: self.id.clone(),
            })?
            .resolve_hostname()
    }

    /// Applies confirmed external ports. See [`PortAssignments::update`].
    pub fn update_ports(&mut self, pairs: &PortPairs) -> bool {
        self.ports.update(pairs)
    }

    /// The links in the shape a host agent consumes.
    pub fn network_links(&self) -> Vec<NetworkLink> {
        self.links.iter().map(|l| l.network().clone()).collect()
    }
}

// ============================================================================
// Deployment
// ============================================================================

/// Templates plus the instances materialized from them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(default)]
    pub containers: Vec<Container>,

    #[serde(default)]
    pub instances: Vec<Instance>,

    #[serde(rename = "idprefix", default)]
    pub id_prefix: String,

    #[serde(rename = "randomizeids", default)]
    pub randomize_ids: bool,
}

/// The outcome of [`Deployment::describe`].
#[derive(Debug, Clone)]
pub struct Described {
    /// The deployment to persist and dispatch.
    pub next: Deployment,

    /// Instances to tear down, in the order they were dropped.
    pub removed: Vec<Instance>,
}

impl Described {
    /// Instances created by this pass.
    pub fn added(&self) -> impl Iterator<Item = &Instance> {
        self.next.instances.iter().filter(|i| i.added)
    }
}

impl Deployment {
    pub fn new(containers: Vec<Container>) -> Self {
        Self {
            containers,
            ..Self::default()
        }
    }

    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.name == name)
    }

    pub fn instance(&self, id: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.id == id)
    }

    pub fn instance_mut(&mut self, id: &str) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|i| i.id == id)
    }

    /// Instances materialized from the named template.
    pub fn instances_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Instance> + 'a {
        self.instances.iter().filter(move |i| i.from == name)
    }
}
