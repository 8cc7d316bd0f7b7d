//! Port primitives for container deployments.
//!
//! This library provides:
//! - `Port` and `HostPort` values
//! - `PortPair` / `PortPairs` mapping a container's internal port to the
//!   external port its host exposes, plus the `internal:external,...` header
//!   form install responses use
//! - `PortAllocator`, a bounded sequential allocator

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    /// Not a number between 0 and 65535.
    #[error("invalid port: {0}")]
    InvalidPort(String),

    /// A pair in a port header is not `internal:external`.
    #[error("malformed port pair '{0}', expected internal:external")]
    MalformedPair(String),

    /// Allocator bounds are reversed or include port 0.
    #[error("invalid port range {min}-{max}")]
    InvalidRange { min: u16, max: u16 },

    /// Every port in the allocator's range is taken.
    #[error("no free ports left in {min}-{max}")]
    Exhausted { min: u16, max: u16 },
}

// ============================================================================
// Ports
// ============================================================================

/// A TCP port. Zero means "not assigned".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    /// The unassigned port.
    pub const ZERO: Port = Port(0);

    /// Highest port number.
    pub const MAX: Port = Port(u16::MAX);

    pub const fn new(port: u16) -> Self {
        Self(port)
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<u16> for Port {
    fn from(port: u16) -> Self {
        Self(port)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Port {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u16>()
            .map(Port)
            .map_err(|_| PortError::InvalidPort(s.to_string()))
    }
}

/// A port bound on a specific address. An empty host means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostPort {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,

    #[serde(default, skip_serializing_if = "Port::is_zero")]
    pub port: Port,
}

impl HostPort {
    pub fn new(host: impl Into<String>, port: Port) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// A port with no host attached.
    pub fn any(port: Port) -> Self {
        Self {
            host: String::new(),
            port,
        }
    }

    /// True when neither host nor port is set.
    pub fn is_empty(&self) -> bool {
        self.host.is_empty() && self.port.is_zero()
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.is_empty() {
            write!(f, ":{}", self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

// ============================================================================
// Port pairs
// ============================================================================

/// A container port and the host port it is published on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortPair {
    pub internal: Port,

    #[serde(default)]
    pub external: Port,
}

impl PortPair {
    pub const fn new(internal: Port, external: Port) -> Self {
        Self { internal, external }
    }
}

impl fmt::Display for PortPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.internal, self.external)
    }
}

impl FromStr for PortPair {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (internal, external) = s
            .split_once(':')
            .ok_or_else(|| PortError::MalformedPair(s.to_string()))?;
        let internal = internal
            .parse()
            .map_err(|_| PortError::MalformedPair(s.to_string()))?;
        let external = external
            .parse()
            .map_err(|_| PortError::MalformedPair(s.to_string()))?;
        Ok(Self { internal, external })
    }
}

/// An ordered list of port pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortPairs(Vec<PortPair>);

impl PortPairs {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Finds the pair for an internal port.
    pub fn find(&self, internal: Port) -> Option<&PortPair> {
        self.0.iter().find(|p| p.internal == internal)
    }

    pub fn contains_internal(&self, internal: Port) -> bool {
        self.find(internal).is_some()
    }

    pub fn push(&mut self, pair: PortPair) {
        self.0.push(pair);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PortPair> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The internal ports, in order.
    pub fn internal_ports(&self) -> Vec<Port> {
        self.0.iter().map(|p| p.internal).collect()
    }

    /// Renders the `internal:external,...` header form.
    pub fn to_header(&self) -> String {
        self.to_string()
    }

    /// Parses the `internal:external,...` header form. Blank input is an
    /// empty list.
    pub fn from_header(header: &str) -> Result<Self, PortError> {
        header
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for PortPairs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pair) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{pair}")?;
        }
        Ok(())
    }
}

impl FromStr for PortPairs {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_header(s)
    }
}

impl From<Vec<PortPair>> for PortPairs {
    fn from(pairs: Vec<PortPair>) -> Self {
        Self(pairs)
    }
}

impl FromIterator<PortPair> for PortPairs {
    fn from_iter<I: IntoIterator<Item = PortPair>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PortPairs {
    type Item = &'a PortPair;
    type IntoIter = std::slice::Iter<'a, PortPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// Allocation
// ============================================================================

/// Sequential port allocator over an inclusive range.
///
/// Hands out the next free port after the last one allocated, wrapping back
/// to `min`. Ports can be marked taken up front (e.g. when restoring state).
#[derive(Debug, Clone)]
pub struct PortAllocator {
    min: u16,
    max: u16,
    next: u16,
    taken: BTreeSet<u16>,
}

impl PortAllocator {
    /// Create an allocator for `min..=max`.
    pub fn new(min: u16, max: u16) -> Result<Self, PortError> {
        if min == 0 || min > max {
            return Err(PortError::InvalidRange { min, max });
        }
        Ok(Self {
            min,
            max,
            next: min,
            taken: BTreeSet::new(),
        })
    }

    /// Allocate the next free port.
    pub fn allocate(&mut self) -> Result<Port, PortError> {
        if self.remaining() == 0 {
            return Err(PortError::Exhausted {
                min: self.min,
                max: self.max,
            });
        }

        let mut candidate = self.next;
        while self.taken.contains(&candidate) {
            candidate = self.step(candidate);
        }

        self.taken.insert(candidate);
        self.next = self.step(candidate);
        Ok(Port(candidate))
    }

    /// Mark a port as in use. Returns false if it was already taken or lies
    /// outside the range.
    pub fn mark_taken(&mut self, port: Port) -> bool {
        self.in_range(port) && self.taken.insert(port.0)
    }

    /// Return a port to the pool.
    pub fn release(&mut self, port: Port) -> bool {
        self.taken.remove(&port.0)
    }

    pub fn is_taken(&self, port: Port) -> bool {
        self.taken.contains(&port.0)
    }

    pub fn in_range(&self, port: Port) -> bool {
        (self.min..=self.max).contains(&port.0)
    }

    /// Number of ports still free.
    pub fn remaining(&self) -> usize {
        usize::from(self.max - self.min) + 1 - self.taken.len()
    }

    fn step(&self, port: u16) -> u16 {
        if port >= self.max {
            self.min
        } else {
            port + 1
        }
    }
}
