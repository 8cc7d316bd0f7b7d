//! Shared port reservation tables.
//!
//! Two strategies:
//! - [`PortReservation`] hands out distinct port numbers on one address and
//!   backs [`Deployment::describe`](crate::Deployment::describe).
//! - [`InstancePortTable`] hands out distinct host/port pairs, walking either
//!   the port or the address.
//!
//! Both live for the duration of one call and are never persisted.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use dockyard_ports::{HostPort, Port};
use tracing::{debug, warn};

use crate::error::{DeploymentError, DeploymentResult};
use crate::model::{Deployment, Instance};

/// Where probing continues after port 65535.
pub const WRAP_FLOOR: Port = Port::new(40000);

/// Base address for loopback reservations.
pub const LOOPBACK_BASE: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);

/// Base address for private reservations.
pub const PRIVATE_BASE: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

/// Upper bound on probes; enough to visit every port once.
const MAX_PROBES: usize = u16::MAX as usize + 1;

fn next_port(port: Port) -> Port {
    if port >= Port::MAX {
        WRAP_FLOOR
    } else {
        Port::new(port.value() + 1)
    }
}

// ============================================================================
// Sequential table
// ============================================================================

/// Port number to owning instance index.
#[derive(Debug, Default)]
pub struct PortReservation {
    reserved: HashMap<Port, usize>,
}

impl PortReservation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `port` for `owner`. Returns false if someone else holds it.
    pub fn reserve(&mut self, port: Port, owner: usize) -> bool {
        match self.reserved.get(&port) {
            Some(&current) if current != owner => {
                warn!(%port, owner, current, "shared port already reserved");
                false
            }
            Some(_) => true,
            None => {
                self.reserved.insert(port, owner);
                true
            }
        }
    }

    /// Claims the first free port at or above `start`, wrapping from 65535
    /// to 40000.
    pub fn reserve_from(&mut self, start: Port, owner: usize) -> DeploymentResult<Port> {
        let mut candidate = start;
        for _ in 0..MAX_PROBES {
            if !candidate.is_zero() && !self.reserved.contains_key(&candidate) {
                self.reserved.insert(candidate, owner);
                debug!(port = %candidate, from = %start, owner, "reserved shared port");
                return Ok(candidate);
            }
            candidate = next_port(candidate);
        }
        Err(DeploymentError::PortsExhausted { from: start })
    }

    /// The instance index holding `port`.
    pub fn owner(&self, port: Port) -> Option<usize> {
        self.reserved.get(&port).copied()
    }

    pub fn is_reserved(&self, port: Port) -> bool {
        self.reserved.contains_key(&port)
    }

    pub fn len(&self) -> usize {
        self.reserved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reserved.is_empty()
    }
}

// ============================================================================
// Host-aware table
// ============================================================================

/// Set of claimed host/port pairs.
#[derive(Debug, Default)]
pub struct InstancePortTable {
    reserved: HashSet<HostPort>,
}

impl InstancePortTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates the table from every instance's shared target.
    pub fn from_instances<'a>(
        instances: impl IntoIterator<Item = &'a Instance>,
    ) -> DeploymentResult<Self> {
        let mut table = Self::new();
        for instance in instances {
            for assignment in &instance.ports {
                let target = assignment.target();
                if target.is_empty() {
                    continue;
                }
                if !table.reserved.insert(target.clone()) {
                    return Err(DeploymentError::PortConflict {
                        target: target.clone(),
                        instance: instance.id.clone(),
                    });
                }
            }
        }
        Ok(table)
    }

    /// Reserves a shared host/port for internal port `from`.
    ///
    /// `loopback` picks 127.0.0.1 over 192.168.1.1 as the base address.
    /// With `same_host` the port stays fixed and the address advances;
    /// otherwise the address stays fixed and the port advances.
    pub fn reserve(&mut self, loopback: bool, same_host: bool, from: Port) -> DeploymentResult<HostPort> {
        let base = if loopback { LOOPBACK_BASE } else { PRIVATE_BASE };
        if same_host {
            self.next_host(base, from)
        } else {
            self.next_port(base, from)
        }
    }

    pub fn contains(&self, target: &HostPort) -> bool {
        self.reserved.contains(target)
    }

    pub fn len(&self) -> usize {
        self.reserved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reserved.is_empty()
    }

    fn next_host(&mut self, base: Ipv4Addr, port: Port) -> DeploymentResult<HostPort> {
        let mut octets = base.octets();
        for _ in 0..MAX_PROBES {
            let key = HostPort::new(Ipv4Addr::from(octets).to_string(), port);
            if self.reserved.insert(key.clone()) {
                debug!(shared = %key, "reserved shared address");
                return Ok(key);
            }
            octets[3] += 1;
            if octets[3] == 255 {
                octets[2] = octets[2].wrapping_add(1);
                octets[3] = 1;
            }
        }
        Err(DeploymentError::PortsExhausted { from: port })
    }

    fn next_port(&mut self, base: Ipv4Addr, from: Port) -> DeploymentResult<HostPort> {
        let host = base.to_string();
        let mut candidate = from;
        for _ in 0..MAX_PROBES {
            let key = HostPort::new(host.clone(), candidate);
            if !candidate.is_zero() && self.reserved.insert(key.clone()) {
                debug!(shared = %key, "reserved shared port");
                return Ok(key);
            }
            candidate = next_port(candidate);
        }
        Err(DeploymentError::PortsExhausted { from })
    }
}

impl Deployment {
    /// Builds the host-aware table for the current instances, failing on
    /// duplicate shared targets.
    pub fn port_table(&self) -> DeploymentResult<InstancePortTable> {
        InstancePortTable::from_instances(&self.instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reserve_conflict() {
        let mut table = PortReservation::new();
        assert!(table.reserve(Port::new(8080), 0));
        assert!(table.reserve(Port::new(8080), 0));
        assert!(!table.reserve(Port::new(8080), 1));
        assert_eq!(table.owner(Port::new(8080)), Some(0));
    }

    #[test]
    fn test_reserve_from_skips_taken() {
        let mut table = PortReservation::new();
        assert_eq!(table.reserve_from(Port::new(8080), 0).unwrap(), Port::new(8080));
        assert_eq!(table.reserve_from(Port::new(8080), 1).unwrap(), Port::new(8081));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_reserve_from_wraps_to_floor() {
        let mut table = PortReservation::new();
        assert!(table.reserve(Port::MAX, 0));
        assert_eq!(table.reserve_from(Port::MAX, 1).unwrap(), WRAP_FLOOR);
        assert_eq!(
            table.reserve_from(Port::new(65534), 2).unwrap(),
            Port::new(65534)
        );
        assert_eq!(
            table.reserve_from(Port::new(65534), 3).unwrap(),
            Port::new(40001)
        );
    }

    #[test]
    fn test_next_port_on_fixed_host() {
        let mut table = InstancePortTable::new();
        let first = table.reserve(true, false, Port::new(27017)).unwrap();
        let second = table.reserve(true, false, Port::new(27017)).unwrap();
        assert_eq!(first, HostPort::new("127.0.0.1", Port::new(27017)));
        assert_eq!(second, HostPort::new("127.0.0.1", Port::new(27018)));
    }

    #[test]
    fn test_next_host_on_fixed_port() {
        let mut table = InstancePortTable::new();
        let first = table.reserve(false, true, Port::new(27017)).unwrap();
        let second = table.reserve(false, true, Port::new(27017)).unwrap();
        assert_eq!(first, HostPort::new("192.168.1.1", Port::new(27017)));
        assert_eq!(second, HostPort::new("192.168.1.2", Port::new(27017)));
    }

    #[test]
    fn test_next_host_carries_into_third_octet() {
        let mut table = InstancePortTable::new();
        let port = Port::new(5432);
        for last in 1..=254u8 {
            let key = HostPort::new(Ipv4Addr::new(192, 168, 1, last).to_string(), port);
            table.reserved.insert(key);
        }
        let next = table.reserve(false, true, port).unwrap();
        assert_eq!(next, HostPort::new("192.168.2.1", port));
    }

    proptest! {
        #[test]
        fn reserve_from_never_hands_out_a_port_twice(starts in prop::collection::vec(1u16.., 1..64)) {
            let mut table = PortReservation::new();
            let mut seen = HashSet::new();
            for (owner, start) in starts.into_iter().enumerate() {
                let port = table.reserve_from(Port::new(start), owner).unwrap();
                prop_assert!(!port.is_zero());
                prop_assert!(seen.insert(port));
                prop_assert!(port >= Port::new(start) || port >= WRAP_FLOOR);
            }
        }
    }
}
