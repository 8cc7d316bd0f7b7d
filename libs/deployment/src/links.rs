//! Link resolution and post-deploy link patching.

use std::collections::HashMap;

use dockyard_ports::{HostPort, Port, PortPair};
use tracing::{debug, info};

use crate::error::{DeploymentError, DeploymentResult};
use crate::locator::Locator;
use crate::model::{Container, Deployment, Instance, InstanceLink, NetworkLink, PortAssignment};
use crate::reservation::PortReservation;

/// Materializes every template link into instance links.
///
/// Each source instance gets one link per target instance per linked port.
/// Ports a link names that the target instance does not carry yet are
/// exposed on it if the target template declares them public. Inferred link
/// ports are written back into `templates`. `hostnames` maps host identity to
/// the hostname links use. Returns the number of links created.
pub(crate) fn resolve_links(
    templates: &mut [Container],
    instances: &mut [Instance],
    reservation: &mut PortReservation,
    hostnames: &HashMap<String, String>,
) -> DeploymentResult<usize> {
    let by_name: HashMap<String, usize> = templates
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.clone(), i))
        .collect();
    let mut created = 0;

    for s in 0..templates.len() {
        for l in 0..templates[s].links.len() {
            let source = templates[s].name.clone();
            let to = templates[s].links[l].to.clone();

            let Some(&t) = by_name.get(&to) else {
                return Err(DeploymentError::LinkTargetNotFound { from: source, to });
            };
            if templates[t].public_ports.is_empty() {
                return Err(DeploymentError::NoPublicPorts { from: source, to });
            }
            if templates[s].links[l].ports.is_empty() {
                templates[s].links[l].ports = templates[t].public_ports.internal_ports();
            }

            let ports = templates[s].links[l].ports.clone();
            let target = &templates[t];
            let sources = indices_of(instances, &source);
            let targets = indices_of(instances, &target.name);
            if sources.is_empty() {
                continue;
            }

            for &port in &ports {
                for &ti in &targets {
                    expose(&mut instances[ti], ti, port, target, &source, reservation)?;
                }
                for &si in &sources {
                    for &ti in &targets {
                        let link = link_to(&instances[ti], port, target, &source, hostnames)?;
                        instances[si].links.push(link);
                        created += 1;
                    }
                }
            }
            debug!(
                from = %source,
                to = %target.name,
                ports = ports.len(),
                sources = sources.len(),
                targets = targets.len(),
                "resolved link"
            );
        }
    }

    Ok(created)
}

fn indices_of(instances: &[Instance], template: &str) -> Vec<usize> {
    instances
        .iter()
        .enumerate()
        .filter(|(_, i)| i.from == template)
        .map(|(idx, _)| idx)
        .collect()
}

/// Makes sure `instance` carries an assignment for `port`.
fn expose(
    instance: &mut Instance,
    owner: usize,
    port: Port,
    target: &Container,
    source: &str,
    reservation: &mut PortReservation,
) -> DeploymentResult<()> {
    if instance.ports.find(port).is_some() {
        return Ok(());
    }
    if !target.public_ports.contains_internal(port) {
        return Err(DeploymentError::PortNotExposed {
            port,
            from: source.to_string(),
            to: target.name.clone(),
        });
    }
    let shared = reservation.reserve_from(port, owner)?;
    info!(%port, instance = %instance.id, %shared, "exposing port so it can be linked");
    instance.ports.push(PortAssignment::new(
        PortPair::new(port, Port::ZERO),
        HostPort::any(shared),
    ));
    Ok(())
}

fn link_to(
    target: &Instance,
    port: Port,
    template: &Container,
    source: &str,
    hostnames: &HashMap<String, String>,
) -> DeploymentResult<InstanceLink> {
    let Some(assignment) = target.ports.find(port) else {
        return Err(DeploymentError::PortNotExposed {
            port,
            from: source.to_string(),
            to: template.name.clone(),
        });
    };
    let network = NetworkLink {
        from_host: assignment.target().host.clone(),
        from_port: assignment.shared(),
        to_port: assignment.external(),
        to_host: match target.on.as_ref().and_then(|on| hostnames.get(&on.identity())) {
            Some(hostname) => hostname.clone(),
            None => target.resolve_hostname()?,
        },
    };
    Ok(InstanceLink::new(network, template.name.clone(), port))
}

impl Deployment {
    /// Points links at the external ports confirmed after installation.
    ///
    /// A link is matched to an instance of its target template whose shared
    /// host/port equals the link's from host/port; a non-zero external port
    /// on that assignment replaces the link's to port.
    pub fn update_links(&mut self) {
        let mut updates = Vec::new();
        for (i, instance) in self.instances.iter().enumerate() {
            for (j, link) in instance.links.iter().enumerate() {
                let shared = link.shared_target();
                let external = self
                    .instances
                    .iter()
                    .filter(|r| r.from == link.from)
                    .filter_map(|r| r.ports.find_target(&shared))
                    .map(PortAssignment::external)
                    .find(|p| !p.is_zero());
                if let Some(external) = external {
                    updates.push((i, j, external));
                }
            }
        }

        for (i, j, external) in updates {
            self.instances[i].links[j].set_to_port(external);
        }
    }

    /// Instance links that still lack a destination port or host.
    pub fn incomplete_links(&self) -> impl Iterator<Item = (&Instance, &InstanceLink)> {
        self.instances
            .iter()
            .flat_map(|i| i.links.iter().map(move |l| (i, l)))
            .filter(|(_, l)| !l.is_complete())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::HostLocator;
    use dockyard_id::Identifier;

    fn placed(id: &str, template: &Container) -> Instance {
        let mut instance = Instance::new(Identifier::new(id).unwrap(), template);
        instance.place(HostLocator::local());
        instance
    }

    #[test]
    fn test_expose_adds_public_port() {
        let db = Container::new("db", "org/db", 1).with_public_port(27017, 0);
        let bare = Container::new("db", "org/db", 1);
        let mut instance = placed("db-1", &bare);
        let mut reservation = PortReservation::new();

        expose(&mut instance, 0, Port::new(27017), &db, "web", &mut reservation).unwrap();
        let assignment = instance.ports.find(Port::new(27017)).unwrap();
        assert_eq!(assignment.external(), Port::ZERO);
        assert_eq!(assignment.shared(), Port::new(27017));
    }

    #[test]
    fn test_expose_rejects_undeclared_port() {
        let db = Container::new("db", "org/db", 1).with_public_port(27017, 0);
        let mut instance = placed("db-1", &db);
        let mut reservation = PortReservation::new();

        let err = expose(&mut instance, 0, Port::new(28017), &db, "web", &mut reservation)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "deployment: target port 28017 on db is not found, cannot link from web"
        );
    }

    #[test]
    fn test_link_points_at_target_host() {
        let db = Container::new("db", "org/db", 1).with_public_port(27017, 4001);
        let mut target = Instance::new(Identifier::new("db-1").unwrap(), &db);
        target.place("10.0.0.7:2223".parse().unwrap());
        target.ports.iter_mut().for_each(|a| a.set_target(HostPort::any(Port::new(27017))));

        let link = link_to(&target, Port::new(27017), &db, "web", &HashMap::new()).unwrap();
        assert_eq!(link.to_host(), "10.0.0.7");
        assert_eq!(link.from_port(), Port::new(27017));
        assert_eq!(link.to_port(), Port::new(4001));
        assert_eq!(link.from, "db");
        assert_eq!(link.from_internal, Port::new(27017));
    }

    #[test]
    fn test_link_uses_resolved_hostname_for_host() {
        let db = Container::new("db", "org/db", 1).with_public_port(27017, 4001);
        let mut target = placed("db-1", &db);
        target.place("node-a".parse().unwrap());
        let hostnames = HashMap::from([("node-a".to_string(), "10.9.9.9".to_string())]);

        let link = link_to(&target, Port::new(27017), &db, "web", &hostnames).unwrap();
        assert_eq!(link.to_host(), "10.9.9.9");
    }
}
