//! Instance reconciliation.
//!
//! [`Deployment::describe`] diffs the templates against the existing
//! instances and produces the next deployment: stale instances removed,
//! shortfalls created, everything placed, shared ports reserved and links
//! resolved. The receiver is never modified.

use std::collections::{HashMap, HashSet};

use dockyard_id::Identifier;
use tracing::{debug, info};

use crate::error::{DeploymentError, DeploymentResult};
use crate::links::resolve_links;
use crate::locator::{HostLocator, Locator};
use crate::model::{Deployment, Described, Instance};
use crate::reservation::PortReservation;

/// An existing instance and what the classification pass learned about it.
struct Classified {
    instance: Instance,
    template: Option<usize>,
    remove: bool,
}

impl Deployment {
    /// Computes the next deployment for `hosts`.
    ///
    /// Instances without a host are dropped, instances on hosts not in
    /// `hosts` or without a template are removed, and templates over their
    /// count lose the excess. Missing replicas are created and placed
    /// round-robin over `hosts`.
    pub fn describe<L: Locator>(&self, hosts: &[L]) -> DeploymentResult<Described> {
        if hosts.is_empty() {
            return Err(DeploymentError::NoHosts);
        }
        let placements = hosts
            .iter()
            .map(HostLocator::from_locator)
            .collect::<DeploymentResult<Vec<_>>>()?;
        let mut hostnames = HashMap::with_capacity(hosts.len());
        for host in hosts {
            hostnames.insert(host.identity(), host.resolve_hostname()?);
        }

        let mut templates = self.containers.clone();
        let by_name: HashMap<String, usize> = templates
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        let mut found = vec![0usize; templates.len()];

        // Classify existing instances.
        let mut classified = Vec::with_capacity(self.instances.len());
        for instance in &self.instances {
            let Some(on) = &instance.on else {
                debug!(instance = %instance.id, "dropping instance that was never placed");
                continue;
            };
            let remove = !hostnames.contains_key(&on.identity());
            let template = by_name.get(&instance.from).copied();
            if let Some(t) = template {
                found[t] += 1;
            }
            let mut instance = instance.clone();
            instance.added = false;
            classified.push(Classified {
                instance,
                template,
                remove,
            });
        }

        // Filter removals.
        let mut valid = Vec::with_capacity(classified.len());
        let mut removed = Vec::new();
        for Classified {
            instance,
            template,
            remove,
        } in classified
        {
            let purge = match template {
                None => true,
                Some(t) => remove || found[t] > templates[t].count,
            };
            if purge {
                if let Some(t) = template {
                    found[t] -= 1;
                }
                info!(instance = %instance.id, from = %instance.from, "removing instance");
                removed.push(instance);
            } else {
                valid.push(instance);
            }
        }

        // Create shortfall instances.
        let mut taken: HashSet<Identifier> = valid.iter().map(|i| i.id.clone()).collect();
        for (t, template) in templates.iter().enumerate() {
            let shortfall = template.count.saturating_sub(found[t]);
            let mut n = found[t];
            for _ in 0..shortfall {
                let id = if self.randomize_ids {
                    random_identifier(&self.id_prefix, &taken)?
                } else {
                    loop {
                        n += 1;
                        let id = Identifier::new(format!("{}{}-{}", self.id_prefix, template.name, n))?;
                        if !taken.contains(&id) {
                            break id;
                        }
                    }
                };
                taken.insert(id.clone());
                valid.push(Instance::new(id, template));
            }
        }

        // Reserve retained shared ports before allocating anything new.
        let mut reservation = PortReservation::new();
        for (owner, instance) in valid.iter().enumerate() {
            for assignment in &instance.ports {
                let shared = assignment.shared();
                if !shared.is_zero() {
                    reservation.reserve(shared, owner);
                }
            }
        }

        // Place new instances and fill in shared ports.
        let mut pos = 0;
        for (owner, instance) in valid.iter_mut().enumerate() {
            if !instance.is_placed() {
                let on = placements[pos % placements.len()].clone();
                pos += 1;
                debug!(instance = %instance.id, on = %on, "placing instance");
                instance.added = true;
                instance.place(on);
            }
            for assignment in instance.ports.iter_mut() {
                if assignment.shared().is_zero() {
                    let shared = reservation.reserve_from(assignment.internal(), owner)?;
                    let mut target = assignment.target().clone();
                    target.port = shared;
                    assignment.set_target(target);
                }
            }
            instance.links.clear();
        }

        let linked = resolve_links(&mut templates, &mut valid, &mut reservation, &hostnames)?;

        info!(
            instances = valid.len(),
            added = pos,
            removed = removed.len(),
            links = linked,
            "described deployment"
        );

        Ok(Described {
            next: Deployment {
                containers: templates,
                instances: valid,
                id_prefix: self.id_prefix.clone(),
                randomize_ids: self.randomize_ids,
            },
            removed,
        })
    }
}

fn random_identifier(prefix: &str, taken: &HashSet<Identifier>) -> DeploymentResult<Identifier> {
    loop {
        let id = Identifier::random(prefix)?;
        if !taken.contains(&id) {
            return Ok(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Container;
    use dockyard_ports::Port;

    fn one_host() -> Vec<HostLocator> {
        vec!["127.0.0.1".parse().unwrap()]
    }

    #[test]
    fn test_deterministic_ids_skip_taken() {
        let mut dep = Deployment::new(vec![Container::new("web", "org/app", 2)]);
        let mut existing = Instance::new(Identifier::new("web-2").unwrap(), &dep.containers[0]);
        existing.place(one_host()[0].clone());
        dep.instances.push(existing);

        let described = dep.describe(&one_host()).unwrap();
        let ids: Vec<_> = described.next.instances.iter().map(|i| i.id.to_string()).collect();
        assert_eq!(ids, ["web-2", "web-3"]);
    }

    #[test]
    fn test_prefix_applies_to_ids() {
        let mut dep = Deployment::new(vec![Container::new("web", "org/app", 1)]);
        dep.id_prefix = "prod.".to_string();
        let described = dep.describe(&one_host()).unwrap();
        assert_eq!(described.next.instances[0].id, "prod.web-1");
    }

    #[test]
    fn test_long_name_fails_identifier_validation() {
        let dep = Deployment::new(vec![Container::new("a-very-long-container-name", "org/app", 1)]);
        assert!(matches!(
            dep.describe(&one_host()),
            Err(DeploymentError::Identifier(_))
        ));
    }

    #[test]
    fn test_excess_instances_are_removed() {
        let mut dep = Deployment::new(vec![Container::new("web", "org/app", 3)]);
        let first = dep.describe(&one_host()).unwrap().next;
        dep = first;
        dep.containers[0].count = 1;

        let described = dep.describe(&one_host()).unwrap();
        assert_eq!(described.next.instances.len(), 1);
        assert_eq!(described.removed.len(), 2);
    }

    #[test]
    fn test_added_only_on_creating_pass() {
        let dep = Deployment::new(vec![Container::new("web", "org/app", 2)]);
        let first = dep.describe(&one_host()).unwrap();
        assert_eq!(first.added().count(), 2);

        let mut next = first.next;
        next.containers[0].count = 3;
        let second = next.describe(&one_host()).unwrap();
        let added: Vec<_> = second.added().map(|i| i.id.to_string()).collect();
        assert_eq!(added, ["web-3"]);

        let third = second.next.describe(&one_host()).unwrap();
        assert_eq!(third.added().count(), 0);
        assert!(third.removed.is_empty());
    }

    #[test]
    fn test_colliding_retained_ports_are_kept() {
        let dep = Deployment::new(vec![Container::new("web", "org/app", 2).with_public_port(8080, 0)]);
        let mut next = dep.describe(&one_host()).unwrap().next;
        let first = next.instances[0].ports.find(8080.into()).unwrap().target().clone();
        next.instances[1]
            .ports
            .find_mut(8080.into())
            .unwrap()
            .set_target(first);

        let described = next.describe(&one_host()).unwrap();
        assert!(described.removed.is_empty());
        let shared: Vec<_> = described
            .next
            .instances
            .iter()
            .map(|i| i.ports.find(8080.into()).unwrap().shared())
            .collect();
        assert_eq!(shared, [Port::new(8080), Port::new(8080)]);
    }

    #[test]
    fn test_round_robin_skips_placed_instances() {
        let hosts: Vec<HostLocator> = vec!["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()];
        let dep = Deployment::new(vec![Container::new("web", "org/app", 3)]);
        let described = dep.describe(&hosts).unwrap();
        let on: Vec<_> = described
            .next
            .instances
            .iter()
            .map(|i| i.on.as_ref().unwrap().host().to_string())
            .collect();
        assert_eq!(on, ["10.0.0.1", "10.0.0.2", "10.0.0.1"]);
    }
}
