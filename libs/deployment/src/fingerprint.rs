//! Deployment fingerprints.
//!
//! A fingerprint hashes the placement-relevant state of every instance
//! (`id`, `from`, `on`, `ports`) so two describe passes can be compared
//! without diffing whole descriptors.

use sha2::{Digest, Sha256};

use crate::model::Deployment;

/// A stable hash of a deployment's instance placement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hashes the compact JSON form of `value`. Object keys serialize in
    /// sorted order, so equal values hash equally.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let digest = Sha256::digest(value.to_string().as_bytes());
        Self(format!("sha256:{}", hex::encode(&digest[..16])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deployment {
    /// Fingerprint of the instances' `id`, `from`, `on` and `ports`.
    ///
    /// `added` flags and links do not contribute.
    pub fn fingerprint(&self) -> Fingerprint {
        let instances: Vec<serde_json::Value> = self
            .instances
            .iter()
            .map(|i| {
                serde_json::json!({
                    "id": i.id,
                    "from": i.from,
                    "on": i.on,
                    "ports": i.ports,
                })
            })
            .collect();
        Fingerprint::from_json(&serde_json::Value::Array(instances))
    }
}
