//! Host locators.

use std::fmt;
use std::str::FromStr;

use dockyard_ports::Port;
use serde::{Deserialize, Serialize};

use crate::error::{DeploymentError, DeploymentResult};

/// Name that refers to the machine the tool runs on.
pub const LOCAL_HOST: &str = "local";

/// A host a deployment can place instances on.
pub trait Locator {
    /// Stable key used to compare hosts across describe passes.
    fn identity(&self) -> String;

    /// The hostname links should use to reach this host.
    fn resolve_hostname(&self) -> DeploymentResult<String>;
}

/// A host named by address and optional agent port.
///
/// Serializes as `{"host": "10.0.0.5", "port": 2223}`; the bare
/// `"10.0.0.5:2223"` string form is accepted on input as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LocatorRepr")]
pub struct HostLocator {
    host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<Port>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocatorRepr {
    Text(String),
    Object {
        #[serde(default)]
        host: String,
        #[serde(default)]
        port: Option<Port>,
    },
}

impl TryFrom<LocatorRepr> for HostLocator {
    type Error = DeploymentError;

    fn try_from(repr: LocatorRepr) -> Result<Self, Self::Error> {
        match repr {
            LocatorRepr::Text(s) => s.parse(),
            LocatorRepr::Object { host, port } => Self::new(host, port.filter(|p| !p.is_zero())),
        }
    }
}

impl HostLocator {
    /// Creates a locator, treating an empty host as the local machine.
    pub fn new(host: impl Into<String>, port: Option<Port>) -> DeploymentResult<Self> {
        let host = host.into();
        let host = host.trim();
        if host.chars().any(char::is_whitespace) {
            return Err(DeploymentError::InvalidLocator(host.to_string()));
        }
        let host = if host.is_empty() { LOCAL_HOST } else { host };
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// The local machine.
    pub fn local() -> Self {
        Self {
            host: LOCAL_HOST.to_string(),
            port: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<Port> {
        self.port
    }

    pub fn is_local(&self) -> bool {
        self.host == LOCAL_HOST
    }

    /// Records another locator by its identity. Identities that are not
    /// `host[:port]` are kept whole as the host.
    pub fn from_locator<L: Locator + ?Sized>(locator: &L) -> DeploymentResult<Self> {
        let identity = locator.identity();
        identity.parse().or_else(|_| Self::new(identity, None))
    }
}

impl Locator for HostLocator {
    fn identity(&self) -> String {
        self.to_string()
    }

    fn resolve_hostname(&self) -> DeploymentResult<String> {
        if self.is_local() {
            return Ok("localhost".to_string());
        }
        Ok(self.host.trim_start_matches('[').trim_end_matches(']').to_string())
    }
}

impl fmt::Display for HostLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}

impl FromStr for HostLocator {
    type Err = DeploymentError;

    /// Parses `host`, `host:port`, `[v6]:port` or a bare IPv6 address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || DeploymentError::InvalidLocator(s.to_string());
        if s.contains('/') {
            return Err(invalid());
        }

        if let Some(rest) = s.strip_prefix('[') {
            let (addr, tail) = rest.split_once(']').ok_or_else(invalid)?;
            let port = match tail {
                "" => None,
                tail => Some(
                    tail.strip_prefix(':')
                        .ok_or_else(invalid)?
                        .parse::<Port>()
                        .map_err(|_| invalid())?,
                ),
            };
            return Self::new(format!("[{addr}]"), port);
        }

        match s.split_once(':') {
            Some((host, port)) if !port.contains(':') => {
                let port = port.parse::<Port>().map_err(|_| invalid())?;
                Self::new(host, Some(port))
            }
            _ => Self::new(s, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("local", "local", None)]
    #[case("", "local", None)]
    #[case("10.0.0.5", "10.0.0.5", None)]
    #[case("10.0.0.5:2223", "10.0.0.5", Some(2223))]
    #[case("[::1]:43273", "[::1]", Some(43273))]
    #[case("::1", "::1", None)]
    fn test_parse_locator(#[case] input: &str, #[case] host: &str, #[case] port: Option<u16>) {
        let locator: HostLocator = input.parse().unwrap();
        assert_eq!(locator.host(), host);
        assert_eq!(locator.port(), port.map(Port::new));
    }

    #[rstest]
    #[case("host/path")]
    #[case("host:abc")]
    #[case("[::1")]
    fn test_parse_locator_rejects(#[case] input: &str) {
        assert!(matches!(
            input.parse::<HostLocator>(),
            Err(DeploymentError::InvalidLocator(_))
        ));
    }

    #[test]
    fn test_resolve_hostname() {
        assert_eq!(HostLocator::local().resolve_hostname().unwrap(), "localhost");
        let remote: HostLocator = "10.0.0.5:2223".parse().unwrap();
        assert_eq!(remote.resolve_hostname().unwrap(), "10.0.0.5");
        let v6: HostLocator = "[fd00::1]:2223".parse().unwrap();
        assert_eq!(v6.resolve_hostname().unwrap(), "fd00::1");
    }

    #[test]
    fn test_identity_roundtrips() {
        let locator: HostLocator = "10.0.0.5:2223".parse().unwrap();
        assert_eq!(locator.identity(), "10.0.0.5:2223");
        assert_eq!(HostLocator::from_locator(&locator).unwrap(), locator);
    }

    #[test]
    fn test_opaque_identity_is_kept_whole() {
        struct Remote;
        impl Locator for Remote {
            fn identity(&self) -> String {
                "ssh://node-a".to_string()
            }
            fn resolve_hostname(&self) -> DeploymentResult<String> {
                Ok("10.9.9.9".to_string())
            }
        }

        let locator = HostLocator::from_locator(&Remote).unwrap();
        assert_eq!(locator.identity(), "ssh://node-a");
        assert_eq!(locator.port(), None);

        let json = serde_json::to_string(&locator).unwrap();
        let back: HostLocator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, locator);
    }

    #[test]
    fn test_locator_json_forms() {
        let object: HostLocator =
            serde_json::from_str(r#"{"host":"10.0.0.5","port":2223}"#).unwrap();
        let text: HostLocator = serde_json::from_str(r#""10.0.0.5:2223""#).unwrap();
        assert_eq!(object, text);
        assert_eq!(
            serde_json::to_string(&HostLocator::local()).unwrap(),
            r#"{"host":"local"}"#
        );
    }
}
