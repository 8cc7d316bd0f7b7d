//! Configuration.
//!
//! Settings come from `config.json` in the platform config directory, then
//! `DOCKYARD_*` environment variables, then command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use dockyard_deployment::{FetchOptions, DEFAULT_FETCH_TIMEOUT};
use serde::{Deserialize, Serialize};

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// Get the config directory path.
fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("com", "dockyard", "dockyard")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Timeout for fetching descriptors over HTTP.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Skip TLS verification when fetching descriptors.
    #[serde(default)]
    pub insecure: bool,

    /// Where `describe` writes the next descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,

    /// Hosts used when `describe` is given none.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT.as_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            timeout_secs: default_timeout_secs(),
            insecure: false,
            out_dir: None,
            hosts: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from disk (or defaults) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = config_dir()?.join(CONFIG_FILE);
        Self::load_from(&path)?.with_env(|key| std::env::var(key).ok())
    }

    /// Load config from `path`, or return defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Applies `DOCKYARD_*` overrides looked up through `var`.
    pub fn with_env(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(level) = var("DOCKYARD_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(secs) = var("DOCKYARD_TIMEOUT_SECS") {
            self.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("DOCKYARD_TIMEOUT_SECS is not a number: {secs:?}"))?;
        }
        if let Some(insecure) = var("DOCKYARD_INSECURE") {
            self.insecure = matches!(insecure.trim(), "1" | "true" | "yes");
        }
        if let Some(dir) = var("DOCKYARD_OUT_DIR") {
            self.out_dir = Some(PathBuf::from(dir));
        }
        if let Some(hosts) = var("DOCKYARD_HOSTS") {
            self.hosts = hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(self)
    }

    /// Fetch options, with flags taking precedence.
    pub fn fetch_options(&self, insecure: bool, timeout_secs: Option<u64>) -> FetchOptions {
        FetchOptions {
            insecure: insecure || self.insecure,
            timeout: Duration::from_secs(timeout_secs.unwrap_or(self.timeout_secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.timeout_secs, 30);
        assert!(config.hosts.is_empty());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"insecure": true, "hosts": ["10.0.0.1"]}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.insecure);
        assert_eq!(config.hosts, ["10.0.0.1"]);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default()
            .with_env(env(&[
                ("DOCKYARD_LOG_LEVEL", "debug"),
                ("DOCKYARD_TIMEOUT_SECS", "5"),
                ("DOCKYARD_INSECURE", "true"),
                ("DOCKYARD_OUT_DIR", "/var/lib/dockyard"),
                ("DOCKYARD_HOSTS", "10.0.0.1, 10.0.0.2:2223,"),
            ]))
            .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.timeout_secs, 5);
        assert!(config.insecure);
        assert_eq!(config.out_dir, Some(PathBuf::from("/var/lib/dockyard")));
        assert_eq!(config.hosts, ["10.0.0.1", "10.0.0.2:2223"]);
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let err = Config::default()
            .with_env(env(&[("DOCKYARD_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("DOCKYARD_TIMEOUT_SECS"));
    }

    #[test]
    fn test_flags_win_for_fetch_options() {
        let config = Config::default();
        let options = config.fetch_options(true, Some(3));
        assert!(options.insecure);
        assert_eq!(options.timeout, Duration::from_secs(3));
        assert_eq!(config.fetch_options(false, None).timeout, DEFAULT_FETCH_TIMEOUT);
    }
}
