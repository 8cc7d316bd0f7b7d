//! Loading and saving deployment descriptors.
//!
//! Descriptors are JSON. Keys are matched case-insensitively on input
//! (`PublicPorts`, `publicports`), written lowercase on output.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::header::ACCEPT;
use reqwest::Url;
use tracing::{debug, info};

use crate::error::{DeploymentError, DeploymentResult};
use crate::model::Deployment;

/// Default timeout for fetching a descriptor over HTTP.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timestamp appended to saved descriptors.
const SAVE_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Options for fetching descriptors over HTTP.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Skip TLS certificate verification.
    pub insecure: bool,

    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl Deployment {
    /// Parses a descriptor.
    pub fn from_json_str(body: &str) -> DeploymentResult<Self> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        Ok(serde_json::from_value(lowercase_keys(value))?)
    }

    /// Reads a descriptor from disk.
    pub fn from_file(path: impl AsRef<Path>) -> DeploymentResult<Self> {
        let path = path.as_ref();
        let body = fs::read_to_string(path).map_err(|e| DeploymentError::io(path, e))?;
        debug!(path = %path.display(), bytes = body.len(), "read deployment descriptor");
        Self::from_json_str(&body)
    }

    /// Fetches a descriptor from a `file://`, `http://` or `https://` URL.
    pub async fn from_url(url: &str, options: &FetchOptions) -> DeploymentResult<Self> {
        let parsed = Url::parse(url).map_err(|_| DeploymentError::UnsupportedScheme(url.to_string()))?;
        match parsed.scheme() {
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| DeploymentError::UnsupportedScheme(url.to_string()))?;
                Self::from_file(path)
            }
            "http" | "https" => {
                let client = reqwest::Client::builder()
                    .danger_accept_invalid_certs(options.insecure)
                    .timeout(options.timeout)
                    .build()?;
                let response = client
                    .get(parsed.clone())
                    .header(ACCEPT, "application/json")
                    .send()
                    .await?;

                let status = response.status();
                if status != reqwest::StatusCode::OK {
                    return Err(DeploymentError::Fetch {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }

                let body = response.text().await?;
                info!(%url, bytes = body.len(), "fetched deployment descriptor");
                Self::from_json_str(&body)
            }
            other => Err(DeploymentError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Loads from a plain path or any supported URL.
    pub async fn load(source: &str, options: &FetchOptions) -> DeploymentResult<Self> {
        if source.contains("://") {
            Self::from_url(source, options).await
        } else {
            Self::from_file(source)
        }
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_pretty_json(&self) -> DeploymentResult<String> {
        let mut body = serde_json::to_string_pretty(self)?;
        body.push('\n');
        Ok(body)
    }

    /// Writes the descriptor to `path`, replacing any existing file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> DeploymentResult<()> {
        let path = path.as_ref();
        fs::write(path, self.to_pretty_json()?).map_err(|e| DeploymentError::io(path, e))
    }

    /// Writes the descriptor next to its source under a timestamped name and
    /// returns the path written.
    pub fn save_next(
        &self,
        source: &str,
        dir: impl AsRef<Path>,
        now: NaiveDateTime,
    ) -> DeploymentResult<PathBuf> {
        let path = dir.as_ref().join(next_descriptor_name(source, now));
        self.write_to(&path)?;
        info!(path = %path.display(), "saved deployment descriptor");
        Ok(path)
    }
}

/// `<base>.<YYYYMMDD-HHMMSS>`, where `<base>` is the last segment of
/// `source` with any earlier timestamp removed.
pub fn next_descriptor_name(source: &str, now: NaiveDateTime) -> String {
    let trimmed = source.trim_end_matches('/');
    let base = trimmed
        .rsplit(['/', '\\'])
        .next()
        .filter(|b| !b.is_empty())
        .unwrap_or("deployment");
    format!("{}.{}", strip_stamp(base), now.format(SAVE_STAMP_FORMAT))
}

/// Removes a trailing `.DDDDDDDD-DDDDDD`.
fn strip_stamp(base: &str) -> &str {
    const STAMP_LEN: usize = ".20060102-150405".len();
    if base.len() < STAMP_LEN || !base.is_char_boundary(base.len() - STAMP_LEN) {
        return base;
    }
    let (head, tail) = base.split_at(base.len() - STAMP_LEN);
    let bytes = tail.as_bytes();
    let is_stamp = bytes[0] == b'.'
        && bytes[9] == b'-'
        && bytes[1..9].iter().all(u8::is_ascii_digit)
        && bytes[10..].iter().all(u8::is_ascii_digit);
    if is_stamp {
        head
    } else {
        base
    }
}

fn lowercase_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), lowercase_keys(v)))
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(lowercase_keys).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap()
    }

    #[rstest]
    #[case("deploy.json", "deploy.json.20240309-123005")]
    #[case("/srv/apps/deploy.json.20231201-080000", "deploy.json.20240309-123005")]
    #[case("https://example.com/d/app.json", "app.json.20240309-123005")]
    #[case("app.json.2023-1201", "app.json.2023-1201.20240309-123005")]
    #[case("https://example.com/", "example.com.20240309-123005")]
    fn test_next_descriptor_name(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(next_descriptor_name(source, noon()), expected);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let dep = Deployment::from_json_str(
            r#"{"Containers":[{"Name":"web","Count":1,"PUBLICPORTS":[{"Internal":8080,"External":0}]}],
                "IdPrefix":"x.","RandomizeIds":true}"#,
        )
        .unwrap();
        assert_eq!(dep.containers[0].name, "web");
        assert_eq!(dep.containers[0].public_ports.len(), 1);
        assert_eq!(dep.id_prefix, "x.");
        assert!(dep.randomize_ids);
    }

    #[test]
    fn test_pretty_json_ends_with_newline() {
        let body = Deployment::default().to_pretty_json().unwrap();
        assert!(body.ends_with("}\n"));
        assert!(body.contains("\"idprefix\""));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            Deployment::from_json_str("{"),
            Err(DeploymentError::Parse(_))
        ));
    }
}
