//! Server artifact management against the Mojang version manifest.
//!
//! Resolves the configured version to a concrete manifest entry,
//! downloads `server.jar` into the server directory when the update
//! policy calls for it, and writes the EULA acceptance file.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::config::WrapperConfig;

/// Index of every published server version.
const MANIFEST_URL: &str = "https://launchermeta.mojang.com/mc/game/version_manifest.json";

/// File name of the server artifact inside the server directory.
const SERVER_JAR: &str = "server.jar";

/// Connection timeout for manifest and download requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors preparing the server artifact.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("version manifest request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("version {0:?} not found in the version manifest")]
    VersionNotFound(String),
    #[error("failed to write server artifact: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct VersionManifest {
    latest: LatestVersions,
    versions: Vec<VersionEntry>,
}

#[derive(Debug, Deserialize)]
struct LatestVersions {
    release: String,
    snapshot: String,
}

#[derive(Debug, Deserialize)]
struct VersionEntry {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct VersionDetail {
    downloads: VersionDownloads,
}

#[derive(Debug, Deserialize)]
struct VersionDownloads {
    server: DownloadInfo,
}

#[derive(Debug, Deserialize)]
struct DownloadInfo {
    url: String,
}

impl VersionManifest {
    fn latest(&self, snapshot: bool) -> &str {
        if snapshot {
            &self.latest.snapshot
        } else {
            &self.latest.release
        }
    }

    /// Resolve `preferred` to a manifest id.
    ///
    /// `"latest"` picks the newest release (or snapshot). Otherwise the
    /// manifest is searched case-insensitively, so a miscased version
    /// still resolves to its canonical id.
    fn resolve(&self, preferred: &str, snapshot: bool) -> Option<String> {
        if preferred.eq_ignore_ascii_case("latest") {
            return Some(self.latest(snapshot).to_string());
        }
        self.versions
            .iter()
            .find(|v| v.id.eq_ignore_ascii_case(preferred))
            .map(|v| v.id.clone())
    }

    fn entry(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }
}

fn http_client() -> Client {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .unwrap_or_default()
}

async fn fetch_manifest(client: &Client) -> Result<VersionManifest, UpdateError> {
    let manifest = client
        .get(MANIFEST_URL)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(manifest)
}

/// The newest published version id.
///
/// # Errors
///
/// Returns an error if the manifest cannot be fetched.
pub async fn latest_version(snapshot: bool) -> Result<String, UpdateError> {
    let manifest = fetch_manifest(&http_client()).await?;
    Ok(manifest.latest(snapshot).to_string())
}

/// Whether the server directory already holds a `server.jar`.
#[must_use]
pub fn server_jar_exists(directory: &Path) -> bool {
    directory.join(SERVER_JAR).exists()
}

/// Download the server jar for `version` into the server directory.
///
/// # Errors
///
/// Returns `VersionNotFound` when the manifest has no such version, and
/// the underlying error when a request or the file write fails.
pub async fn download_server_jar(version: &str, directory: &Path) -> Result<(), UpdateError> {
    let client = http_client();
    let manifest = fetch_manifest(&client).await?;
    download_resolved(&client, &manifest, version, directory).await
}

async fn download_resolved(
    client: &Client,
    manifest: &VersionManifest,
    version: &str,
    directory: &Path,
) -> Result<(), UpdateError> {
    let entry = manifest
        .entry(version)
        .ok_or_else(|| UpdateError::VersionNotFound(version.to_string()))?;

    let detail: VersionDetail = client
        .get(&entry.url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    tracing::info!(version, url = %detail.downloads.server.url, "Downloading server.jar");
    let bytes = client
        .get(&detail.downloads.server.url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    tokio::fs::write(directory.join(SERVER_JAR), &bytes).await?;
    Ok(())
}

/// Bring `server.jar` in line with the update policy.
///
/// A missing jar forces an update regardless of `auto_update`. When the
/// installed version already matches the preferred one nothing is
/// fetched. A preferred version that resolves to a different canonical
/// id is written back to the config. Returns whether the config changed
/// and should be persisted.
///
/// # Errors
///
/// Returns an error when the manifest or download request fails, the
/// resolved version cannot be written to disk, or no version can be
/// resolved while no jar exists.
pub async fn ensure_server_jar(
    config: &mut WrapperConfig,
    directory: &Path,
) -> Result<bool, UpdateError> {
    let jar_exists = server_jar_exists(directory);
    if !config.auto_update && jar_exists {
        return Ok(false);
    }
    if jar_exists && config.server_version == config.preferred_version {
        return Ok(false);
    }

    let client = http_client();
    let manifest = fetch_manifest(&client).await?;

    let mut changed = false;
    let target = match manifest.resolve(&config.preferred_version, config.use_snapshot) {
        Some(id) => {
            if id != config.preferred_version {
                config.preferred_version = id.clone();
                changed = true;
            }
            id
        }
        // An unresolvable preference is only fatal when there is nothing
        // to run; with a jar on disk we keep what we have.
        None if jar_exists => {
            tracing::warn!(
                preferred = %config.preferred_version,
                "Preferred version not found, keeping installed server"
            );
            return Ok(changed);
        }
        None => manifest.latest(config.use_snapshot).to_string(),
    };

    if jar_exists && target == config.server_version {
        return Ok(changed);
    }

    download_resolved(&client, &manifest, &target, directory).await?;
    config.server_version = target;
    Ok(true)
}

/// Write `eula.txt` accepting the Minecraft EULA.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn accept_eula(directory: &Path) -> Result<(), UpdateError> {
    let content = "#By changing the setting below to TRUE you are indicating your agreement to our EULA (https://aka.ms/MinecraftEULA).\n#Thu Jan 01 00:00:00 UTC 1970\neula=true\n";
    tokio::fs::write(directory.join("eula.txt"), content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> VersionManifest {
        VersionManifest {
            latest: LatestVersions {
                release: "1.20.4".to_string(),
                snapshot: "24w07a".to_string(),
            },
            versions: vec![
                VersionEntry {
                    id: "24w07a".to_string(),
                    url: "https://example.invalid/24w07a.json".to_string(),
                },
                VersionEntry {
                    id: "1.20.4".to_string(),
                    url: "https://example.invalid/1.20.4.json".to_string(),
                },
                VersionEntry {
                    id: "1.20.3".to_string(),
                    url: "https://example.invalid/1.20.3.json".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_resolve_latest_release_and_snapshot() {
        let m = manifest();
        assert_eq!(m.resolve("latest", false).as_deref(), Some("1.20.4"));
        assert_eq!(m.resolve("LATEST", true).as_deref(), Some("24w07a"));
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let m = manifest();
        assert_eq!(m.resolve("24W07A", false).as_deref(), Some("24w07a"));
    }

    #[test]
    fn test_resolve_unknown_version_is_none() {
        assert_eq!(manifest().resolve("1.99", false), None);
    }

    #[test]
    fn test_manifest_parses_mojang_shape() {
        let m: VersionManifest = serde_json::from_str(
            r#"{
                "latest": {"release": "1.20.4", "snapshot": "24w07a"},
                "versions": [
                    {"id": "24w07a", "type": "snapshot", "url": "https://x/a.json",
                     "time": "2024-02-14T00:00:00+00:00", "releaseTime": "2024-02-14T00:00:00+00:00"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(m.versions.len(), 1);
        assert_eq!(m.latest(false), "1.20.4");
    }

    #[test]
    fn test_server_jar_exists() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!server_jar_exists(dir.path()));
        std::fs::write(dir.path().join("server.jar"), b"jar").unwrap();
        assert!(server_jar_exists(dir.path()));
    }

    #[tokio::test]
    async fn test_accept_eula_writes_agreement() {
        let dir = tempfile::tempdir().unwrap();
        accept_eula(dir.path()).await.unwrap();
        let content = std::fs::read_to_string(dir.path().join("eula.txt")).unwrap();
        assert!(content.ends_with("eula=true\n"));
    }

    #[tokio::test]
    async fn test_ensure_is_a_noop_when_policy_satisfied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("server.jar"), b"jar").unwrap();

        // auto_update off with a jar present: no network touched.
        let mut config = WrapperConfig::default();
        assert!(!ensure_server_jar(&mut config, dir.path()).await.unwrap());

        // versions already in sync: same.
        let mut config = WrapperConfig {
            auto_update: true,
            server_version: "1.20.4".to_string(),
            preferred_version: "1.20.4".to_string(),
            ..WrapperConfig::default()
        };
        assert!(!ensure_server_jar(&mut config, dir.path()).await.unwrap());
    }
}
