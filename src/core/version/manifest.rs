// ─── Version Manifest ───
// Handles fetching and parsing the Mojang version manifest v2 and the
// per-version package JSON it points at.

use serde::Deserialize;
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

/// Java major assumed for packages that predate the `javaVersion` field.
pub const LEGACY_JAVA_MAJOR: u32 = 8;

/// Top-level Mojang version manifest.
#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    pub latest: LatestVersions,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// A single entry in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type", default)]
    pub version_type: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionManifest {
    pub async fn fetch(client: &reqwest::Client, url: &str) -> LauncherResult<Self> {
        info!("Fetching Minecraft version manifest...");

        let manifest: VersionManifest = get_json(client, url).await?;

        info!("Loaded {} versions from manifest", manifest.versions.len());
        Ok(manifest)
    }

    /// Map a user token to a concrete id: `latest`/`l` and `snapshot`/`s`
    /// follow the manifest's pointers, anything else is taken verbatim.
    pub fn resolve_id<'a>(&'a self, token: &'a str) -> &'a str {
        match token.trim().to_lowercase().as_str() {
            "latest" | "l" => &self.latest.release,
            "snapshot" | "s" => &self.latest.snapshot,
            _ => token.trim(),
        }
    }

    /// Find a specific version entry by ID (e.g. "1.20.4").
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Resolve a token straight to its manifest entry.
    pub fn entry_for(&self, token: &str) -> LauncherResult<&VersionEntry> {
        let id = self.resolve_id(token);
        self.find_version(id)
            .ok_or_else(|| LauncherError::VersionNotFound(id.to_string()))
    }
}

/// Per-version package: only the fields the server side needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionPackage {
    pub id: String,
    #[serde(default)]
    pub downloads: PackageDownloads,
    #[serde(default)]
    pub java_version: Option<JavaVersion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageDownloads {
    #[serde(default)]
    pub server: Option<DownloadInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadInfo {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sha1: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersion {
    pub major_version: u32,
}

impl VersionPackage {
    pub async fn fetch(client: &reqwest::Client, url: &str) -> LauncherResult<Self> {
        let package: VersionPackage = get_json(client, url).await?;
        debug!("Loaded package for {}", package.id);
        Ok(package)
    }

    pub fn required_java_major(&self) -> u32 {
        self.java_version
            .as_ref()
            .map(|j| j.major_version)
            .unwrap_or(LEGACY_JAVA_MAJOR)
    }
}

/// GET + status check + JSON decode, tagging failures with the URL.
pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> LauncherResult<T> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(LauncherError::network(url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LauncherError::DownloadFailed {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await.map_err(LauncherError::network(url))?;
    Ok(serde_json::from_slice(&bytes)?)
}
