// ─── Version Resolver ───
// Turns (version token, loader, loader token) into a concrete server
// artifact: download URL, expected SHA-1 and the Java major it needs.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use super::fabric::{FabricMeta, FABRIC_META_BASE};
use super::manifest::{VersionManifest, VersionPackage, VERSION_MANIFEST_URL};
use crate::core::downloader::checksum::remote_sha1;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::LoaderType;

/// A resolved, downloadable server artifact. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedArtifact {
    pub minecraft_version: String,
    pub loader: LoaderType,
    pub url: String,
    pub sha1: String,
    pub java_major: u32,
}

impl ResolvedArtifact {
    /// Cache file name: one file per (minecraft version, loader) pair.
    pub fn file_name(&self) -> String {
        format!("server-{}-{}.jar", self.minecraft_version, self.loader)
    }

    pub fn cache_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

#[derive(Debug, Clone)]
pub struct VersionResolver {
    client: reqwest::Client,
    manifest_url: String,
    fabric: FabricMeta,
}

impl VersionResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoints(client, VERSION_MANIFEST_URL, FABRIC_META_BASE)
    }

    /// Point the resolver at alternative manifest / loader-meta endpoints.
    pub fn with_endpoints(
        client: reqwest::Client,
        manifest_url: impl Into<String>,
        fabric_meta_base: impl Into<String>,
    ) -> Self {
        let fabric = FabricMeta::new(client.clone(), fabric_meta_base);
        Self {
            client,
            manifest_url: manifest_url.into(),
            fabric,
        }
    }

    pub async fn manifest(&self) -> LauncherResult<VersionManifest> {
        VersionManifest::fetch(&self.client, &self.manifest_url).await
    }

    /// Validate a version token. Symbolic tokens are accepted without a
    /// lookup; explicit ids must be present in the manifest.
    pub async fn check_version(&self, token: &str) -> LauncherResult<()> {
        if matches!(
            token.trim().to_lowercase().as_str(),
            "latest" | "l" | "snapshot" | "s"
        ) {
            return Ok(());
        }
        let manifest = self.manifest().await?;
        manifest.entry_for(token)?;
        Ok(())
    }

    pub async fn resolve(
        &self,
        version_token: &str,
        loader: LoaderType,
        loader_token: &str,
    ) -> LauncherResult<ResolvedArtifact> {
        let manifest = self.manifest().await?;
        let entry = manifest.entry_for(version_token)?;
        let package = VersionPackage::fetch(&self.client, &entry.url).await?;
        let java_major = package.required_java_major();

        let (url, sha1) = match loader {
            LoaderType::Vanilla => {
                let server = package.downloads.server.clone().unwrap_or_default();
                (server.url, server.sha1)
            }
            LoaderType::Fabric => {
                let url = self.fabric.server_jar_url(&entry.id, loader_token).await?;
                // Fabric publishes no checksum; hash the artifact itself.
                let sha1 = remote_sha1(&self.client, &url).await?;
                (url, sha1)
            }
        };

        if url.trim().is_empty() || sha1.trim().is_empty() {
            return Err(LauncherError::ArtifactInfoMissing(format!(
                "{} {}",
                loader, entry.id
            )));
        }

        info!(
            "Resolved {} {} -> {} (java {})",
            loader, entry.id, url, java_major
        );

        Ok(ResolvedArtifact {
            minecraft_version: entry.id.clone(),
            loader,
            url,
            sha1,
            java_major,
        })
    }
}
