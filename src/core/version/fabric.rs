use serde::Deserialize;
use tracing::info;

use super::manifest::get_json;
use crate::core::error::{LauncherError, LauncherResult};

pub const FABRIC_META_BASE: &str = "https://meta.fabricmc.net/v2";

/// One element of the loader or installer build list.
#[derive(Debug, Clone, Deserialize)]
pub struct FabricBuild {
    pub version: String,
    #[serde(default = "stable_by_default")]
    pub stable: bool,
}

fn stable_by_default() -> bool {
    true
}

/// Client for the Fabric meta endpoints used by server installs.
#[derive(Debug, Clone)]
pub struct FabricMeta {
    client: reqwest::Client,
    base: String,
}

impl FabricMeta {
    pub fn new(client: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn loader_versions(&self) -> LauncherResult<Vec<FabricBuild>> {
        let url = format!("{}/versions/loader", self.base);
        get_json(&self.client, &url).await
    }

    pub async fn installer_versions(&self) -> LauncherResult<Vec<FabricBuild>> {
        let url = format!("{}/versions/installer", self.base);
        get_json(&self.client, &url).await
    }

    /// Pick loader + installer builds and return the server launcher URL.
    pub async fn server_jar_url(
        &self,
        minecraft_version: &str,
        loader_token: &str,
    ) -> LauncherResult<String> {
        let loaders = self.loader_versions().await?;
        let installers = self.installer_versions().await?;

        let loader = select_build(&loaders, loader_token)
            .ok_or_else(|| LauncherError::LoaderNotFound(loader_token.to_string()))?;
        let installer = select_build(&installers, "latest")
            .ok_or_else(|| LauncherError::LoaderNotFound("fabric installer".into()))?;

        info!(
            "Fabric for {}: loader {}, installer {}",
            minecraft_version, loader.version, installer.version
        );

        Ok(format!(
            "{}/versions/loader/{}/{}/{}/server/jar",
            self.base, minecraft_version, loader.version, installer.version
        ))
    }
}

/// `latest`/`l` picks the first stable build, else exact match.
///
/// The meta API returns builds newest-first and exposes no timestamp to check
/// that order against, so "first" is trusted as "newest". When no build is
/// flagged stable the first entry is used.
pub fn select_build<'a>(builds: &'a [FabricBuild], token: &str) -> Option<&'a FabricBuild> {
    match token.trim().to_lowercase().as_str() {
        "latest" | "l" => builds.iter().find(|b| b.stable).or_else(|| builds.first()),
        _ => builds.iter().find(|b| b.version == token.trim()),
    }
}
