use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::properties::ServerProperties;
use super::server::ResourcePackServer;
use crate::core::downloader::checksum::{file_sha1, remote_sha1};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::manager::{is_url, SERVER_PROPERTIES};
use crate::core::instance::InstanceConfig;

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PUBLIC_HOST: &str = "localhost";

/// What a launch advertises to clients. `server` is set only for local packs
/// and must be kept alive for as long as the game server runs.
#[derive(Debug, Default)]
pub struct PublishedPack {
    pub url: String,
    pub sha1: String,
    pub server: Option<ResourcePackServer>,
}

/// Writes the instance's resource pack into `server.properties` and, for a
/// local file, serves it over HTTP.
#[derive(Debug, Clone)]
pub struct ResourcePackPublisher {
    client: reqwest::Client,
    bind_host: String,
    public_host: String,
}

impl ResourcePackPublisher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            bind_host: DEFAULT_BIND_HOST.into(),
            public_host: DEFAULT_PUBLIC_HOST.into(),
        }
    }

    /// `bind_host` is the listening interface, `public_host` the name clients
    /// are told to download from.
    pub fn with_hosts(mut self, bind_host: impl Into<String>, public_host: impl Into<String>) -> Self {
        self.bind_host = bind_host.into();
        self.public_host = public_host.into();
        self
    }

    pub async fn publish(
        &self,
        instance_dir: &Path,
        cfg: &InstanceConfig,
    ) -> LauncherResult<PublishedPack> {
        let properties = instance_dir.join(SERVER_PROPERTIES);
        let reference = cfg.resourcepack.trim();

        if reference.is_empty() {
            update_properties(
                &properties,
                &[
                    ("require-resource-pack", "false"),
                    ("resource-pack", ""),
                    ("resource-pack-sha1", ""),
                ],
            )?;
            info!("No resource pack for '{}', cleared server.properties", cfg.name);
            return Ok(PublishedPack::default());
        }

        if is_url(reference) {
            let sha1 = remote_sha1(&self.client, reference).await?;
            update_properties(
                &properties,
                &[("resource-pack", reference), ("resource-pack-sha1", &sha1)],
            )?;
            info!("Resource pack for '{}' is remote: {}", cfg.name, reference);
            return Ok(PublishedPack {
                url: reference.to_string(),
                sha1,
                server: None,
            });
        }

        let file = PathBuf::from(reference);
        let sha1 = file_sha1(&file).await?.ok_or_else(|| {
            LauncherError::ResourcePack(format!("resource pack file {:?} not found", file))
        })?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let url = pack_url(&self.public_host, cfg.resourcepack_port, &file_name)?;

        // Bind before advertising the URL.
        let server =
            ResourcePackServer::start(file, &self.bind_host, cfg.resourcepack_port).await?;
        if let Err(e) = update_properties(
            &properties,
            &[("resource-pack", &url), ("resource-pack-sha1", &sha1)],
        ) {
            server.stop().await;
            return Err(e);
        }
        info!("Clients of '{}' will fetch the resource pack from {}", cfg.name, url);

        Ok(PublishedPack {
            url,
            sha1,
            server: Some(server),
        })
    }
}

/// `http://<host>:<port>/<file>` with the file name percent-encoded.
fn pack_url(host: &str, port: u16, file_name: &str) -> LauncherResult<String> {
    let mut url = reqwest::Url::parse(&format!("http://{host}:{port}/"))
        .map_err(|e| LauncherError::ResourcePack(format!("invalid pack host {host:?}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| LauncherError::ResourcePack(format!("invalid pack host {host:?}")))?
        .pop_if_empty()
        .push(file_name);
    Ok(url.to_string())
}

/// Apply each key; absent keys are logged and skipped. The file is only
/// rewritten when at least one key changed.
fn update_properties(path: &Path, pairs: &[(&str, &str)]) -> LauncherResult<()> {
    let mut props = ServerProperties::load(path)?;
    let mut changed = 0;
    for (key, value) in pairs {
        match props.set(key, value) {
            Ok(()) => changed += 1,
            Err(e @ LauncherError::PropertyNotFound { .. }) => warn!("{}", e),
            Err(e) => return Err(e),
        }
    }
    if changed > 0 {
        props.save()?;
    }
    Ok(())
}
