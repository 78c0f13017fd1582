use std::path::Path;

use tracing::{info, warn};

use super::command::{IoContract, LaunchCommand};
use super::task::{self, ConsoleSink, LaunchOutcome};
use crate::core::backup::BackupEngine;
use crate::core::downloader::ArtifactCache;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::{InstanceConfig, InstanceRegistry};
use crate::core::java::RuntimeTable;
use crate::core::resourcepack::{ResourcePackPublisher, ResourcePackServer};
use crate::core::version::VersionResolver;

/// Artifact name used before per-version file names were introduced.
const LEGACY_SERVER_JAR: &str = "server.jar";
const AUTO_BACKUP_DESC: &str = "Auto-backup";

/// Options for a single launch.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub contract: IoContract,
    /// Only honoured by `HeadlessDiscard`.
    pub gui: bool,
    pub sink: Option<ConsoleSink>,
}

impl LaunchRequest {
    pub fn new(contract: IoContract) -> Self {
        Self {
            contract,
            gui: false,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: ConsoleSink) -> Self {
        self.sink = Some(sink);
        self
    }
}

/// Prepares an instance for launch and hands it to the launch task.
#[derive(Debug, Clone)]
pub struct ProcessOrchestrator {
    registry: InstanceRegistry,
    resolver: VersionResolver,
    cache: ArtifactCache,
    backups: BackupEngine,
    publisher: ResourcePackPublisher,
    runtimes: RuntimeTable,
}

impl ProcessOrchestrator {
    pub fn new(
        registry: InstanceRegistry,
        resolver: VersionResolver,
        cache: ArtifactCache,
        backups: BackupEngine,
        publisher: ResourcePackPublisher,
        runtimes: RuntimeTable,
    ) -> Self {
        Self {
            registry,
            resolver,
            cache,
            backups,
            publisher,
            runtimes,
        }
    }

    pub async fn launch(&self, name: &str, request: LaunchRequest) -> LauncherResult<LaunchOutcome> {
        let result = self.launch_inner(name, request).await;
        if let Err(e) = &result {
            warn!("Launch of '{}' failed: {}", name, e);
        }
        result
    }

    async fn launch_inner(
        &self,
        name: &str,
        request: LaunchRequest,
    ) -> LauncherResult<LaunchOutcome> {
        let cfg = self.registry.read(name)?;
        let dir = self.registry.instance_dir(name);
        let probe = request.contract == IoContract::ProbeInit;

        let artifact = self
            .resolver
            .resolve(
                &cfg.version.minecraft,
                cfg.version.loader.kind,
                &cfg.version.loader.version,
            )
            .await?;
        let jar = artifact.cache_path(&dir);
        self.cache.ensure(&artifact, &jar).await?;

        if cfg.auto_backup && !probe {
            info!("Auto-backup enabled for '{}'", name);
            match self.backups.create(name, AUTO_BACKUP_DESC).await {
                Ok(id) => info!("Auto-backup {} completed", id),
                Err(e) => warn!("Auto-backup of '{}' failed, launching anyway: {}", name, e),
            }
        }

        let pack = if probe {
            None
        } else {
            self.publish_pack(&dir, name, &cfg).await
        };

        remove_legacy_jar(&dir).await;

        let runtime = self.runtimes.select(artifact.java_major)?;
        let command = LaunchCommand::server(
            runtime,
            cfg.effective_memory(),
            &jar,
            &dir,
            request.contract.wants_nogui(request.gui),
        );

        task::run(&command, request.contract, name, request.sink, pack).await
    }

    /// A pack that cannot be published does not block the launch.
    async fn publish_pack(
        &self,
        dir: &Path,
        name: &str,
        cfg: &InstanceConfig,
    ) -> Option<ResourcePackServer> {
        match self.publisher.publish(dir, cfg).await {
            Ok(published) => published.server,
            Err(e) => {
                warn!("Resource pack of '{}' not published: {}", name, e);
                None
            }
        }
    }
}

async fn remove_legacy_jar(dir: &Path) {
    let legacy = dir.join(LEGACY_SERVER_JAR);
    match tokio::fs::remove_file(&legacy).await {
        Ok(()) => info!("Removed legacy {:?}", legacy),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("{}", LauncherError::Io { path: legacy, source: e }),
    }
}
