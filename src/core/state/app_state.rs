use std::path::{Path, PathBuf};

use reqwest::Client;
use tracing::{info, warn};

use crate::core::backup::BackupEngine;
use crate::core::config::{apply_setting, ConfigStore, GlobalConfig, GLOBAL_CONFIG_FILE};
use crate::core::downloader::ArtifactCache;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::instance::{InstanceConfig, InstanceRegistry, NewInstance};
use crate::core::java::RuntimeTable;
use crate::core::launch::{IoContract, LaunchOutcome, LaunchRequest, ProcessOrchestrator};
use crate::core::progress::ProgressSender;
use crate::core::resourcepack::ResourcePackPublisher;
use crate::core::version::VersionResolver;

const APP_DIR_NAME: &str = "ServerInstances";

/// Every component, built from one loaded [`GlobalConfig`].
///
/// Components hold explicit copies of the values they need; after a setting
/// changes, [`AppState::set_setting`] rebuilds them.
#[derive(Debug, Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: GlobalConfig,
    pub store: ConfigStore,
    pub registry: InstanceRegistry,
    pub resolver: VersionResolver,
    pub cache: ArtifactCache,
    pub backups: BackupEngine,
    pub publisher: ResourcePackPublisher,
    pub http_client: Client,
    progress: Option<ProgressSender>,
}

impl AppState {
    pub fn new(data_dir: impl Into<PathBuf>) -> LauncherResult<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(LauncherError::io(&data_dir))?;

        let http_client = build_http_client()
            .map_err(|e| LauncherError::Other(format!("cannot build HTTP client: {e}")))?;
        let (store, config) = ConfigStore::open(data_dir.join(GLOBAL_CONFIG_FILE));
        let resolver = VersionResolver::new(http_client.clone());

        info!(
            "Data dir {:?}, instances in {:?}",
            data_dir,
            store.instances_root()
        );

        Ok(Self {
            registry: InstanceRegistry::new(store.clone()),
            cache: ArtifactCache::new(http_client.clone()),
            backups: BackupEngine::new(store.clone(), config.backup_on_rollback),
            publisher: ResourcePackPublisher::new(http_client.clone()),
            data_dir,
            config,
            store,
            resolver,
            http_client,
            progress: None,
        })
    }

    /// State rooted at `<platform data dir>/ServerInstances`.
    pub fn from_default_dir() -> LauncherResult<Self> {
        Self::new(default_data_dir())
    }

    pub fn with_resolver(mut self, resolver: VersionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Route download and backup progress to `sender`.
    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self.rebuild();
        self
    }

    fn rebuild(&mut self) {
        self.store = ConfigStore::new(self.store.global_path(), self.config.instances_dir());
        self.registry = InstanceRegistry::new(self.store.clone());

        let mut cache = ArtifactCache::new(self.http_client.clone());
        let mut backups = BackupEngine::new(self.store.clone(), self.config.backup_on_rollback);
        if let Some(tx) = &self.progress {
            cache = cache.with_progress(tx.clone());
            backups = backups.with_progress(tx.clone());
        }
        self.cache = cache;
        self.backups = backups;
    }

    pub fn orchestrator(&self) -> ProcessOrchestrator {
        ProcessOrchestrator::new(
            self.registry.clone(),
            self.resolver.clone(),
            self.cache.clone(),
            self.backups.clone(),
            self.publisher.clone(),
            RuntimeTable::from_config(&self.config),
        )
    }

    /// Validate the version, create the instance and optionally run a probe
    /// launch so the server generates its files. A failed probe is logged;
    /// the instance is kept.
    pub async fn create_instance(
        &self,
        new: NewInstance,
        probe: bool,
    ) -> LauncherResult<InstanceConfig> {
        let version = new.minecraft_version.as_deref().unwrap_or("latest");
        self.resolver.check_version(version).await?;

        let cfg = self.registry.create(new).await?;
        if probe {
            match self
                .orchestrator()
                .launch(&cfg.name, LaunchRequest::new(IoContract::ProbeInit))
                .await
            {
                Ok(LaunchOutcome::Exited(report)) if report.reached_ready => {
                    info!("Probe launch of '{}' completed", cfg.name)
                }
                Ok(outcome) => warn!("Probe launch of '{}' ended early: {:?}", cfg.name, outcome),
                Err(e) => warn!("Probe launch of '{}' failed: {}", cfg.name, e),
            }
        }
        Ok(cfg)
    }

    /// Apply one global setting, persist it and rebuild the components.
    pub fn set_setting(&mut self, key: &str, value: &str) -> LauncherResult<()> {
        let mut updated = self.config.clone();
        apply_setting(&mut updated, key, value)?;
        self.store.write_global(&updated)?;
        self.config = updated;
        self.rebuild();
        info!("Setting {} updated", key);
        Ok(())
    }

    pub fn global_config_path(&self) -> &Path {
        self.store.global_path()
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
