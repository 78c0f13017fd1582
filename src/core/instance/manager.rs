use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::lock::InstanceLock;
use super::model::{InstanceConfig, InstancePatch, LoaderSpec, LoaderType, VersionSpec};
use crate::core::config::ConfigStore;
use crate::core::error::{LauncherError, LauncherResult};

pub const WORLD_DIR: &str = "world";
pub const SERVER_PROPERTIES: &str = "server.properties";
const EULA_FILE: &str = "eula.txt";

/// Arguments for [`InstanceRegistry::create`]. Omitted fields take the
/// [`InstanceConfig`] defaults.
#[derive(Debug, Clone, Default)]
pub struct NewInstance {
    pub name: String,
    pub minecraft_version: Option<String>,
    pub loader: Option<LoaderType>,
    pub loader_version: Option<String>,
    pub memory: Option<String>,
    pub auto_backup: bool,
    pub resourcepack: Option<String>,
    pub resourcepack_port: Option<u16>,
}

impl NewInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn into_config(self) -> InstanceConfig {
        let defaults = InstanceConfig::default();
        InstanceConfig {
            version: VersionSpec {
                minecraft: self.minecraft_version.unwrap_or(defaults.version.minecraft),
                loader: LoaderSpec {
                    kind: self.loader.unwrap_or(defaults.version.loader.kind),
                    version: self
                        .loader_version
                        .unwrap_or(defaults.version.loader.version),
                },
            },
            memory: self.memory.unwrap_or(defaults.memory),
            auto_backup: self.auto_backup,
            resourcepack: self.resourcepack.unwrap_or(defaults.resourcepack),
            resourcepack_port: self.resourcepack_port.unwrap_or(defaults.resourcepack_port),
            name: self.name,
            ..defaults
        }
    }
}

/// Manages the set of instances under the configured root.
#[derive(Debug, Clone)]
pub struct InstanceRegistry {
    store: ConfigStore,
}

impl InstanceRegistry {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn instance_dir(&self, name: &str) -> PathBuf {
        self.store.instance_dir(name)
    }

    /// `true` iff the directory exists and holds a parseable `cfg.json`.
    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok()
            && self.instance_dir(name).is_dir()
            && self.store.read_instance(name).is_ok()
    }

    /// Create a new instance on disk.
    ///
    /// Creates:
    /// - `<instance>/cfg.json`
    /// - `<instance>/eula.txt` (accepted)
    /// - `<instance>/server.properties` (empty, filled by the first launch)
    pub async fn create(&self, new: NewInstance) -> LauncherResult<InstanceConfig> {
        validate_name(&new.name)?;
        if self.exists(&new.name) {
            return Err(LauncherError::InstanceAlreadyExists(new.name));
        }

        let dir = self.instance_dir(&new.name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(LauncherError::io(&dir))?;

        let cfg = new.into_config();
        self.store.write_instance(&cfg.name, &cfg)?;

        accept_eula(&dir.join(EULA_FILE)).await?;

        let properties = dir.join(SERVER_PROPERTIES);
        if !properties.exists() {
            tokio::fs::write(&properties, b"")
                .await
                .map_err(LauncherError::io(&properties))?;
        }

        info!(
            "Created instance '{}' ({} {}, memory {})",
            cfg.name, cfg.version.loader.kind, cfg.version.minecraft, cfg.memory
        );
        Ok(cfg)
    }

    pub fn read(&self, name: &str) -> LauncherResult<InstanceConfig> {
        validate_name(name)?;
        self.store.read_instance(name)
    }

    /// Merge-and-rewrite under the instance lock.
    pub fn update(&self, name: &str, patch: InstancePatch) -> LauncherResult<InstanceConfig> {
        self.read(name)?;
        let _lock = InstanceLock::acquire(&self.instance_dir(name), name)?;
        self.store.update_instance(name, patch)
    }

    /// List all instances, sorted by name. Corrupt instances are skipped.
    pub async fn list(&self) -> LauncherResult<Vec<(String, InstanceConfig)>> {
        let mut instances = Vec::new();
        let root = self.store.instances_root();

        if !root.exists() {
            return Ok(instances);
        }

        let mut entries = tokio::fs::read_dir(root)
            .await
            .map_err(LauncherError::io(root))?;

        while let Some(entry) = entries.next_entry().await.map_err(LauncherError::io(root))? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !path.join(crate::core::config::INSTANCE_CONFIG_FILE).exists() {
                continue;
            }
            match self.store.read_instance(&name) {
                Ok(cfg) => instances.push((name, cfg)),
                Err(e) => warn!("Skipping corrupt instance at {:?}: {}", path, e),
            }
        }

        instances.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(instances)
    }

    /// Delete an instance from disk. Confirmation is the caller's job.
    pub async fn delete(&self, name: &str) -> LauncherResult<()> {
        if !self.exists(name) {
            return Err(LauncherError::InstanceNotFound(name.to_string()));
        }
        let dir = self.instance_dir(name);
        let _lock = InstanceLock::acquire(&dir, name)?;

        tokio::fs::remove_dir_all(&dir)
            .await
            .map_err(LauncherError::io(&dir))?;

        info!("Deleted instance {}", name);
        Ok(())
    }

    /// Record a resource pack reference. Local paths must point at an
    /// existing file and are stored absolute; URLs are stored verbatim.
    pub fn attach_resource_pack(
        &self,
        name: &str,
        value: &str,
        port: Option<u16>,
    ) -> LauncherResult<InstanceConfig> {
        let value = value.trim();
        let stored = if value.is_empty() || is_url(value) {
            value.to_string()
        } else {
            let path = Path::new(value);
            if !path.is_file() {
                return Err(LauncherError::ResourcePack(format!(
                    "resource pack file {:?} not found",
                    path
                )));
            }
            std::fs::canonicalize(path)
                .map_err(LauncherError::io(path))?
                .to_string_lossy()
                .into_owned()
        };

        let cfg = self.update(
            name,
            InstancePatch {
                resourcepack: Some(stored),
                resourcepack_port: port,
                ..InstancePatch::default()
            },
        )?;
        info!("Resource pack attached to '{}': {:?}", name, cfg.resourcepack);
        Ok(cfg)
    }

    /// Remove the world so the next launch generates a fresh one.
    pub async fn reset_world(&self, name: &str) -> LauncherResult<()> {
        if !self.exists(name) {
            return Err(LauncherError::InstanceNotFound(name.to_string()));
        }
        let dir = self.instance_dir(name);
        let _lock = InstanceLock::acquire(&dir, name)?;
        let world = dir.join(WORLD_DIR);
        if world.exists() {
            tokio::fs::remove_dir_all(&world)
                .await
                .map_err(LauncherError::io(&world))?;
        }
        info!("World of '{}' reset", name);
        Ok(())
    }
}

pub fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

pub(crate) fn validate_name(name: &str) -> LauncherResult<()> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed != name
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.starts_with('.');
    if invalid {
        return Err(LauncherError::InvalidInstanceName(name.to_string()));
    }
    Ok(())
}

/// Ensure `eula.txt` contains `eula=true`, flipping an existing `eula=false`.
async fn accept_eula(path: &Path) -> LauncherResult<()> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(raw) => {
            let mut lines: Vec<String> = raw
                .lines()
                .map(|line| {
                    if line.trim() == "eula=false" {
                        "eula=true".to_string()
                    } else {
                        line.to_string()
                    }
                })
                .collect();
            if !lines.iter().any(|l| l.trim() == "eula=true") {
                lines.push("eula=true".into());
            }
            lines.join("\n") + "\n"
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => "eula=true\n".to_string(),
        Err(source) => {
            return Err(LauncherError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    tokio::fs::write(path, contents)
        .await
        .map_err(LauncherError::io(path))
}
