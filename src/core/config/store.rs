// ─── Config Store ───
// Reads and writes the global settings file and every instance's `cfg.json`.
// All writes go through a temporary sibling file plus rename.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::global::GlobalConfig;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::model::{InstanceConfig, InstancePatch};

pub const GLOBAL_CONFIG_FILE: &str = "settings.json";
const LEGACY_GLOBAL_CONFIG_FILE: &str = "config.json";
pub const INSTANCE_CONFIG_FILE: &str = "cfg.json";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    global_path: PathBuf,
    instances_root: PathBuf,
}

impl ConfigStore {
    pub fn new(global_path: impl Into<PathBuf>, instances_root: impl Into<PathBuf>) -> Self {
        Self {
            global_path: global_path.into(),
            instances_root: instances_root.into(),
        }
    }

    /// Read the global file and build a store rooted at its instances folder.
    pub fn open(global_path: impl Into<PathBuf>) -> (Self, GlobalConfig) {
        let global_path = global_path.into();
        let mut store = Self::new(global_path, PathBuf::new());
        let cfg = store.read_global();
        store.instances_root = cfg.instances_dir();
        (store, cfg)
    }

    pub fn global_path(&self) -> &Path {
        &self.global_path
    }

    pub fn instances_root(&self) -> &Path {
        &self.instances_root
    }

    pub fn instance_dir(&self, name: &str) -> PathBuf {
        self.instances_root.join(name)
    }

    pub fn instance_config_path(&self, name: &str) -> PathBuf {
        self.instance_dir(name).join(INSTANCE_CONFIG_FILE)
    }

    // ── Global ──────────────────────────────────────────

    /// Load the global configuration. Never fails: a missing or corrupt
    /// file yields defaults, and the merged result is written back.
    pub fn read_global(&self) -> GlobalConfig {
        self.migrate_legacy_global();

        let loaded = match std::fs::read_to_string(&self.global_path) {
            Ok(raw) => match serde_json::from_str::<GlobalConfig>(&raw) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(
                        "Corrupt global config at {:?}, using defaults: {}",
                        self.global_path, e
                    );
                    GlobalConfig::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No global config at {:?}, creating defaults", self.global_path);
                GlobalConfig::default()
            }
            Err(e) => {
                warn!("Cannot read {:?}, using defaults: {}", self.global_path, e);
                GlobalConfig::default()
            }
        };

        let merged = loaded.merged_with_defaults();
        if let Err(e) = self.write_global(&merged) {
            warn!("Could not persist global config: {}", e);
        }
        merged
    }

    pub fn write_global(&self, cfg: &GlobalConfig) -> LauncherResult<()> {
        let json = serde_json::to_string_pretty(cfg)?;
        write_atomic(&self.global_path, json.as_bytes())
    }

    fn migrate_legacy_global(&self) {
        let Some(parent) = self.global_path.parent() else {
            return;
        };
        let legacy = parent.join(LEGACY_GLOBAL_CONFIG_FILE);
        if legacy == self.global_path || !legacy.is_file() || self.global_path.exists() {
            return;
        }
        match std::fs::rename(&legacy, &self.global_path) {
            Ok(()) => info!("Migrated legacy config {:?}", legacy),
            Err(e) => warn!("Failed to migrate legacy config {:?}: {}", legacy, e),
        }
    }

    // ── Instances ───────────────────────────────────────

    pub fn read_instance(&self, name: &str) -> LauncherResult<InstanceConfig> {
        let path = self.instance_config_path(name);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LauncherError::InstanceNotFound(name.to_string()));
            }
            Err(source) => return Err(LauncherError::Io { path, source }),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_instance(&self, name: &str, cfg: &InstanceConfig) -> LauncherResult<()> {
        let json = serde_json::to_string_pretty(cfg)?;
        write_atomic(&self.instance_config_path(name), json.as_bytes())?;
        debug!("Wrote config for instance '{}'", name);
        Ok(())
    }

    /// Read-modify-write of the whole file.
    pub fn update_instance(
        &self,
        name: &str,
        patch: InstancePatch,
    ) -> LauncherResult<InstanceConfig> {
        let current = self.read_instance(name)?;
        let updated = patch.apply(current);
        self.write_instance(name, &updated)?;
        Ok(updated)
    }
}

/// Write `bytes` to `<path>.tmp`, then rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> LauncherResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(LauncherError::io(parent))?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    std::fs::write(&tmp, bytes).map_err(LauncherError::io(&tmp))?;
    std::fs::rename(&tmp, path).map_err(LauncherError::io(path))?;
    Ok(())
}
