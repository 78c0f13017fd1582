use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::LauncherError;

/// Current schema tag written into every `cfg.json`.
pub const CFG_VERSION: u32 = 2;
pub const DEFAULT_MEMORY: &str = "2048M";
pub const DEFAULT_RESOURCEPACK_PORT: u16 = 2548;

/// Supported server loaders.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoaderType {
    #[default]
    Vanilla,
    Fabric,
}

impl std::fmt::Display for LoaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderType::Vanilla => write!(f, "vanilla"),
            LoaderType::Fabric => write!(f, "fabric"),
        }
    }
}

impl FromStr for LoaderType {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vanilla" => Ok(LoaderType::Vanilla),
            "fabric" => Ok(LoaderType::Fabric),
            other => Err(LauncherError::UnsupportedLoader(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoaderSpec {
    #[serde(rename = "type")]
    pub kind: LoaderType,
    pub version: String,
}

impl Default for LoaderSpec {
    fn default() -> Self {
        Self {
            kind: LoaderType::Vanilla,
            version: "latest".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VersionSpec {
    pub minecraft: String,
    pub loader: LoaderSpec,
}

impl Default for VersionSpec {
    fn default() -> Self {
        Self {
            minecraft: "latest".into(),
            loader: LoaderSpec::default(),
        }
    }
}

/// One ledger entry. Immutable once written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Backup {
    /// Minecraft version the world was running when it was archived.
    pub version: String,
    pub datetime: String,
    pub desc: String,
}

impl Backup {
    /// Archive file name derived from the timestamp: `.` and `:` stripped.
    pub fn archive_name(&self) -> String {
        archive_name_for(&self.datetime)
    }
}

pub fn archive_name_for(datetime: &str) -> String {
    let stem: String = datetime.chars().filter(|c| *c != '.' && *c != ':').collect();
    format!("{stem}-world-backup.zip")
}

/// Per-instance configuration persisted as `<instance>/cfg.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InstanceConfig {
    pub cfg_version: u32,
    pub version: VersionSpec,
    pub name: String,
    pub memory: String,
    pub auto_backup: bool,
    /// Local file path or http(s) URL. Empty means "no pack".
    pub resourcepack: String,
    pub resourcepack_port: u16,
    pub backups: BTreeMap<String, Backup>,
    /// Opaque data owned by the mod-index client.
    pub modrinth: BTreeMap<String, String>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            cfg_version: CFG_VERSION,
            version: VersionSpec::default(),
            name: String::new(),
            memory: DEFAULT_MEMORY.into(),
            auto_backup: false,
            resourcepack: String::new(),
            resourcepack_port: DEFAULT_RESOURCEPACK_PORT,
            backups: BTreeMap::new(),
            modrinth: BTreeMap::new(),
        }
    }
}

impl InstanceConfig {
    /// Memory string handed to `-Xmx`/`-Xms`, falling back to the default.
    pub fn effective_memory(&self) -> &str {
        if self.memory.trim().is_empty() {
            DEFAULT_MEMORY
        } else {
            self.memory.trim()
        }
    }
}

/// Partial update applied by a merge-and-rewrite. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct InstancePatch {
    pub minecraft_version: Option<String>,
    pub loader_type: Option<LoaderType>,
    pub loader_version: Option<String>,
    pub memory: Option<String>,
    pub auto_backup: Option<bool>,
    pub resourcepack: Option<String>,
    pub resourcepack_port: Option<u16>,
    pub backups: Option<BTreeMap<String, Backup>>,
    pub modrinth: Option<BTreeMap<String, String>>,
}

impl InstancePatch {
    pub fn backups(backups: BTreeMap<String, Backup>) -> Self {
        Self {
            backups: Some(backups),
            ..Self::default()
        }
    }

    pub fn apply(self, mut cfg: InstanceConfig) -> InstanceConfig {
        if let Some(v) = self.minecraft_version {
            cfg.version.minecraft = v;
        }
        if let Some(v) = self.loader_type {
            cfg.version.loader.kind = v;
        }
        if let Some(v) = self.loader_version {
            cfg.version.loader.version = v;
        }
        if let Some(v) = self.memory {
            cfg.memory = v;
        }
        if let Some(v) = self.auto_backup {
            cfg.auto_backup = v;
        }
        if let Some(v) = self.resourcepack {
            cfg.resourcepack = v;
        }
        if let Some(v) = self.resourcepack_port {
            cfg.resourcepack_port = v;
        }
        if let Some(v) = self.backups {
            cfg.backups = v;
        }
        if let Some(v) = self.modrinth {
            cfg.modrinth = v;
        }
        cfg
    }
}
