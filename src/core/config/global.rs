use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 3_600_000;
pub const DEFAULT_LOG_MAX_LINES: u32 = 4;
pub const DEFAULT_EXEC: &str = "java";

/// Process-wide settings persisted as a single JSON file.
///
/// Every field has a default so that files written by older builds (or
/// hand-edited ones) load cleanly; [`GlobalConfig::merged_with_defaults`]
/// additionally replaces blank strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GlobalConfig {
    pub instances_folder: String,
    pub api: String,
    pub api_login: String,
    pub api_password: String,
    pub backup_on_rollback: bool,
    pub default_editor: String,
    pub show_full_progress: bool,
    pub lang: String,
    #[serde(rename = "checkUpdateInterval")]
    pub check_update_interval: u64,
    #[serde(rename = "logMaxLines")]
    pub log_max_lines: u32,
    /// Runtime used when no per-major entry matches.
    pub exec: String,
    /// Java major version → runtime executable.
    pub java_paths: BTreeMap<u32, String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            instances_folder: default_instances_folder().to_string_lossy().into_owned(),
            api: String::new(),
            api_login: String::new(),
            api_password: String::new(),
            backup_on_rollback: true,
            default_editor: String::new(),
            show_full_progress: true,
            lang: "en".into(),
            check_update_interval: DEFAULT_UPDATE_INTERVAL_MS,
            log_max_lines: DEFAULT_LOG_MAX_LINES,
            exec: DEFAULT_EXEC.into(),
            java_paths: BTreeMap::new(),
        }
    }
}

impl GlobalConfig {
    /// Field-wise fallback: blank strings take the default, booleans and
    /// numbers are kept as loaded.
    pub fn merged_with_defaults(self) -> Self {
        let defaults = Self::default();
        Self {
            instances_folder: or_default(self.instances_folder, defaults.instances_folder),
            api: or_default(self.api, defaults.api),
            api_login: or_default(self.api_login, defaults.api_login),
            api_password: or_default(self.api_password, defaults.api_password),
            backup_on_rollback: self.backup_on_rollback,
            default_editor: or_default(self.default_editor, defaults.default_editor),
            show_full_progress: self.show_full_progress,
            lang: or_default(self.lang, defaults.lang),
            check_update_interval: self.check_update_interval,
            log_max_lines: self.log_max_lines,
            exec: or_default(self.exec, defaults.exec),
            java_paths: self
                .java_paths
                .into_iter()
                .filter(|(_, path)| !path.trim().is_empty())
                .collect(),
        }
    }

    pub fn instances_dir(&self) -> PathBuf {
        PathBuf::from(&self.instances_folder)
    }
}

fn or_default(value: String, default: String) -> String {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

pub fn default_instances_folder() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".minecraft")
        .join("server_instances")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_strings_take_defaults_but_flags_are_kept() {
        let loaded = GlobalConfig {
            instances_folder: "   ".into(),
            exec: String::new(),
            lang: String::new(),
            backup_on_rollback: false,
            show_full_progress: false,
            log_max_lines: 9,
            ..GlobalConfig::default()
        };

        let merged = loaded.merged_with_defaults();
        let defaults = GlobalConfig::default();

        assert_eq!(merged.instances_folder, defaults.instances_folder);
        assert_eq!(merged.exec, DEFAULT_EXEC);
        assert_eq!(merged.lang, "en");
        assert!(!merged.backup_on_rollback);
        assert!(!merged.show_full_progress);
        assert_eq!(merged.log_max_lines, 9);
    }

    #[test]
    fn partial_file_deserializes_with_defaults() {
        let cfg: GlobalConfig =
            serde_json::from_str(r#"{"instances_folder":"/srv/mc","java_paths":{"21":"/opt/jdk21/bin/java"}}"#)
                .unwrap();
        assert_eq!(cfg.instances_folder, "/srv/mc");
        assert!(cfg.backup_on_rollback);
        assert_eq!(cfg.check_update_interval, DEFAULT_UPDATE_INTERVAL_MS);
        assert_eq!(cfg.java_paths.get(&21).map(String::as_str), Some("/opt/jdk21/bin/java"));
    }

    #[test]
    fn camel_case_keys_are_preserved() {
        let value = serde_json::to_value(GlobalConfig::default()).unwrap();
        assert!(value.get("checkUpdateInterval").is_some());
        assert!(value.get("logMaxLines").is_some());
        assert!(value.get("backup_on_rollback").is_some());
    }
}
