// ─── Java Runtime Selection ───
// Picks the java executable for a required major version from the
// user-maintained table in the global config.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::config::GlobalConfig;
use crate::core::error::{LauncherError, LauncherResult};

/// Major -> executable, with a fallback for majors not in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeTable {
    default_exec: String,
    by_major: BTreeMap<u32, String>,
}

impl RuntimeTable {
    pub fn new(default_exec: impl Into<String>, by_major: BTreeMap<u32, String>) -> Self {
        Self {
            default_exec: default_exec.into(),
            by_major,
        }
    }

    pub fn from_config(cfg: &GlobalConfig) -> Self {
        Self::new(cfg.exec.clone(), cfg.java_paths.clone())
    }

    /// Executable for `required_major`. Entries that look like paths must
    /// exist; bare names are left to the `PATH` lookup at spawn time.
    pub fn select(&self, required_major: u32) -> LauncherResult<PathBuf> {
        let chosen = self
            .by_major
            .get(&required_major)
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.default_exec);
        let program = PathBuf::from(chosen.trim());

        if program.as_os_str().is_empty() || (looks_like_path(&program) && !program.is_file()) {
            return Err(LauncherError::RuntimeNotFound(program));
        }

        debug!("Java {} -> {:?}", required_major, program);
        Ok(program)
    }
}

fn looks_like_path(program: &Path) -> bool {
    program.is_absolute() || program.components().count() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn table_entry_wins_over_default() {
        let tmp = TempDir::new().unwrap();
        let java21 = tmp.path().join("java");
        std::fs::write(&java21, b"").unwrap();

        let table = RuntimeTable::new(
            "java",
            BTreeMap::from([(21, java21.to_string_lossy().into_owned())]),
        );
        assert_eq!(table.select(21).unwrap(), java21);
        assert_eq!(table.select(17).unwrap(), PathBuf::from("java"));
    }

    #[test]
    fn missing_path_entry_is_runtime_not_found() {
        let table = RuntimeTable::new(
            "java",
            BTreeMap::from([(8, "/definitely/not/here/java".to_string())]),
        );
        assert!(matches!(
            table.select(8).unwrap_err(),
            LauncherError::RuntimeNotFound(p) if p == Path::new("/definitely/not/here/java")
        ));
        assert!(matches!(
            RuntimeTable::new(" ", BTreeMap::new()).select(21).unwrap_err(),
            LauncherError::RuntimeNotFound(_)
        ));
    }

    #[test]
    fn built_from_global_config() {
        let mut cfg = GlobalConfig::default();
        cfg.exec = "java17".into();
        cfg.java_paths.insert(8, String::new());
        let table = RuntimeTable::from_config(&cfg);
        assert_eq!(table.select(8).unwrap(), PathBuf::from("java17"));
    }
}
