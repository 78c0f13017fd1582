use std::path::{Path, PathBuf};

use crate::core::config::write_atomic;
use crate::core::error::{LauncherError, LauncherResult};

/// `server.properties` as raw lines, so comments and ordering survive a
/// rewrite.
#[derive(Debug, Clone)]
pub struct ServerProperties {
    path: PathBuf,
    lines: Vec<String>,
}

impl ServerProperties {
    /// A missing file loads as empty.
    pub fn load(path: &Path) -> LauncherResult<Self> {
        let lines = match std::fs::read_to_string(path) {
            Ok(raw) => raw.lines().map(str::to_string).collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(LauncherError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            lines,
        })
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.lines.iter().position(|line| {
            let line = line.trim_start();
            !line.starts_with('#')
                && line
                    .split_once('=')
                    .is_some_and(|(k, _)| k.trim() == key)
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key)
            .and_then(|i| self.lines[i].split_once('='))
            .map(|(_, v)| v)
    }

    /// Replace the value of an existing key. Keys are never added.
    pub fn set(&mut self, key: &str, value: &str) -> LauncherResult<()> {
        let index = self
            .position(key)
            .ok_or_else(|| LauncherError::PropertyNotFound {
                path: self.path.clone(),
                key: key.to_string(),
            })?;
        self.lines[index] = format!("{key}={value}");
        Ok(())
    }

    pub fn save(&self) -> LauncherResult<()> {
        let mut out = self.lines.join("\n");
        out.push('\n');
        write_atomic(&self.path, out.as_bytes())
    }
}
