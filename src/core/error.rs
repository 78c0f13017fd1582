use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the instance lifecycle engine.
/// Every component returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("Network error while fetching {url}: {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Sha1Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Configuration ───────────────────────────────────
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    #[error("Invalid value {value:?} for setting {key}: {reason}")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },

    // ── Instance ────────────────────────────────────────
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Instance already exists: {0}")]
    InstanceAlreadyExists(String),

    #[error("Invalid instance name: {0:?}")]
    InvalidInstanceName(String),

    #[error("Instance {name} is locked by another operation ({lock:?})")]
    InstanceBusy { name: String, lock: PathBuf },

    // ── Version / Loader ────────────────────────────────
    #[error("Minecraft version not found in manifest: {0}")]
    VersionNotFound(String),

    #[error("Unsupported loader: {0}")]
    UnsupportedLoader(String),

    #[error("Loader version not found: {0}")]
    LoaderNotFound(String),

    #[error("Artifact download info missing for {0}")]
    ArtifactInfoMissing(String),

    // ── Backups ─────────────────────────────────────────
    #[error("Backup {id} not found for instance {instance}")]
    BackupNotFound { instance: String, id: String },

    #[error("World folder not found at {0:?}")]
    WorldMissing(PathBuf),

    #[error("No files to back up in {0:?}")]
    EmptyWorld(PathBuf),

    #[error("Extraction of {archive:?} failed: {message}")]
    Extraction { archive: PathBuf, message: String },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Server properties / resource pack ───────────────
    #[error("Key '{key}' not found in {path:?}")]
    PropertyNotFound { path: PathBuf, key: String },

    #[error("Resource pack error: {0}")]
    ResourcePack(String),

    // ── Process ─────────────────────────────────────────
    #[error("Java runtime not found: {0:?}")]
    RuntimeNotFound(PathBuf),

    #[error("Failed to spawn server process: {0}")]
    Spawn(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl LauncherError {
    /// Build a closure that wraps a `reqwest::Error` with the URL that was attempted.
    pub fn network(url: &str) -> impl FnOnce(reqwest::Error) -> LauncherError + '_ {
        move |source| LauncherError::Network {
            url: url.to_string(),
            source,
        }
    }

    /// Closure that wraps an IO error with the path it happened on.
    pub fn io(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> LauncherError + '_ {
        move |source| LauncherError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// `true` for the "unknown instance or backup" family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LauncherError::InstanceNotFound(_) | LauncherError::BackupNotFound { .. }
        )
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// ── Serialization for front-end IPC ─────────────────────
// Front-ends ship errors as plain strings.
impl serde::Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_family_is_detected() {
        assert!(LauncherError::InstanceNotFound("a".into()).is_not_found());
        assert!(LauncherError::BackupNotFound {
            instance: "a".into(),
            id: "0f".into()
        }
        .is_not_found());
        assert!(!LauncherError::VersionNotFound("9.9".into()).is_not_found());
    }

    #[test]
    fn serializes_as_display_string() {
        let err = LauncherError::InstanceAlreadyExists("survival".into());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Instance already exists: survival\"");
    }
}
