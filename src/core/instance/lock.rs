use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

pub const LOCK_FILE: &str = ".instance.lock";

/// Advisory per-instance lock held for the duration of a mutating operation.
///
/// The lock is a file created with `create_new` holding the owner's pid; a
/// second holder fails with [`LauncherError::InstanceBusy`]. Dropping the
/// guard removes the file. A lock whose pid no longer names a running process
/// was left by a killed invocation and is taken over.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(instance_dir: &Path, name: &str) -> LauncherResult<Self> {
        let path = instance_dir.join(LOCK_FILE);
        let file = match open_exclusive(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let Some(pid) = dead_owner(&path) else {
                    return Err(busy(name, path));
                };
                warn!(
                    "Lock {:?} of '{}' belongs to process {} which is gone, taking it over",
                    path, name, pid
                );
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(source) => return Err(LauncherError::Io { path, source }),
                }
                // Another invocation may have won the race for the stale lock.
                open_exclusive(&path)
            }
            other => other,
        };
        let mut file = match file {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(busy(name, path));
            }
            Err(source) => return Err(LauncherError::Io { path, source }),
        };

        let _ = writeln!(file, "{}", std::process::id());
        debug!("Acquired lock {:?}", path);
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_exclusive(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

fn busy(name: &str, lock: PathBuf) -> LauncherError {
    LauncherError::InstanceBusy {
        name: name.to_string(),
        lock,
    }
}

/// Pid recorded in `path` if that process is no longer running. An unreadable
/// or empty file counts as held: its owner may not have written the pid yet.
fn dead_owner(path: &Path) -> Option<u32> {
    let pid: u32 = std::fs::read_to_string(path).ok()?.trim().parse().ok()?;
    let system = sysinfo::System::new_all();
    match system.process(sysinfo::Pid::from_u32(pid)) {
        Some(_) => None,
        None => Some(pid),
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            // The instance directory itself may have been deleted under the lock.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to release lock {:?}: {}", self.path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_acquire_is_busy_until_release() {
        let tmp = TempDir::new().unwrap();

        let guard = InstanceLock::acquire(tmp.path(), "survival").unwrap();
        let err = InstanceLock::acquire(tmp.path(), "survival").unwrap_err();
        assert!(matches!(err, LauncherError::InstanceBusy { .. }));

        drop(guard);
        assert!(!tmp.path().join(LOCK_FILE).exists());
        assert!(InstanceLock::acquire(tmp.path(), "survival").is_ok());
    }

    #[test]
    fn lock_of_dead_process_is_taken_over() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(LOCK_FILE);
        std::fs::write(&path, format!("{}\n", u32::MAX - 1)).unwrap();

        let guard = InstanceLock::acquire(tmp.path(), "survival").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap().trim(),
            std::process::id().to_string()
        );
        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn lock_of_live_process_stays_busy() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(LOCK_FILE);
        std::fs::write(&path, format!("{}\n", std::process::id())).unwrap();

        let err = InstanceLock::acquire(tmp.path(), "survival").unwrap_err();
        assert!(matches!(err, LauncherError::InstanceBusy { .. }));
        assert!(path.exists());
    }

    #[test]
    fn lock_without_pid_stays_busy() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(LOCK_FILE), "").unwrap();

        let err = InstanceLock::acquire(tmp.path(), "survival").unwrap_err();
        assert!(matches!(err, LauncherError::InstanceBusy { .. }));
    }
}
