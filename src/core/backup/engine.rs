use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::archive;
use crate::core::config::ConfigStore;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::manager::{validate_name, WORLD_DIR};
use crate::core::instance::model::archive_name_for;
use crate::core::instance::{Backup, InstanceLock, InstancePatch};
use crate::core::progress::ProgressSender;

pub const BACKUPS_DIR: &str = "backups";

/// Local-time timestamp stored in the ledger, millisecond resolution.
const DATETIME_FORMAT: &str = "%Y.%m.%d-%H:%M:%S%.3f";

/// Creates, lists, prunes and restores world backups of one instance root.
#[derive(Debug, Clone)]
pub struct BackupEngine {
    store: ConfigStore,
    backup_on_rollback: bool,
    progress: Option<ProgressSender>,
}

impl BackupEngine {
    pub fn new(store: ConfigStore, backup_on_rollback: bool) -> Self {
        Self {
            store,
            backup_on_rollback,
            progress: None,
        }
    }

    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn backups_dir(&self, name: &str) -> PathBuf {
        self.store.instance_dir(name).join(BACKUPS_DIR)
    }

    /// Archive `world/` and record it in the ledger. Returns the new id.
    pub async fn create(&self, name: &str, description: &str) -> LauncherResult<String> {
        let dir = self.instance_dir_checked(name)?;
        let _lock = InstanceLock::acquire(&dir, name)?;
        self.create_locked(name, &dir, description).await
    }

    async fn create_locked(
        &self,
        name: &str,
        dir: &Path,
        description: &str,
    ) -> LauncherResult<String> {
        let cfg = self.store.read_instance(name)?;
        let world = dir.join(WORLD_DIR);
        if !world.is_dir() {
            return Err(LauncherError::WorldMissing(world));
        }

        let backups_dir = dir.join(BACKUPS_DIR);
        let datetime = fresh_timestamp(&cfg.backups, &backups_dir).await;
        let archive_path = backups_dir.join(archive_name_for(&datetime));

        let progress = self.progress.clone();
        let dest = archive_path.clone();
        let files = tokio::task::spawn_blocking(move || {
            archive::zip_dir(&world, &dest, progress.as_ref())
        })
        .await
        .map_err(|e| LauncherError::Other(format!("backup task failed: {e}")))??;

        let mut ledger = cfg.backups;
        let id = new_backup_id(&ledger);
        ledger.insert(
            id.clone(),
            Backup {
                version: cfg.version.minecraft,
                datetime,
                desc: description.to_string(),
            },
        );
        self.store
            .update_instance(name, InstancePatch::backups(ledger))?;

        info!(
            "Backup {} of '{}' created ({} files, {:?})",
            id, name, files, archive_path
        );
        Ok(id)
    }

    /// Ledger entries, newest first. Entries whose archive vanished are
    /// dropped and, when the instance is not busy, the ledger is rewritten.
    pub async fn list(&self, name: &str) -> LauncherResult<Vec<(String, Backup)>> {
        let dir = self.instance_dir_checked(name)?;
        let cfg = self.store.read_instance(name)?;
        let backups_dir = dir.join(BACKUPS_DIR);

        let (present, missing): (BTreeMap<_, _>, BTreeMap<_, _>) = cfg
            .backups
            .into_iter()
            .partition(|(_, b)| backups_dir.join(b.archive_name()).is_file());

        if !missing.is_empty() {
            warn!(
                "Dropping {} backup(s) of '{}' with missing archives: {:?}",
                missing.len(),
                name,
                missing.keys().collect::<Vec<_>>()
            );
            match InstanceLock::acquire(&dir, name) {
                Ok(_lock) => {
                    self.store
                        .update_instance(name, InstancePatch::backups(present.clone()))?;
                }
                Err(LauncherError::InstanceBusy { .. }) => {
                    debug!("'{}' is busy, ledger cleanup deferred", name);
                }
                Err(e) => return Err(e),
            }
        }

        let mut entries: Vec<_> = present.into_iter().collect();
        entries.sort_by(|a, b| b.1.datetime.cmp(&a.1.datetime));
        Ok(entries)
    }

    /// Delete the given backups. Every id is checked before anything is
    /// touched; an unknown id fails the whole call.
    pub async fn remove(&self, name: &str, ids: &[String]) -> LauncherResult<()> {
        let dir = self.instance_dir_checked(name)?;
        let _lock = InstanceLock::acquire(&dir, name)?;
        let mut ledger = self.store.read_instance(name)?.backups;

        if let Some(unknown) = ids.iter().find(|id| !ledger.contains_key(id.as_str())) {
            return Err(LauncherError::BackupNotFound {
                instance: name.to_string(),
                id: unknown.clone(),
            });
        }

        let backups_dir = dir.join(BACKUPS_DIR);
        for id in ids {
            let Some(entry) = ledger.remove(id.as_str()) else {
                continue;
            };
            remove_archive(&backups_dir.join(entry.archive_name())).await?;
            debug!("Removed backup {} of '{}'", id, name);
        }

        self.store
            .update_instance(name, InstancePatch::backups(ledger))?;
        info!("Removed {} backup(s) of '{}'", ids.len(), name);
        Ok(())
    }

    /// Remove every backup of the instance. Confirmation is the caller's job.
    pub async fn remove_all(&self, name: &str) -> LauncherResult<usize> {
        let ids: Vec<String> = self
            .store
            .read_instance(name)?
            .backups
            .into_keys()
            .collect();
        self.remove(name, &ids).await?;
        Ok(ids.len())
    }

    /// Replace `world/` with the contents of backup `id`.
    pub async fn rollback(&self, name: &str, id: &str) -> LauncherResult<()> {
        let dir = self.instance_dir_checked(name)?;
        let _lock = InstanceLock::acquire(&dir, name)?;
        let cfg = self.store.read_instance(name)?;

        let not_found = || LauncherError::BackupNotFound {
            instance: name.to_string(),
            id: id.to_string(),
        };
        let entry = cfg.backups.get(id).ok_or_else(not_found)?;
        let archive_path = dir.join(BACKUPS_DIR).join(entry.archive_name());
        if !archive_path.is_file() {
            warn!("Archive of backup {} is missing: {:?}", id, archive_path);
            return Err(not_found());
        }

        if self.backup_on_rollback {
            let desc = format!("Automatic backup before rollback to {id}");
            match self.create_locked(name, &dir, &desc).await {
                Ok(safety) => info!("Safety backup {} taken before rollback", safety),
                Err(LauncherError::WorldMissing(_)) | Err(LauncherError::EmptyWorld(_)) => {
                    info!("Nothing to protect in '{}', skipping safety backup", name);
                }
                Err(e) => return Err(e),
            }
        }

        let world = dir.join(WORLD_DIR);
        if world.exists() {
            tokio::fs::remove_dir_all(&world)
                .await
                .map_err(LauncherError::io(&world))?;
        }
        tokio::fs::create_dir_all(&world)
            .await
            .map_err(LauncherError::io(&world))?;

        let progress = self.progress.clone();
        let entries = tokio::task::spawn_blocking(move || {
            archive::extract_into(&archive_path, &world, progress.as_ref())
        })
        .await
        .map_err(|e| LauncherError::Other(format!("rollback task failed: {e}")))??;

        info!(
            "Rolled back '{}' to backup {} ({} entries)",
            name, id, entries
        );
        Ok(())
    }

    fn instance_dir_checked(&self, name: &str) -> LauncherResult<PathBuf> {
        validate_name(name)?;
        let dir = self.store.instance_dir(name);
        if !dir.is_dir() {
            return Err(LauncherError::InstanceNotFound(name.to_string()));
        }
        Ok(dir)
    }
}

async fn remove_archive(path: &Path) -> LauncherResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Archive already gone: {:?}", path);
            Ok(())
        }
        Err(source) => Err(LauncherError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// A timestamp not yet used by the ledger and with no archive on disk.
async fn fresh_timestamp(ledger: &BTreeMap<String, Backup>, backups_dir: &Path) -> String {
    loop {
        let stamp = chrono::Local::now().format(DATETIME_FORMAT).to_string();
        let taken = ledger.values().any(|b| b.datetime == stamp)
            || backups_dir.join(archive_name_for(&stamp)).exists();
        if !taken {
            return stamp;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Random hex id not present in `ledger`: two digits while fewer than 256
/// ids exist, then four (eight past 65536).
pub fn new_backup_id(ledger: &BTreeMap<String, Backup>) -> String {
    let width = match ledger.len() {
        0..=255 => 1,
        256..=65_535 => 2,
        _ => 4,
    };
    loop {
        let random = uuid::Uuid::new_v4();
        let id = hex::encode(&random.as_bytes()[..width]);
        if !ledger.contains_key(&id) {
            return id;
        }
    }
}
