use std::path::Path;

use instancer_lib::core::backup::{BackupEngine, BACKUPS_DIR};
use instancer_lib::core::config::{ConfigStore, GLOBAL_CONFIG_FILE};
use instancer_lib::core::instance::{InstanceRegistry, LoaderType, NewInstance};
use instancer_lib::LauncherError;
use tempfile::TempDir;

fn snapshot(world: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<_> = walkdir::WalkDir::new(world)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(world).unwrap().to_string_lossy().into_owned();
            (rel, std::fs::read(e.path()).unwrap())
        })
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn survival_instance_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let store = ConfigStore::new(
        tmp.path().join(GLOBAL_CONFIG_FILE),
        tmp.path().join("instances"),
    );
    let registry = InstanceRegistry::new(store.clone());
    let backups = BackupEngine::new(store, true);

    registry
        .create(NewInstance {
            minecraft_version: Some("latest".into()),
            loader: Some(LoaderType::Vanilla),
            memory: Some("4G".into()),
            ..NewInstance::new("survival")
        })
        .await
        .unwrap();

    let listed = registry.list().await.unwrap();
    let (name, cfg) = listed
        .iter()
        .find(|(name, _)| name == "survival")
        .expect("survival listed");
    assert_eq!(name, "survival");
    assert_eq!(cfg.memory, "4G");

    let world = registry.instance_dir("survival").join("world");
    std::fs::create_dir_all(world.join("region")).unwrap();
    std::fs::write(world.join("level.dat"), b"seed=42").unwrap();
    std::fs::write(world.join("region").join("r.0.0.mca"), vec![1u8; 2048]).unwrap();

    let id = backups.create("survival", "nightly").await.unwrap();
    let ledger = registry.read("survival").unwrap().backups;
    assert_eq!(ledger.len(), 1);
    let entry = &ledger[&id];

    let backups_dir = registry.instance_dir("survival").join(BACKUPS_DIR);
    let archives: Vec<_> = std::fs::read_dir(&backups_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(archives, vec![entry.archive_name()]);
    let date_part: String = entry.datetime[..10].chars().filter(|c| *c != '.').collect();
    assert!(archives[0].starts_with(&date_part));

    // Round trip onto an emptied world.
    let original = snapshot(&world);
    std::fs::remove_dir_all(&world).unwrap();
    std::fs::create_dir_all(&world).unwrap();
    backups.rollback("survival", &id).await.unwrap();
    assert_eq!(snapshot(&world), original);

    // Archive removed behind the engine's back: list drops the entry.
    std::fs::remove_file(backups_dir.join(entry.archive_name())).unwrap();
    let remaining = backups.list("survival").await.unwrap();
    assert!(remaining.iter().all(|(other, _)| *other != id));
    assert!(!registry.read("survival").unwrap().backups.contains_key(&id));

    let err = backups.rollback("survival", &id).await.unwrap_err();
    assert!(matches!(err, LauncherError::BackupNotFound { .. }));
    assert_eq!(snapshot(&world), original);
}
