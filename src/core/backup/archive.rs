// ─── World Archives ───
// Zip a world tree into a single archive and unpack it again. Both sides are
// blocking and meant to run under `spawn_blocking`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::progress::{self, ProgressSender};

/// Every regular file under `root` as (absolute path, forward-slash relative name).
fn collect_files(root: &Path) -> LauncherResult<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| LauncherError::Io {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        files.push((entry.path().to_path_buf(), name));
    }
    Ok(files)
}

/// Zip every regular file under `root` into `dest`.
///
/// The archive is written to `<dest>.part` and renamed on success, so `dest`
/// only ever holds a complete archive. An empty tree is `EmptyWorld`.
pub fn zip_dir(
    root: &Path,
    dest: &Path,
    progress_tx: Option<&ProgressSender>,
) -> LauncherResult<u64> {
    if !root.is_dir() {
        return Err(LauncherError::WorldMissing(root.to_path_buf()));
    }
    let files = collect_files(root)?;
    if files.is_empty() {
        return Err(LauncherError::EmptyWorld(root.to_path_buf()));
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(LauncherError::io(parent))?;
    }

    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let result = write_archive(&files, &part, progress_tx);
    if let Err(e) = result {
        let _ = std::fs::remove_file(&part);
        return Err(e);
    }

    std::fs::rename(&part, dest).map_err(LauncherError::io(dest))?;
    debug!("Archived {} files from {:?} into {:?}", files.len(), root, dest);
    Ok(files.len() as u64)
}

fn write_archive(
    files: &[(PathBuf, String)],
    part: &Path,
    progress_tx: Option<&ProgressSender>,
) -> LauncherResult<()> {
    let out = File::create(part).map_err(LauncherError::io(part))?;
    let mut writer = zip::ZipWriter::new(BufWriter::new(out));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let total = files.len() as u64;

    for (index, (path, name)) in files.iter().enumerate() {
        writer.start_file(name.as_str(), options)?;
        let mut input = File::open(path).map_err(LauncherError::io(path))?;
        std::io::copy(&mut input, &mut writer).map_err(LauncherError::io(path))?;
        progress::emit(progress_tx, index as u64 + 1, total, name);
    }

    let mut inner = writer.finish()?;
    inner.flush().map_err(LauncherError::io(part))?;
    Ok(())
}

/// Unpack `archive` into `target`, which must already exist.
///
/// Entries whose names escape the target are rejected. The first failing
/// entry aborts with `Extraction`; files written before it stay.
pub fn extract_into(
    archive: &Path,
    target: &Path,
    progress_tx: Option<&ProgressSender>,
) -> LauncherResult<u64> {
    let extraction = |message: String| LauncherError::Extraction {
        archive: archive.to_path_buf(),
        message,
    };

    let file = File::open(archive).map_err(LauncherError::io(archive))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| extraction(e.to_string()))?;
    let total = zip.len() as u64;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| extraction(format!("entry #{index}: {e}")))?;
        let rel = entry
            .enclosed_name()
            .ok_or_else(|| extraction(format!("unsafe entry path {:?}", entry.name())))?;
        let out_path = target.join(&rel);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .map_err(|e| extraction(format!("{}: {e}", rel.display())))?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| extraction(format!("{}: {e}", rel.display())))?;
            }
            let mut out = File::create(&out_path)
                .map_err(|e| extraction(format!("{}: {e}", rel.display())))?;
            std::io::copy(&mut entry, &mut out)
                .map_err(|e| extraction(format!("{}: {e}", rel.display())))?;
        }

        progress::emit(
            progress_tx,
            index as u64 + 1,
            total,
            &rel.to_string_lossy(),
        );
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn world(tmp: &TempDir) -> PathBuf {
        let root = tmp.path().join("world");
        std::fs::create_dir_all(root.join("region")).unwrap();
        std::fs::create_dir_all(root.join("empty")).unwrap();
        std::fs::write(root.join("level.dat"), b"level").unwrap();
        std::fs::write(root.join("region").join("r.0.0.mca"), vec![7u8; 4096]).unwrap();
        root
    }

    #[test]
    fn archive_uses_forward_slash_relative_names() {
        let tmp = TempDir::new().unwrap();
        let root = world(&tmp);
        let dest = tmp.path().join("backups").join("a.zip");

        assert_eq!(zip_dir(&root, &dest, None).unwrap(), 2);
        assert!(!tmp.path().join("backups").join("a.zip.part").exists());

        let zip = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut names: Vec<_> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["level.dat", "region/r.0.0.mca"]);
    }

    #[test]
    fn round_trip_restores_identical_tree() {
        let tmp = TempDir::new().unwrap();
        let root = world(&tmp);
        let dest = tmp.path().join("a.zip");
        zip_dir(&root, &dest, None).unwrap();

        let restored = tmp.path().join("restored");
        std::fs::create_dir_all(&restored).unwrap();
        extract_into(&dest, &restored, None).unwrap();

        assert_eq!(std::fs::read(restored.join("level.dat")).unwrap(), b"level");
        assert_eq!(
            std::fs::read(restored.join("region").join("r.0.0.mca")).unwrap(),
            vec![7u8; 4096]
        );
    }

    #[test]
    fn empty_tree_is_rejected_without_archive() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("world");
        std::fs::create_dir_all(root.join("nested")).unwrap();
        let dest = tmp.path().join("a.zip");

        assert!(matches!(
            zip_dir(&root, &dest, None).unwrap_err(),
            LauncherError::EmptyWorld(_)
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn missing_tree_is_world_missing() {
        let tmp = TempDir::new().unwrap();
        let err = zip_dir(&tmp.path().join("nope"), &tmp.path().join("a.zip"), None).unwrap_err();
        assert!(matches!(err, LauncherError::WorldMissing(_)));
    }

    #[test]
    fn directory_entries_are_recreated() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("dirs.zip");
        {
            let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
            writer
                .add_directory("data/", SimpleFileOptions::default())
                .unwrap();
            writer
                .start_file("data/stats.json", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"{}").unwrap();
            writer.finish().unwrap();
        }

        let target = tmp.path().join("out");
        std::fs::create_dir_all(&target).unwrap();
        assert_eq!(extract_into(&archive, &target, None).unwrap(), 2);
        assert!(target.join("data").is_dir());
        assert_eq!(std::fs::read(target.join("data/stats.json")).unwrap(), b"{}");
    }

    #[test]
    fn corrupt_archive_is_extraction_error() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("bad.zip");
        std::fs::write(&archive, b"not a zip").unwrap();
        let err = extract_into(&archive, tmp.path(), None).unwrap_err();
        assert!(matches!(err, LauncherError::Extraction { .. }));
    }

    #[test]
    fn reports_progress_per_file() {
        let tmp = TempDir::new().unwrap();
        let root = world(&tmp);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        zip_dir(&root, &tmp.path().join("a.zip"), Some(&tx)).unwrap();
        drop(tx);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push((event.current, event.total));
        }
        assert_eq!(events, vec![(1, 2), (2, 2)]);
    }
}
