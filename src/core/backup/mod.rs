pub mod archive;
pub mod engine;

pub use engine::{BackupEngine, BACKUPS_DIR};
