pub mod global;
pub mod settings;
pub mod store;

pub use global::GlobalConfig;
pub use settings::{apply_setting, setting_keys};
pub use store::{write_atomic, ConfigStore, GLOBAL_CONFIG_FILE, INSTANCE_CONFIG_FILE};
