pub mod lock;
pub mod manager;
pub mod model;

pub use lock::InstanceLock;
pub use manager::{InstanceRegistry, NewInstance};
pub use model::{Backup, InstanceConfig, InstancePatch, LoaderType};
