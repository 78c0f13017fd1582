pub mod fabric;
pub mod manifest;
pub mod resolver;

pub use manifest::{VersionEntry, VersionManifest};
pub use resolver::{ResolvedArtifact, VersionResolver};
