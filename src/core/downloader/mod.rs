pub mod cache;
pub mod checksum;

pub use cache::{ArtifactCache, EnsureOutcome};
