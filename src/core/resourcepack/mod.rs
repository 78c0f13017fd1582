pub mod properties;
pub mod publisher;
pub mod server;

pub use properties::ServerProperties;
pub use publisher::{PublishedPack, ResourcePackPublisher};
pub use server::ResourcePackServer;
