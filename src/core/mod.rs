// ─── Server Instance Core ───
// Lifecycle engine for locally managed Minecraft server instances.
//
// Architecture:
//   core/
//     config/      : Global settings + per-instance cfg.json persistence
//     instance/    : Instance model, registry and advisory locks
//     version/     : Mojang manifest, Fabric meta, artifact resolution
//     downloader/  : Checksum helpers + verified artifact cache
//     backup/      : World archives and the backup ledger
//     resourcepack/: server.properties editing + local pack hosting
//     java/        : Runtime selection per Java major
//     launch/      : Command building, I/O contracts, orchestration
//     state/       : Component wiring

pub mod backup;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod instance;
pub mod java;
pub mod launch;
pub mod progress;
pub mod resourcepack;
pub mod state;
pub mod version;
