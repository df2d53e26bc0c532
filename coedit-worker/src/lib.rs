//! Worker pool: pre-spawns sandboxed editor processes ahead of demand and
//! hands them out to document brokers as they're needed.

mod forker;
mod link;
mod pool;

pub use forker::{ForkerHandle, NamedPipeForker};
pub use link::{LoggingWorkerLink, WorkerLink};
pub use pool::{WorkerHandle, WorkerPool};
