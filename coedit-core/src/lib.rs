//! Shared vocabulary for the document collaboration coordination core.
//!
//! This crate has no async runtime dependency and no I/O of its own — it is
//! the set of small value types (`Blob`, `DocKey`, `TileId`, `Part`,
//! `InvalidationRect`, `ErrorKind`) that the cache, storage, worker, session,
//! and broker crates all build on, plus the digest/fan-out helpers the tile
//! cache's on-disk layout depends on.

mod blob;
mod digest;
mod dockey;
mod error;
mod jail;
mod tile;

pub use blob::Blob;
pub use digest::{cache_dir_fanout, hex_digest};
pub use dockey::DocKey;
pub use error::ErrorKind;
pub use jail::{JAILED_DOCUMENT_ROOT, jailed_document_path};
pub use tile::{InvalidationRect, Part, TileId};

/// A session is addressed by a short opaque id, minted by the `Server` and
/// never reused within its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
	#[must_use]
	pub fn new(value: u64) -> SessionId {
		SessionId(value)
	}

	#[must_use]
	pub fn get(self) -> u64 {
		self.0
	}
}

impl std::fmt::Display for SessionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:08x}", self.0)
	}
}
