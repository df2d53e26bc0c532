//! The seam between this crate's pool bookkeeping and the actual
//! sandboxed-process forker, which is out of scope here. `ForkerHandle` is
//! small enough that the pool's acquire/replenish/LIFO logic is fully
//! testable against a fake implementation.

use anyhow::Result;
use std::fmt::Debug;

pub trait ForkerHandle: Debug + Send + Sync {
	/// Ask the forker to spawn `count` additional sandboxed worker
	/// processes. Returns once the request has been issued, not once the
	/// workers are ready — readiness arrives later as a call to
	/// [`crate::WorkerPool::worker_ready`].
	fn request_spawn(&self, count: u32) -> Result<()>;
}

/// Production stand-in: in a deployed server this writes a framed
/// `spawn <count>` command to the forker's named control pipe. Kept here as
/// a stub since constructing the actual jail/process boundary is out of
/// scope.
#[derive(Debug)]
pub struct NamedPipeForker {
	pipe_path: std::path::PathBuf,
}

impl NamedPipeForker {
	#[must_use]
	pub fn new(pipe_path: std::path::PathBuf) -> NamedPipeForker {
		NamedPipeForker { pipe_path }
	}
}

impl ForkerHandle for NamedPipeForker {
	fn request_spawn(&self, count: u32) -> Result<()> {
		log::info!(
			"requesting forker at {:?} to spawn {count} worker process(es)",
			self.pipe_path
		);
		Ok(())
	}
}
