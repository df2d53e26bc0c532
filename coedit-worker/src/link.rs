//! The seam between a broker's worker-facing session and the actual
//! core→worker control connection, which is out of scope here for the same
//! reason the forker's process boundary is: there is no real sandboxed
//! editor process to dial. `WorkerLink` mirrors [`crate::ForkerHandle`]'s
//! stub pattern so the dispatcher's per-connection plumbing is fully real
//! while the transport underneath it is a logging stand-in.

use anyhow::Result;
use coedit_core::SessionId;
use std::fmt::Debug;

/// One outbound frame destined for the worker process owning `session`'s
/// document, addressed by the document key the way `session <id> <docKey>`
/// addresses it on the real control WebSocket.
pub trait WorkerLink: Debug + Send + Sync {
	fn dispatch(&self, session: SessionId, doc_key: &str, message: &str) -> Result<()>;
}

/// Production stand-in: in a deployed server this writes `message` to the
/// worker's control WebSocket. Kept here as a stub since there is no real
/// worker process to connect to.
#[derive(Debug, Default)]
pub struct LoggingWorkerLink;

impl LoggingWorkerLink {
	#[must_use]
	pub fn new() -> LoggingWorkerLink {
		LoggingWorkerLink
	}
}

impl WorkerLink for LoggingWorkerLink {
	fn dispatch(&self, session: SessionId, doc_key: &str, message: &str) -> Result<()> {
		log::debug!("worker link: session {session} doc '{doc_key}' <- {message:?}");
		Ok(())
	}
}
