//! Rendezvous between a client session's `saveas` request and the worker's
//! asynchronous `saveas:` reply, which arrives on the worker-facing session
//! some time later and must be routed back to whichever client asked.

use anyhow::{Result, bail};
use coedit_core::SessionId;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveAsResult {
	pub url: String,
}

#[derive(Default)]
pub struct SaveAsRendezvous {
	pending: Mutex<HashMap<SessionId, oneshot::Sender<SaveAsResult>>>,
}

impl SaveAsRendezvous {
	#[must_use]
	pub fn new() -> SaveAsRendezvous {
		SaveAsRendezvous::default()
	}

	/// Register that `session` is waiting for a `saveas:` reply, returning
	/// the receiver half the caller should await.
	pub fn register(&self, session: SessionId) -> oneshot::Receiver<SaveAsResult> {
		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(session, tx);
		rx
	}

	/// Deliver the worker's reply to whichever session is waiting for it.
	/// Returns an error if no one was waiting (a spurious or duplicate
	/// reply), which the caller should log rather than treat as fatal.
	pub fn complete(&self, session: SessionId, result: SaveAsResult) -> Result<()> {
		let sender = self.pending.lock().remove(&session);
		match sender {
			Some(sender) => {
				sender.send(result).ok();
				Ok(())
			}
			None => bail!("saveas reply for session {session} arrived with no matching request pending"),
		}
	}

	pub fn cancel(&self, session: SessionId) {
		self.pending.lock().remove(&session);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn register_then_complete_delivers_result() {
		let rendezvous = SaveAsRendezvous::new();
		let session = SessionId::new(1);
		let rx = rendezvous.register(session);
		rendezvous
			.complete(session, SaveAsResult { url: "file:///tmp/copy.odt".to_string() })
			.unwrap();
		let result = rx.await.unwrap();
		assert_eq!(result.url, "file:///tmp/copy.odt");
	}

	#[test]
	fn complete_without_registration_errors() {
		let rendezvous = SaveAsRendezvous::new();
		let err = rendezvous
			.complete(SessionId::new(1), SaveAsResult { url: String::new() })
			.unwrap_err();
		assert!(err.to_string().contains("no matching request"));
	}

	#[tokio::test]
	async fn cancel_drops_the_waiting_receiver() {
		let rendezvous = SaveAsRendezvous::new();
		let session = SessionId::new(2);
		let rx = rendezvous.register(session);
		rendezvous.cancel(session);
		assert!(rx.await.is_err());
	}
}
