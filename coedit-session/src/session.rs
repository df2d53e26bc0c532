//! A single endpoint — client-facing or worker-facing — backed by its own
//! outbound [`MessageQueue`], plus the [`SessionPair`] that couples one of
//! each kind together for one document view.

use crate::editlock::EditLock;
use crate::message_queue::MessageQueue;
use crate::snoop::{self, BrokerEffects};
use coedit_core::SessionId;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
	Client,
	Worker,
}

pub struct Session {
	id: SessionId,
	kind: SessionKind,
	queue: MessageQueue,
}

impl Session {
	#[must_use]
	pub fn new(id: SessionId, kind: SessionKind) -> Session {
		Session { id, kind, queue: MessageQueue::new() }
	}

	#[must_use]
	pub fn id(&self) -> SessionId {
		self.id
	}

	#[must_use]
	pub fn kind(&self) -> SessionKind {
		self.kind
	}

	/// Enqueue a message this session's transport loop will eventually
	/// write to its WebSocket.
	pub fn send(&self, message: String) {
		self.queue.put(message);
	}

	/// Wait for and remove the next outbound message.
	pub async fn recv(&self) -> String {
		self.queue.pop().await
	}

	pub fn try_recv(&self) -> Option<String> {
		self.queue.try_pop()
	}
}

/// The client/worker endpoint pair backing one document view: a client
/// talks over WebSocket, the worker talks over the sandboxed process's pipe,
/// and this pair relays between them, applying edit-lock gating in one
/// direction and the snoop table in the other.
pub struct SessionPair {
	client: Arc<Session>,
	worker: Arc<Session>,
	edit_lock: Arc<EditLock>,
	effects: Arc<dyn BrokerEffects>,
}

impl SessionPair {
	#[must_use]
	pub fn new(client: Arc<Session>, worker: Arc<Session>, edit_lock: Arc<EditLock>, effects: Arc<dyn BrokerEffects>) -> SessionPair {
		SessionPair { client, worker, edit_lock, effects }
	}

	#[must_use]
	pub fn client(&self) -> &Arc<Session> {
		&self.client
	}

	#[must_use]
	pub fn worker(&self) -> &Arc<Session> {
		&self.worker
	}

	/// A message arrived from the client over WebSocket; gate it against
	/// the edit lock and forward whatever survives to the worker.
	pub fn forward_to_worker(&self, message: String) {
		let gated = self.edit_lock.gate(self.client.id(), &message);
		self.worker.send(gated);
	}

	/// A message arrived from the worker; snoop it for broker-visible side
	/// effects, then forward it unchanged to the client.
	pub fn forward_to_client(&self, message: String) {
		snoop::snoop(self.effects.as_ref(), &message);
		self.client.send(message);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::snoop::BrokerEffects;
	use parking_lot::Mutex;

	#[derive(Default)]
	struct RecordingEffects {
		tiles_seen: Mutex<u32>,
	}

	impl BrokerEffects for RecordingEffects {
		fn on_status(&self, _: &str) {}
		fn on_invalidate_tiles(&self, _: &str) {}
		fn on_tile(&self, _: &str) {
			*self.tiles_seen.lock() += 1;
		}
		fn on_command_values(&self, _: &str) {}
		fn on_part_page_rectangles(&self, _: &str) {}
		fn on_render_font(&self, _: &str) {}
		fn on_save_as(&self, _: &str) {}
		fn on_state_changed(&self, _: &str) {}
		fn on_uno_command_result(&self, _: &str) {}
		fn on_error(&self, _: &str) {}
	}

	fn pair() -> (SessionPair, Arc<EditLock>, Arc<RecordingEffects>) {
		let client = Arc::new(Session::new(SessionId::new(1), SessionKind::Client));
		let worker = Arc::new(Session::new(SessionId::new(2), SessionKind::Worker));
		let edit_lock = Arc::new(EditLock::new());
		let effects = Arc::new(RecordingEffects::default());
		(SessionPair::new(client, worker, edit_lock.clone(), effects.clone()), edit_lock, effects)
	}

	#[test]
	fn forward_to_worker_gates_non_lock_holders() {
		let (pair, edit_lock, _) = pair();
		edit_lock.transfer_to(SessionId::new(99));
		pair.forward_to_worker("key ...".to_string());
		assert_eq!(pair.worker().try_recv().as_deref(), Some("dummymsg"));
	}

	#[test]
	fn forward_to_client_snoops_before_delivery() {
		let (pair, _, effects) = pair();
		pair.forward_to_client("tile part=0".to_string());
		assert_eq!(*effects.tiles_seen.lock(), 1);
		assert_eq!(pair.client().try_recv().as_deref(), Some("tile part=0"));
	}
}
