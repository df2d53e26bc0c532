//! Wires a [`DocumentBroker`] and the client [`Session`] it currently snoops
//! for into a [`BrokerEffects`] implementation, so [`coedit_session::SessionPair`]
//! can apply worker→client side effects without depending on this crate.

use crate::broker::DocumentBroker;
use coedit_core::TileId;
use coedit_session::{BrokerEffects, Session};
use std::sync::Arc;

/// Parse the handful of `key=value` tokens a snoop hook needs out of a wire
/// message, percent-decoding nothing (snoop payloads are not percent-encoded
/// the way client commands are).
fn token(message: &str, key: &str) -> Option<String> {
	message.split_whitespace().find_map(|tok| tok.strip_prefix(&format!("{key}=")).map(str::to_string))
}

fn parse_tile_id(message: &str) -> Option<TileId> {
	Some(TileId {
		part: token(message, "part")?.parse().ok()?,
		width: token(message, "width")?.parse().ok()?,
		height: token(message, "height")?.parse().ok()?,
		tile_pos_x: token(message, "tileposx")?.parse().ok()?,
		tile_pos_y: token(message, "tileposy")?.parse().ok()?,
		tile_width: token(message, "tilewidth")?.parse().ok()?,
		tile_height: token(message, "tileheight")?.parse().ok()?,
	})
}

/// Binds one client session's snoop side effects to its broker: `on_status`
/// needs to push `editlock: 0|1` to this specific session, which
/// `DocumentBroker` alone cannot do since it has no notion of "the client
/// currently being served."
pub struct BrokerSnoop {
	broker: Arc<DocumentBroker>,
	client: Arc<Session>,
}

impl BrokerSnoop {
	#[must_use]
	pub fn new(broker: Arc<DocumentBroker>, client: Arc<Session>) -> BrokerSnoop {
		BrokerSnoop { broker, client }
	}
}

impl BrokerEffects for BrokerSnoop {
	fn on_status(&self, message: &str) {
		if let Err(err) = self.broker.record_status(message) {
			log::warn!("failed to cache status for '{}': {err:#}", self.broker.key());
			return;
		}
		let locked = self.broker.edit_lock().holder() == Some(self.client.id());
		self.client.send(format!("editlock: {}", u8::from(locked)));
	}

	fn on_invalidate_tiles(&self, message: &str) {
		self.broker.invalidate_from_wire(message);
	}

	fn on_tile(&self, message: &str) {
		// The binary tile body itself is delivered out-of-band by the
		// dispatcher (a tile reply is a binary WebSocket frame, not text);
		// this hook only observes the text header line that precedes it.
		// Persisting the bytes happens where the dispatcher reads the
		// worker's binary frame, which is the only place that actually has
		// them.
		let _ = parse_tile_id(message);
	}

	fn on_command_values(&self, message: &str) {
		if let Err(err) = self.broker.record_command_values(message) {
			log::warn!("failed to cache commandvalues for '{}': {err:#}", self.broker.key());
		}
	}

	fn on_part_page_rectangles(&self, message: &str) {
		if let Err(err) = self.broker.tile_cache().save_sidecar(coedit_cache::SidecarSlot::PartPageRectangles, message) {
			log::warn!("failed to cache partpagerectangles for '{}': {err:#}", self.broker.key());
		}
	}

	fn on_render_font(&self, _message: &str) {
		// Font renderings arrive as binary frames too; the cache write
		// happens in the dispatcher's binary-frame path for the same reason
		// `on_tile` defers to it.
	}

	fn on_save_as(&self, message: &str) {
		let Some(url) = token(message, "url") else {
			log::warn!("saveas reply with no url= token for '{}': '{message}'", self.broker.key());
			return;
		};
		self.broker.complete_save_as(self.client.id(), &url);
	}

	fn on_state_changed(&self, message: &str) {
		self.broker.apply_state_changed(message);
	}

	fn on_uno_command_result(&self, message: &str) {
		if message.contains(".uno:Save") && message.contains("\"success\":true") {
			let broker = self.broker.clone();
			tokio::spawn(async move {
				if let Err(err) = broker.save().await {
					log::warn!("autosave-triggered save failed for '{}': {err:#}", broker.key());
				}
			});
		}
	}

	fn on_error(&self, message: &str) {
		log::warn!("worker reported error for '{}': {message}", self.broker.key());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use coedit_core::{DocKey, SessionId};
	use coedit_session::SessionKind;
	use coedit_storage::LocalStorage;
	use std::sync::Arc;

	fn snoop(dir: &std::path::Path) -> (BrokerSnoop, Arc<DocumentBroker>, Arc<Session>) {
		let doc_path = dir.join("doc.odt");
		std::fs::write(&doc_path, b"hello").unwrap();
		let storage = Arc::new(LocalStorage::new(doc_path.to_str().unwrap(), true).unwrap());
		let broker = Arc::new(DocumentBroker::new(
			DocKey::from_uri("localhost", "/doc.odt"),
			"https://example.com/doc.odt".to_string(),
			storage,
			&dir.join("cache"),
		));
		let client = Arc::new(Session::new(SessionId::new(1), SessionKind::Client));
		(BrokerSnoop::new(broker.clone(), client.clone()), broker, client)
	}

	#[test]
	fn on_status_reports_editlock_state_to_this_client() {
		let dir = tempfile::tempdir().unwrap();
		let (snoop, broker, client) = snoop(dir.path());
		broker.edit_lock().transfer_to(client.id());
		snoop.on_status("status: type=text parts=1");
		assert_eq!(client.try_recv().as_deref(), Some("editlock: 1"));
		assert!(broker.is_loaded());
	}

	#[test]
	fn on_invalidate_tiles_delegates_to_broker() {
		let dir = tempfile::tempdir().unwrap();
		let (snoop, broker, _client) = snoop(dir.path());
		let id = TileId { part: 0, width: 256, height: 256, tile_pos_x: 0, tile_pos_y: 0, tile_width: 3840, tile_height: 3840 };
		broker.tile_cache().save_tile(id, coedit_core::Blob::from(vec![1])).unwrap();
		snoop.on_invalidate_tiles("invalidatetiles: EMPTY");
		assert!(broker.tile_cache().get_tile(id).unwrap().is_none());
	}

	#[test]
	fn on_save_as_completes_the_rendezvous() {
		let dir = tempfile::tempdir().unwrap();
		let (snoop, broker, client) = snoop(dir.path());
		let rx = broker.save_as_rendezvous().register(client.id());
		snoop.on_save_as("saveas: url=/tmp/copy.odt");
		assert!(rx.try_recv().is_ok());
	}
}
