//! Per-document orchestration: one broker per open document, owning its
//! tile cache, its sessions' shared edit lock, and the autosave decision.

use anyhow::{Result, bail};
use coedit_cache::{SidecarSlot, TileCache};
use coedit_core::{Blob, DocKey, InvalidationRect, Part, TileId};
use coedit_session::{EditLock, SaveAsRendezvous, SaveAsResult};
use coedit_storage::StorageBackend;
use coedit_worker::WorkerHandle;
use dashmap::DashMap;
use coedit_core::SessionId;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub struct DocumentBroker {
	key: DocKey,
	public_url: String,
	storage: Arc<dyn StorageBackend>,
	tile_cache: Arc<TileCache>,
	edit_lock: Arc<EditLock>,
	save_as: Arc<SaveAsRendezvous>,
	worker: Mutex<Option<WorkerHandle>>,
	jailed_path: Mutex<Option<PathBuf>>,
	sessions: DashMap<SessionId, ()>,
	modified: AtomicBool,
	loaded: AtomicBool,
	last_activity: Mutex<Instant>,
	last_save: Mutex<Instant>,
	created_at: Instant,
}

impl DocumentBroker {
	#[must_use]
	pub fn new(key: DocKey, public_url: String, storage: Arc<dyn StorageBackend>, cache_root: &std::path::Path) -> DocumentBroker {
		let now = Instant::now();
		let tile_cache = Arc::new(TileCache::new(cache_root, key.as_str()));
		DocumentBroker {
			key,
			public_url,
			storage,
			tile_cache,
			edit_lock: Arc::new(EditLock::new()),
			save_as: Arc::new(SaveAsRendezvous::new()),
			worker: Mutex::new(None),
			jailed_path: Mutex::new(None),
			sessions: DashMap::new(),
			modified: AtomicBool::new(false),
			loaded: AtomicBool::new(false),
			last_activity: Mutex::new(now),
			last_save: Mutex::new(now),
			created_at: now,
		}
	}

	/// Seconds elapsed since this broker was constructed, for the admin
	/// channel's `documents` listing (`elapsedSeconds`).
	#[must_use]
	pub fn elapsed_seconds(&self) -> u64 {
		self.created_at.elapsed().as_secs()
	}

	#[must_use]
	pub fn key(&self) -> &DocKey {
		&self.key
	}

	#[must_use]
	pub fn public_url(&self) -> &str {
		&self.public_url
	}

	#[must_use]
	pub fn tile_cache(&self) -> &Arc<TileCache> {
		&self.tile_cache
	}

	#[must_use]
	pub fn edit_lock(&self) -> &Arc<EditLock> {
		&self.edit_lock
	}

	#[must_use]
	pub fn save_as_rendezvous(&self) -> &Arc<SaveAsRendezvous> {
		&self.save_as
	}

	pub fn assign_worker(&self, handle: WorkerHandle) {
		*self.worker.lock() = Some(handle);
	}

	#[must_use]
	pub fn worker(&self) -> Option<WorkerHandle> {
		self.worker.lock().clone()
	}

	#[must_use]
	pub fn jailed_path(&self) -> Option<PathBuf> {
		self.jailed_path.lock().clone()
	}

	#[must_use]
	pub fn is_loaded(&self) -> bool {
		self.loaded.load(Ordering::SeqCst)
	}

	pub fn add_session(&self, id: SessionId) {
		self.sessions.insert(id, ());
		*self.last_activity.lock() = Instant::now();
	}

	pub fn remove_session(&self, id: SessionId) {
		self.sessions.remove(&id);
		self.edit_lock.release(id);
		self.save_as.cancel(id);
	}

	#[must_use]
	pub fn session_count(&self) -> usize {
		self.sessions.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.sessions.is_empty()
	}

	pub fn note_activity(&self) {
		*self.last_activity.lock() = Instant::now();
	}

	pub fn mark_modified(&self) {
		self.modified.store(true, Ordering::SeqCst);
	}

	#[must_use]
	pub fn is_modified(&self) -> bool {
		self.modified.load(Ordering::SeqCst)
	}

	/// Load the document's storage-side bytes into the jail, gating the
	/// tile cache on the freshly reported modification time, and remember
	/// `local_path` so later `save()` calls need not be told it again.
	/// Idempotent: a second call is a no-op.
	pub async fn load(&self, local_path: &std::path::Path) -> Result<()> {
		if self.loaded.load(Ordering::SeqCst) {
			return Ok(());
		}
		if let Some(parent) = local_path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		let info = self.storage.get_file_info().await?;
		self.storage.load_to_local(local_path).await?;
		self.tile_cache.ensure_fresh(info.modified_time)?;
		*self.jailed_path.lock() = Some(local_path.to_path_buf());
		self.loaded.store(true, Ordering::SeqCst);
		Ok(())
	}

	/// Write the jailed copy back to storage, recording the save time.
	/// Fails if the document has not been loaded yet.
	pub async fn save(&self) -> Result<bool> {
		let Some(local_path) = self.jailed_path() else {
			bail!("save() called on broker for '{}' before it finished loading", self.key);
		};
		let saved = self.storage.save_from_local(&local_path).await?;
		if saved {
			*self.last_save.lock() = Instant::now();
			self.modified.store(false, Ordering::SeqCst);
			if let Ok(info) = self.storage.get_file_info().await {
				self.tile_cache.document_saved(info.modified_time);
			}
		}
		Ok(saved)
	}

	/// Serve a tile request from the cache; `None` signals a miss the
	/// caller must forward to the worker.
	pub fn handle_tile_request(&self, id: TileId) -> Result<Option<Blob>> {
		self.tile_cache.get_tile(id)
	}

	/// `status:` snoop hook: persist the sidecar and mark the document
	/// loaded.
	pub fn record_status(&self, message: &str) -> Result<()> {
		self.tile_cache.save_status(message)?;
		self.loaded.store(true, Ordering::SeqCst);
		Ok(())
	}

	/// Parse and apply `invalidatetiles: EMPTY | <w> <h> <x> <y>`.
	/// Unparsable parameters are logged and ignored, never
	/// treated as an error the caller must propagate.
	pub fn invalidate_from_wire(&self, message: &str) {
		let Some(rest) = message.strip_prefix("invalidatetiles:") else { return };
		let rest = rest.trim();
		if rest == "EMPTY" {
			if let Err(err) = self.tile_cache.invalidate_all() {
				log::warn!("invalidate-all failed for '{}': {err:#}", self.key);
			}
			return;
		}
		let parts: Vec<&str> = rest.split_whitespace().collect();
		let [w, h, x, y] = parts.as_slice() else {
			log::warn!("ignoring malformed invalidatetiles message for '{}': '{message}'", self.key);
			return;
		};
		let (Ok(width), Ok(height), Ok(x), Ok(y)) = (w.parse(), h.parse(), x.parse(), y.parse()) else {
			log::warn!("ignoring malformed invalidatetiles message for '{}': '{message}'", self.key);
			return;
		};
		let rect = InvalidationRect { part: Part::Any, x, y, width, height };
		if let Err(err) = self.tile_cache.invalidate_tiles(rect) {
			log::warn!("invalidate_tiles failed for '{}': {err:#}", self.key);
		}
	}

	/// `statechanged: .uno:ModifiedStatus=true|false` snoop hook.
	pub fn apply_state_changed(&self, message: &str) {
		if let Some(rest) = message.strip_prefix("statechanged:") {
			let rest = rest.trim();
			if let Some(value) = rest.strip_prefix(".uno:ModifiedStatus=") {
				match value {
					"true" => self.modified.store(true, Ordering::SeqCst),
					"false" => self.modified.store(false, Ordering::SeqCst),
					_ => log::warn!("ignoring unrecognized ModifiedStatus value '{value}' for '{}'", self.key),
				}
			}
		}
	}

	/// `commandvalues: {…}` snoop hook: only `.uno:CharFontName` and
	/// `.uno:StyleApply` are cacheable, each into its own slot keyed by
	/// command name, so a cached reply for one never shadows the other.
	pub fn record_command_values(&self, message: &str) -> Result<()> {
		let Some(json_start) = message.find('{') else { return Ok(()) };
		let Ok(value) = serde_json::from_str::<serde_json::Value>(&message[json_start..]) else {
			return Ok(());
		};
		let Some(command_name) = value.get("commandName").and_then(|v| v.as_str()) else {
			return Ok(());
		};
		if command_name.contains(".uno:CharFontName") || command_name.contains(".uno:StyleApply") {
			self.tile_cache.save_sidecar(SidecarSlot::CommandValues(command_name.to_string()), message)?;
		}
		Ok(())
	}

	/// `saveas: url=<jail-local>` snoop hook: rewrite the jail-local URL to
	/// its public form and deliver it to whichever client is waiting.
	pub fn complete_save_as(&self, requester: SessionId, jail_local_url: &str) {
		let public = self.rewrite_to_public_url(jail_local_url);
		if let Err(err) = self.save_as.complete(requester, SaveAsResult { url: public }) {
			log::warn!("{err:#}");
		}
	}

	fn rewrite_to_public_url(&self, jail_local_url: &str) -> String {
		match self.jailed_path() {
			Some(jailed) if jail_local_url.starts_with(&*jailed.to_string_lossy()) => {
				let filename = jailed.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
				format!("{}/{}", self.public_url.trim_end_matches('/'), filename)
			}
			_ => jail_local_url.to_string(),
		}
	}

	/// Whether an autosave should fire `now`: either the document has been
	/// idle long enough since its last activity, with activity newer than
	/// the last save (rule a); or it simply hasn't been saved in a long
	/// time regardless of idle time (rule b); or `force` is set and the
	/// document is modified (shutdown's forced-save path).
	#[must_use]
	pub fn autosave_due(&self, now: Instant, idle_threshold: Duration, autosave_duration: Duration, force: bool) -> bool {
		if !self.is_modified() {
			return false;
		}
		let last_activity = *self.last_activity.lock();
		let last_save = *self.last_save.lock();
		let inactivity = now.saturating_duration_since(last_activity);
		let since_last_save = now.saturating_duration_since(last_save);
		let idle_and_active_since_save = inactivity >= idle_threshold && inactivity < since_last_save;
		let overdue = since_last_save >= autosave_duration;
		idle_and_active_since_save || overdue || force
	}

	/// Run the autosave decision and, if due, perform the save.
	/// Returns whether a save was actually attempted.
	pub async fn autosave(&self, idle_threshold: Duration, autosave_duration: Duration, force: bool) -> Result<bool> {
		if !self.autosave_due(Instant::now(), idle_threshold, autosave_duration, force) {
			return Ok(false);
		}
		self.save().await?;
		Ok(true)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use coedit_storage::LocalStorage;

	fn broker(dir: &std::path::Path) -> DocumentBroker {
		let doc_path = dir.join("doc.odt");
		std::fs::write(&doc_path, b"hello").unwrap();
		let storage = Arc::new(LocalStorage::new(doc_path.to_str().unwrap(), true).unwrap());
		DocumentBroker::new(
			DocKey::from_uri("localhost", "/doc.odt"),
			"https://example.com/doc.odt".to_string(),
			storage,
			&dir.join("cache"),
		)
	}

	const NO_LONG_THRESHOLD: Duration = Duration::from_secs(600);

	#[test]
	fn autosave_not_due_when_unmodified() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		assert!(!b.autosave_due(Instant::now(), Duration::from_secs(1), NO_LONG_THRESHOLD, false));
	}

	#[test]
	fn autosave_not_due_before_idle_threshold() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		b.mark_modified();
		assert!(!b.autosave_due(Instant::now(), Duration::from_secs(30), NO_LONG_THRESHOLD, false));
	}

	#[test]
	fn autosave_skips_already_saved_idle_document() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		b.mark_modified();
		// Simulate: last save happened after the last activity (nothing
		// new has happened since), just a long time ago.
		*b.last_save.lock() = Instant::now();
		*b.last_activity.lock() = Instant::now() - Duration::from_secs(60);
		assert!(!b.autosave_due(Instant::now(), Duration::from_secs(5), NO_LONG_THRESHOLD, false));
	}

	#[test]
	fn autosave_fires_when_activity_is_newer_than_last_save() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		b.mark_modified();
		*b.last_save.lock() = Instant::now() - Duration::from_secs(120);
		*b.last_activity.lock() = Instant::now() - Duration::from_secs(10);
		assert!(b.autosave_due(Instant::now(), Duration::from_secs(5), NO_LONG_THRESHOLD, false));
	}

	#[test]
	fn autosave_fires_once_overdue_regardless_of_idle_time() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		b.mark_modified();
		// Not idle (activity just now) and not newer than last save, but
		// the long autosave threshold alone must still fire it.
		*b.last_save.lock() = Instant::now() - Duration::from_secs(301);
		*b.last_activity.lock() = Instant::now() - Duration::from_secs(301);
		assert!(b.autosave_due(Instant::now(), Duration::from_secs(3600), Duration::from_secs(300), false));
	}

	#[test]
	fn autosave_forced_fires_on_a_modified_document_regardless_of_timers() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		b.mark_modified();
		assert!(b.autosave_due(Instant::now(), Duration::from_secs(3600), Duration::from_secs(3600), true));
	}

	#[test]
	fn autosave_forced_does_not_fire_on_an_unmodified_document() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		assert!(!b.autosave_due(Instant::now(), Duration::from_secs(0), Duration::from_secs(0), true));
	}

	#[test]
	fn session_bookkeeping_releases_edit_lock_on_removal() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		let s = SessionId::new(1);
		b.add_session(s);
		b.edit_lock().transfer_to(s);
		assert_eq!(b.session_count(), 1);
		b.remove_session(s);
		assert!(b.is_empty());
		assert_eq!(b.edit_lock().holder(), None);
	}

	#[tokio::test]
	async fn load_is_idempotent_and_records_jailed_path() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		let jailed = dir.path().join("jail").join("doc.odt");
		b.load(&jailed).await.unwrap();
		assert!(b.is_loaded());
		assert_eq!(b.jailed_path(), Some(jailed.clone()));

		std::fs::remove_file(&jailed).unwrap();
		b.load(&jailed).await.unwrap();
		assert!(!jailed.exists(), "second load() must be a no-op, not re-copy");
	}

	#[tokio::test]
	async fn save_without_loading_fails() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		assert!(b.save().await.is_err());
	}

	#[tokio::test]
	async fn save_after_load_clears_modified_flag() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		let jailed = dir.path().join("jail").join("doc.odt");
		b.load(&jailed).await.unwrap();
		b.mark_modified();
		std::fs::write(&jailed, b"edited").unwrap();
		assert!(b.save().await.unwrap());
		assert!(!b.is_modified());
	}

	#[test]
	fn handle_tile_request_reports_cache_misses_as_none() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		let id = TileId { part: 0, width: 256, height: 256, tile_pos_x: 0, tile_pos_y: 0, tile_width: 3840, tile_height: 3840 };
		assert!(b.handle_tile_request(id).unwrap().is_none());
		b.tile_cache().save_tile(id, Blob::from(vec![9])).unwrap();
		assert_eq!(b.handle_tile_request(id).unwrap().unwrap().into_vec(), vec![9]);
	}

	#[test]
	fn invalidate_from_wire_parses_empty_and_rect_forms() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		let id = TileId { part: 0, width: 256, height: 256, tile_pos_x: 0, tile_pos_y: 0, tile_width: 3840, tile_height: 3840 };
		b.tile_cache().save_tile(id, Blob::from(vec![1])).unwrap();
		b.invalidate_from_wire("invalidatetiles: EMPTY");
		assert!(b.tile_cache().get_tile(id).unwrap().is_none());

		b.tile_cache().save_tile(id, Blob::from(vec![1])).unwrap();
		b.invalidate_from_wire("invalidatetiles: 3840 3840 0 0");
		assert!(b.tile_cache().get_tile(id).unwrap().is_none());
	}

	#[test]
	fn invalidate_from_wire_ignores_malformed_messages() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		// Must not panic.
		b.invalidate_from_wire("invalidatetiles: bogus");
	}

	#[tokio::test]
	async fn save_as_rewrites_jail_local_url_to_public_form() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		let jailed = dir.path().join("jail").join("doc.odt");
		b.load(&jailed).await.unwrap();

		let session = SessionId::new(7);
		let rx = b.save_as_rendezvous().register(session);
		b.complete_save_as(session, &jailed.to_string_lossy());
		let result = rx.await.unwrap();
		assert_eq!(result.url, "https://example.com/doc.odt/doc.odt");
	}

	#[test]
	fn apply_state_changed_tracks_modified_status() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		b.apply_state_changed("statechanged: .uno:ModifiedStatus=true");
		assert!(b.is_modified());
		b.apply_state_changed("statechanged: .uno:ModifiedStatus=false");
		assert!(!b.is_modified());
	}

	#[test]
	fn command_values_are_cached_per_command_not_collapsed() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		b.record_command_values(r#"commandvalues: {"commandName":".uno:CharFontName","values":["Liberation Sans"]}"#).unwrap();
		b.record_command_values(r#"commandvalues: {"commandName":".uno:StyleApply","values":["Default"]}"#).unwrap();

		let font = b.tile_cache().get_sidecar(coedit_cache::SidecarSlot::CommandValues(".uno:CharFontName".to_string())).unwrap();
		let style = b.tile_cache().get_sidecar(coedit_cache::SidecarSlot::CommandValues(".uno:StyleApply".to_string())).unwrap();
		assert!(font.unwrap().contains("Liberation Sans"));
		assert!(style.unwrap().contains("Default"));
	}

	#[test]
	fn command_values_for_uncacheable_command_are_ignored() {
		let dir = tempfile::tempdir().unwrap();
		let b = broker(dir.path());
		b.record_command_values(r#"commandvalues: {"commandName":".uno:Something","values":[]}"#).unwrap();
		assert!(b.tile_cache().get_sidecar(coedit_cache::SidecarSlot::CommandValues(".uno:Something".to_string())).unwrap().is_none());
	}
}
