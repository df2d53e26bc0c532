//! Per-document tile cache: rendered tile PNGs plus the handful of sidecar
//! slots a worker repeats verbatim on every load (status, the last
//! `unocommandresult`, `renderfont` replies, `styles`, and
//! `partpagerectangles`), all rooted at one content-addressed directory.

use crate::disk::OnDiskCache;
use crate::traits::Cache;
use anyhow::{Result, bail};
use coedit_core::{Blob, InvalidationRect, Part, TileId, cache_dir_fanout};
use parking_lot::Mutex;
use std::fs::read_dir;
use std::path::PathBuf;
use std::time::SystemTime;

/// The fixed sidecar slots a document broker replays to every newly joined
/// session without re-asking the worker. `CommandValues` is keyed per
/// `.uno:` command name so that, e.g., a cached `.uno:StyleApply` reply
/// never shadows a cached `.uno:CharFontName` one — each command gets its
/// own `cmdValues<cmd>.txt` file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SidecarSlot {
	Status,
	UnoCommandResult,
	RenderFont,
	CommandValues(String),
	PartPageRectangles,
}

impl SidecarSlot {
	fn cache_key(&self) -> String {
		match self {
			SidecarSlot::Status => "status".to_string(),
			SidecarSlot::UnoCommandResult => "unocommandresult".to_string(),
			SidecarSlot::RenderFont => "renderfont".to_string(),
			SidecarSlot::CommandValues(cmd) => format!("cmdValues{cmd}"),
			SidecarSlot::PartPageRectangles => "partpagerectangles".to_string(),
		}
	}
}

pub struct TileCache {
	root: PathBuf,
	tiles: OnDiskCache<String, Vec<u8>>,
	sidecars: OnDiskCache<String, String>,
	last_modified: Mutex<Option<SystemTime>>,
}

impl TileCache {
	#[must_use]
	pub fn new(cache_root: &std::path::Path, doc_key: &str) -> TileCache {
		let root = cache_dir_fanout(cache_root, doc_key);
		TileCache {
			tiles: OnDiskCache::new(root.join("tiles")),
			sidecars: OnDiskCache::new(root.join("sidecar")),
			last_modified: Mutex::new(None),
			root,
		}
	}

	#[must_use]
	pub fn root(&self) -> &std::path::Path {
		&self.root
	}

	pub fn get_tile(&self, id: TileId) -> Result<Option<Blob>> {
		let values = self.tiles.get_clone(&id.cache_file_name())?;
		Ok(values.and_then(|mut v| v.pop()).map(Blob::from))
	}

	pub fn save_tile(&self, id: TileId, data: Blob) -> Result<()> {
		self.tiles.insert(&id.cache_file_name(), vec![data.into_vec()])
	}

	/// `status:` is a parse precondition, not a feature: reject anything
	/// that doesn't start with the token callers are required to supply.
	pub fn save_status(&self, message: &str) -> Result<()> {
		if !message.starts_with("status:") {
			bail!("save_status: message must start with 'status:', got '{message}'");
		}
		self.sidecars.insert(&SidecarSlot::Status.cache_key().to_string(), vec![message.to_string()])
	}

	pub fn save_sidecar(&self, slot: SidecarSlot, message: &str) -> Result<()> {
		self
			.sidecars
			.insert(&slot.cache_key().to_string(), vec![message.to_string()])
	}

	pub fn get_sidecar(&self, slot: SidecarSlot) -> Result<Option<String>> {
		let values = self.sidecars.get_clone(&slot.cache_key().to_string())?;
		Ok(values.and_then(|mut v| v.pop()))
	}

	/// Drop every cached tile whose rectangle intersects `rect`, returning
	/// the number removed.
	pub fn invalidate_tiles(&self, rect: InvalidationRect) -> Result<usize> {
		let mut removed = 0;
		if !self.tiles.root().exists() {
			return Ok(0);
		}
		for entry in read_dir(self.tiles.root())? {
			let entry = entry?;
			let name = entry.file_name();
			let Some(name) = name.to_str() else { continue };
			let Some(id) = parse_tile_filename(name) else { continue };
			if rect.intersects(&id) {
				self.tiles.remove(&id.cache_file_name())?;
				removed += 1;
			}
		}
		Ok(removed)
	}

	/// Drop every cached tile, for the `invalidatetiles: EMPTY` ALL case.
	pub fn invalidate_all(&self) -> Result<usize> {
		self.invalidate_tiles(InvalidationRect::whole_part(Part::Any))
	}

	/// Record that the document was just saved at `modified_at`, so the next
	/// `ensure_fresh` call against storage's freshly bumped modification
	/// time does not mistake our own save for an external change and purge
	/// tiles that are still valid.
	pub fn document_saved(&self, modified_at: SystemTime) {
		*self.last_modified.lock() = Some(modified_at);
	}

	/// Compare the document's current modification time against the one
	/// this cache was last built for; if they differ, purge everything and
	/// remember the new time. Returns `true` if the cache was purged.
	pub fn ensure_fresh(&self, modified_at: SystemTime) -> Result<bool> {
		let mut guard = self.last_modified.lock();
		let stale = match *guard {
			Some(previous) => previous != modified_at,
			None => false,
		};
		if stale {
			self.tiles.clean_up();
			self.sidecars.clean_up();
			log::info!("tile cache at {:?} purged: document modification time changed", self.root);
		}
		*guard = Some(modified_at);
		Ok(stale)
	}
}

fn parse_tile_filename(name: &str) -> Option<TileId> {
	let name = name.strip_suffix(".png")?;
	let (head, rest) = name.split_once('_')?;
	let part: u32 = head.parse().ok()?;
	let (size, rest) = rest.split_once('.')?;
	let (width, height) = size.split_once('x')?;
	let (pos, size2) = rest.split_once('.')?;
	let (tile_pos_x, tile_pos_y) = pos.split_once(',')?;
	let (tile_width, tile_height) = size2.split_once('x')?;
	Some(TileId {
		part,
		width: width.parse().ok()?,
		height: height.parse().ok()?,
		tile_pos_x: tile_pos_x.parse().ok()?,
		tile_pos_y: tile_pos_y.parse().ok()?,
		tile_width: tile_width.parse().ok()?,
		tile_height: tile_height.parse().ok()?,
	})
}
