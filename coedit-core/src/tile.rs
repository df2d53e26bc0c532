//! Tile identity and invalidation addressing.

use std::fmt;

/// A document part (spreadsheet sheet, presentation slide, ...), or the
/// sentinel meaning "every part" used by invalidation and by `tilecombine`.
/// Modeled as an enum rather than carrying over the original's `part == -1`
/// sentinel integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Part {
	Any,
	Numbered(u32),
}

impl fmt::Display for Part {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Part::Any => f.write_str("-1"),
			Part::Numbered(n) => write!(f, "{n}"),
		}
	}
}

/// Identity of a single rendered tile. Deliberately excludes `editlock`:
/// that flag changes what a fresh render would look like (readonly
/// decorations) but is not part of the cache-key tuple, so two requests
/// differing only in `editlock` address the same cached tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
	pub part: u32,
	pub width: u32,
	pub height: u32,
	pub tile_pos_x: i64,
	pub tile_pos_y: i64,
	pub tile_width: i64,
	pub tile_height: i64,
}

impl TileId {
	/// `<part>_<width>x<height>.<tileposx>,<tileposy>.<tilewidth>x<tileheight>.png`
	#[must_use]
	pub fn cache_file_name(&self) -> String {
		format!(
			"{}_{}x{}.{},{}.{}x{}.png",
			self.part, self.width, self.height, self.tile_pos_x, self.tile_pos_y, self.tile_width, self.tile_height
		)
	}
}

/// A rectangle of document-coordinate space whose cached tiles must be
/// dropped, scoped to one part or [`Part::Any`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationRect {
	pub part: Part,
	pub x: i64,
	pub y: i64,
	pub width: i64,
	pub height: i64,
}

impl InvalidationRect {
	#[must_use]
	pub fn whole_part(part: Part) -> InvalidationRect {
		InvalidationRect {
			part,
			x: i64::MIN / 2,
			y: i64::MIN / 2,
			width: i64::MAX,
			height: i64::MAX,
		}
	}

	/// True if the rectangle described by `tile` overlaps this invalidation
	/// region and the parts match (or this region is [`Part::Any`]).
	#[must_use]
	pub fn intersects(&self, tile: &TileId) -> bool {
		let part_matches = match self.part {
			Part::Any => true,
			Part::Numbered(n) => n == tile.part,
		};
		if !part_matches {
			return false;
		}
		let tx0 = tile.tile_pos_x;
		let ty0 = tile.tile_pos_y;
		let tx1 = tx0.saturating_add(tile.tile_width);
		let ty1 = ty0.saturating_add(tile.tile_height);
		let rx0 = self.x;
		let ry0 = self.y;
		let rx1 = self.x.saturating_add(self.width);
		let ry1 = self.y.saturating_add(self.height);
		tx0 < rx1 && tx1 >= rx0 && ty0 < ry1 && ty1 >= ry0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tile(part: u32, x: i64, y: i64) -> TileId {
		TileId {
			part,
			width: 256,
			height: 256,
			tile_pos_x: x,
			tile_pos_y: y,
			tile_width: 3840,
			tile_height: 3840,
		}
	}

	#[test]
	fn cache_file_name_matches_grammar() {
		let t = tile(0, 0, 0);
		assert_eq!(t.cache_file_name(), "0_256x256.0,0.3840x3840.png");
	}

	#[test]
	fn any_part_matches_every_numbered_part() {
		let rect = InvalidationRect::whole_part(Part::Any);
		assert!(rect.intersects(&tile(0, 0, 0)));
		assert!(rect.intersects(&tile(7, 1_000_000, 1_000_000)));
	}

	#[test]
	fn numbered_part_excludes_other_parts() {
		let rect = InvalidationRect {
			part: Part::Numbered(1),
			x: 0,
			y: 0,
			width: 3840,
			height: 3840,
		};
		assert!(rect.intersects(&tile(1, 0, 0)));
		assert!(!rect.intersects(&tile(2, 0, 0)));
	}

	#[test]
	fn rectangle_touching_tile_edge_exactly_still_intersects() {
		// Tile spans x in [0, 3840); a rect starting exactly at the tile's
		// right edge (x=3840) still counts as a match, matching the
		// original invalidation sweep's mixed `</ >=` edge comparison.
		let rect = InvalidationRect {
			part: Part::Numbered(0),
			x: 3840,
			y: 0,
			width: 100,
			height: 100,
		};
		assert!(rect.intersects(&tile(0, 0, 0)));
	}

	#[test]
	fn disjoint_rectangle_does_not_intersect() {
		let rect = InvalidationRect {
			part: Part::Numbered(0),
			x: 10_000,
			y: 10_000,
			width: 100,
			height: 100,
		};
		assert!(!rect.intersects(&tile(0, 0, 0)));
	}
}
