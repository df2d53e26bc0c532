//! [`Blob`], a thin wrapper around `Vec<u8>` used everywhere a tile, a
//! sidecar file's contents, or a wire payload is passed around without
//! caring which of those it is.

use std::fmt::Debug;
use std::ops::Range;

#[derive(Clone, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
	#[must_use]
	pub fn new_empty() -> Blob {
		Blob(Vec::new())
	}

	#[must_use]
	pub fn range(&self, range: Range<usize>) -> &[u8] {
		&self.0[range]
	}

	#[must_use]
	pub fn as_slice(&self) -> &[u8] {
		&self.0
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		std::str::from_utf8(&self.0).unwrap_or_default()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	#[must_use]
	pub fn into_vec(self) -> Vec<u8> {
		self.0
	}
}

impl Debug for Blob {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Blob({} bytes)", self.0.len())
	}
}

impl From<Vec<u8>> for Blob {
	fn from(v: Vec<u8>) -> Self {
		Blob(v)
	}
}

impl From<&[u8]> for Blob {
	fn from(v: &[u8]) -> Self {
		Blob(v.to_vec())
	}
}

impl From<&str> for Blob {
	fn from(v: &str) -> Self {
		Blob(v.as_bytes().to_vec())
	}
}

impl From<String> for Blob {
	fn from(v: String) -> Self {
		Blob(v.into_bytes())
	}
}

impl From<&String> for Blob {
	fn from(v: &String) -> Self {
		Blob(v.as_bytes().to_vec())
	}
}
