//! SHA-1 digesting and the three-level directory fan-out used to keep a
//! single cache root from accumulating one subdirectory per document.

use sha1::{Digest, Sha1};
use std::path::PathBuf;

/// Lower-case hex SHA-1 digest of `input`.
#[must_use]
pub fn hex_digest(input: &str) -> String {
	let mut hasher = Sha1::new();
	hasher.update(input.as_bytes());
	let digest = hasher.finalize();
	digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// `<root>/<d[0..1]>/<d[1..2]>/<d[2..3]>/<d>` where `d` is the hex digest of
/// `key`. Each of the first three levels is a single hex character, not a
/// growing prefix — this matches the directory layout an existing on-disk
/// tile cache tree was built with.
#[must_use]
pub fn cache_dir_fanout(root: &std::path::Path, key: &str) -> PathBuf {
	let digest = hex_digest(key);
	root
		.join(&digest[0..1])
		.join(&digest[1..2])
		.join(&digest[2..3])
		.join(&digest)
}
