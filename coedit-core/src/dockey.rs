//! The document key a [`Server`](../coedit_broker) uses to find (or create)
//! the broker responsible for a given URI.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::fmt;

const KEY_ENCODE_SET: &AsciiSet = &CONTROLS.add(b' ').add(b'%').add(b'#').add(b'?');

/// Case-preserving key built from `host + decoded-path`, re-encoded. Includes
/// the host deliberately: two different hosts serving an identical path must
/// never be treated as the same document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocKey(String);

impl DocKey {
	#[must_use]
	pub fn from_uri(host: &str, path: &str) -> DocKey {
		let decoded = percent_decode_str(path).decode_utf8_lossy();
		let re_encoded = utf8_percent_encode(&decoded, KEY_ENCODE_SET).to_string();
		DocKey(format!("{host}{re_encoded}"))
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for DocKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for DocKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn case_is_preserved() {
		let key = DocKey::from_uri("example.com", "/Docs/Report.odt");
		assert_eq!(key.as_str(), "example.com/Docs/Report.odt");
	}

	#[test]
	fn different_hosts_never_coalesce() {
		let a = DocKey::from_uri("a.example.com", "/doc.odt");
		let b = DocKey::from_uri("b.example.com", "/doc.odt");
		assert_ne!(a, b);
	}

	#[test]
	fn percent_encoded_path_round_trips_through_decode_reencode() {
		let key = DocKey::from_uri("example.com", "/a%20b.odt");
		assert_eq!(key.as_str(), "example.com/a%20b.odt");
	}
}
