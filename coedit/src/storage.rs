//! Picks a `StorageBackend` variant for a document URL: `file://` and bare
//! filesystem paths use `LocalStorage` (gated by the
//! `storage.filesystem_allowed` config flag); `http(s)://` URLs are treated
//! as WOPI hosts, using the `access_token` query parameter the WOPI
//! discovery flow attaches to every document URL. WebDAV is selected
//! explicitly by callers that already hold credentials, since it is not
//! distinguishable from a WOPI host by URL shape alone.

use anyhow::Result;
use coedit_storage::{LocalStorage, StorageBackend, WopiStorage};
use std::sync::Arc;

#[must_use]
pub fn access_token_from_url(url: &str) -> Option<String> {
	let query = url.split_once('?')?.1;
	query.split('&').find_map(|pair| pair.strip_prefix("access_token=")).map(str::to_string)
}

pub fn build_storage(url: &str, filesystem_allowed: bool) -> Result<Arc<dyn StorageBackend>> {
	if let Some(path) = url.strip_prefix("file://") {
		return Ok(Arc::new(LocalStorage::new(path, filesystem_allowed)?));
	}
	if url.starts_with("http://") || url.starts_with("https://") {
		let token = access_token_from_url(url).unwrap_or_default();
		let base = url.split_once('?').map_or(url, |(base, _)| base);
		return Ok(Arc::new(WopiStorage::new(base, &token)));
	}
	Ok(Arc::new(LocalStorage::new(url, filesystem_allowed)?))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_access_token_from_query() {
		assert_eq!(
			access_token_from_url("https://host/wopi/files/42?access_token=abc123"),
			Some("abc123".to_string())
		);
		assert_eq!(access_token_from_url("https://host/wopi/files/42"), None);
	}

	#[test]
	fn file_scheme_strips_prefix() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("doc.odt");
		std::fs::write(&path, b"x").unwrap();
		let storage = build_storage(&format!("file://{}", path.display()), true).unwrap();
		assert_eq!(storage.uri(), path.to_str().unwrap());
	}

	#[test]
	fn https_scheme_builds_wopi_storage() {
		let storage = build_storage("https://host/wopi/files/42?access_token=tok", true).unwrap();
		assert_eq!(storage.uri(), "https://host/wopi/files/42");
	}

	#[test]
	fn bare_path_requires_filesystem_opt_in() {
		assert!(build_storage("/tmp/doc.odt", false).is_err());
	}
}
