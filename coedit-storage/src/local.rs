//! Trivial "storage" for documents that already live on the filesystem the
//! server itself can see. Gated behind an explicit opt-in flag, since giving
//! every requested URI direct filesystem access would let a client read any
//! file the server process can.

use crate::backend::{FileInfo, StorageBackend};
use anyhow::{Result, bail};
use async_trait::async_trait;
use coedit_derive::context;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct LocalStorage {
	uri: String,
	source_path: PathBuf,
	/// Set once `load_to_local` falls back to copying because the hard
	/// link could not be made; `save_from_local` only copies back when
	/// this is set, since a hard-linked jail path already shares the
	/// source's inode and writes through on its own.
	is_copy: AtomicBool,
}

impl LocalStorage {
	/// `filesystem_allowed` mirrors the original's `_filesystemEnabled`
	/// static flag: local-file storage only exists if the operator turned
	/// it on in configuration.
	pub fn new(uri: &str, filesystem_allowed: bool) -> Result<LocalStorage> {
		if !filesystem_allowed {
			bail!("local filesystem storage is disabled by configuration");
		}
		let source_path = PathBuf::from(uri);
		Ok(LocalStorage {
			uri: uri.to_string(),
			source_path,
			is_copy: AtomicBool::new(false),
		})
	}
}

#[async_trait]
impl StorageBackend for LocalStorage {
	fn uri(&self) -> &str {
		&self.uri
	}

	#[context("reading file info for local document '{}'", self.uri)]
	async fn get_file_info(&self) -> Result<FileInfo> {
		let metadata = tokio::fs::metadata(&self.source_path).await?;
		let filename = self
			.source_path
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_default();
		Ok(FileInfo {
			filename,
			modified_time: metadata.modified()?,
			size: metadata.len(),
			user_id: String::new(),
			user_name: String::new(),
		})
	}

	/// Try a hard link into the jail first; only copy the bytes if that
	/// fails (e.g. crossing a filesystem boundary).
	#[context("loading local document '{}' for editing", self.uri)]
	async fn load_to_local(&self, local_path: &Path) -> Result<PathBuf> {
		let source = self.source_path.clone();
		let dest = local_path.to_path_buf();
		let linked = tokio::task::spawn_blocking(move || std::fs::hard_link(&source, &dest).is_ok()).await?;
		if linked {
			self.is_copy.store(false, Ordering::SeqCst);
		} else {
			tokio::fs::copy(&self.source_path, local_path).await?;
			self.is_copy.store(true, Ordering::SeqCst);
		}
		Ok(local_path.to_path_buf())
	}

	/// Copy the jailed file back to the source only if `load_to_local` had
	/// to fall back to copying; a hard-linked jail path already shares the
	/// source's inode, so there's nothing left to copy back.
	#[context("saving local document '{}' back to source", self.uri)]
	async fn save_from_local(&self, local_path: &Path) -> Result<bool> {
		if self.is_copy.load(Ordering::SeqCst) {
			tokio::fs::copy(local_path, &self.source_path).await?;
		}
		Ok(true)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn disabled_by_default() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("doc.odt");
		tokio::fs::write(&path, b"content").await.unwrap();
		assert!(LocalStorage::new(path.to_str().unwrap(), false).is_err());
	}

	#[tokio::test]
	async fn load_and_save_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let source = dir.path().join("doc.odt");
		tokio::fs::write(&source, b"hello world").await.unwrap();

		let storage = LocalStorage::new(source.to_str().unwrap(), true).unwrap();
		let info = storage.get_file_info().await.unwrap();
		assert_eq!(info.size, 11);
		assert!(info.is_valid());

		let jailed = dir.path().join("jailed.odt");
		storage.load_to_local(&jailed).await.unwrap();
		assert_eq!(tokio::fs::read(&jailed).await.unwrap(), b"hello world");

		tokio::fs::write(&jailed, b"edited").await.unwrap();
		let saved = storage.save_from_local(&jailed).await.unwrap();
		assert!(saved);
		assert_eq!(tokio::fs::read(&source).await.unwrap(), b"edited");
	}

	#[tokio::test]
	#[cfg(unix)]
	async fn load_to_local_hard_links_within_the_same_filesystem() {
		use std::os::unix::fs::MetadataExt;

		let dir = tempfile::tempdir().unwrap();
		let source = dir.path().join("doc.odt");
		tokio::fs::write(&source, b"hello world").await.unwrap();

		let storage = LocalStorage::new(source.to_str().unwrap(), true).unwrap();
		let jailed = dir.path().join("jailed.odt");
		storage.load_to_local(&jailed).await.unwrap();

		let source_ino = tokio::fs::metadata(&source).await.unwrap().ino();
		let jailed_ino = tokio::fs::metadata(&jailed).await.unwrap().ino();
		assert_eq!(source_ino, jailed_ino, "same-filesystem load should hard-link, not copy");
		assert!(!storage.is_copy.load(Ordering::SeqCst));
	}
}
