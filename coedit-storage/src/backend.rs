//! The `StorageBackend` trait every concrete storage variant implements, and
//! the `FileInfo` it returns.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
	pub filename: String,
	pub modified_time: SystemTime,
	pub size: u64,
	pub user_id: String,
	pub user_name: String,
}

impl FileInfo {
	#[must_use]
	pub fn is_valid(&self) -> bool {
		!self.filename.is_empty() && self.size > 0
	}
}

/// One document's connection to wherever its bytes actually live.
#[async_trait]
pub trait StorageBackend: Debug + Send + Sync {
	fn uri(&self) -> &str;

	async fn get_file_info(&self) -> Result<FileInfo>;

	/// Copy (or otherwise materialize) the remote document at `local_path`,
	/// returning the path actually written.
	async fn load_to_local(&self, local_path: &Path) -> Result<PathBuf>;

	/// Write `local_path`'s contents back to the remote source. Returns
	/// `true` if the save actually happened (a false return, not an error,
	/// signals "nothing to do" for backends that can detect no changes).
	async fn save_from_local(&self, local_path: &Path) -> Result<bool>;
}
