//! A minimal WebDAV-backed `StorageBackend`: `HEAD` for file info, `GET` to
//! load, `PUT` to save, authenticated via a pluggable [`AuthAgent`]. This is
//! not a full WebDAV client (no `PROPFIND`, no locking) — the same level of
//! completeness the WOPI client gives its four invoked operations.

use crate::auth::AuthAgent;
use crate::backend::{FileInfo, StorageBackend};
use anyhow::{Result, bail};
use async_trait::async_trait;
use coedit_derive::context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

#[derive(Debug)]
pub struct WebDavStorage {
	uri: String,
	auth: Arc<dyn AuthAgent>,
	client: reqwest::Client,
}

impl WebDavStorage {
	#[must_use]
	pub fn new(uri: &str, auth: Arc<dyn AuthAgent>) -> WebDavStorage {
		WebDavStorage {
			uri: uri.to_string(),
			auth,
			client: reqwest::Client::new(),
		}
	}
}

#[async_trait]
impl StorageBackend for WebDavStorage {
	fn uri(&self) -> &str {
		&self.uri
	}

	#[context("requesting file info for WebDAV document '{}'", self.uri)]
	async fn get_file_info(&self) -> Result<FileInfo> {
		let response = self.auth.apply(self.client.head(&self.uri)).send().await?.error_for_status()?;
		let headers = response.headers();
		let size = headers
			.get(reqwest::header::CONTENT_LENGTH)
			.and_then(|v| v.to_str().ok())
			.and_then(|v| v.parse::<u64>().ok())
			.unwrap_or(0);
		let filename = self
			.uri
			.rsplit('/')
			.next()
			.filter(|s| !s.is_empty())
			.unwrap_or("document")
			.to_string();
		Ok(FileInfo {
			filename,
			modified_time: UNIX_EPOCH + Duration::ZERO,
			size,
			user_id: String::new(),
			user_name: String::new(),
		})
	}

	#[context("fetching WebDAV document contents for '{}'", self.uri)]
	async fn load_to_local(&self, local_path: &Path) -> Result<PathBuf> {
		let response = self.auth.apply(self.client.get(&self.uri)).send().await?.error_for_status()?;
		let bytes = response.bytes().await?;
		tokio::fs::write(local_path, &bytes).await?;
		Ok(local_path.to_path_buf())
	}

	#[context("saving WebDAV document contents for '{}'", self.uri)]
	async fn save_from_local(&self, local_path: &Path) -> Result<bool> {
		let bytes = tokio::fs::read(local_path).await?;
		let status = self
			.auth
			.apply(self.client.put(&self.uri))
			.body(bytes)
			.send()
			.await?
			.status();
		if !status.is_success() {
			bail!("WebDAV PUT to '{}' failed with status {status}", self.uri);
		}
		Ok(true)
	}
}
