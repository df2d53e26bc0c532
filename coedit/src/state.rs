//! Process-wide shared handle threaded through every axum extractor: the
//! broker/worker-pool/admin-model server plus the resolved configuration.

use crate::config::Config;
use coedit_broker::Server;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
	pub server: Server,
	pub config: Arc<Config>,
}

impl AppState {
	#[must_use]
	pub fn new(server: Server, config: Config) -> AppState {
		AppState { server, config: Arc::new(config) }
	}

	#[must_use]
	pub fn tile_cache_root(&self) -> std::path::PathBuf {
		self.config.tile_cache_path.clone().unwrap_or_else(|| std::path::PathBuf::from("./cache"))
	}

	#[must_use]
	pub fn filesystem_allowed(&self) -> bool {
		self.config.storage.filesystem_allowed.unwrap_or(false)
	}

	#[must_use]
	pub fn jail_root(&self) -> std::path::PathBuf {
		self.config.jail.child_root_path.clone().unwrap_or_else(|| std::path::PathBuf::from("./jails"))
	}
}
