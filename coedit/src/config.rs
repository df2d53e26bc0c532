//! YAML-first server configuration: every section optional, every field
//! independently defaultable, relative paths resolved against the config
//! file's own directory.
//!
//! ## Example
//! ```yaml
//! server:
//!   ip: 0.0.0.0
//!   port: 9980
//!
//! cors:
//!   allowed_origins: ["https://example.org"]
//!   max_age_seconds: 86400
//!
//! jail:
//!   child_root_path: ./jails
//!   sys_template_path: ./systemplate
//!   lo_template_path: ./lotemplate
//!   lo_jail_subpath: lo
//!
//! storage:
//!   filesystem_allowed: false
//!
//! admin:
//!   username: admin
//!   password: secret
//!
//! autosave:
//!   idle_threshold_secs: 30
//!   autosave_duration_secs: 300
//!
//! worker_pool:
//!   num_prespawn_children: 4
//!
//! tile_cache_path: ./cache
//! ```

use anyhow::Result;
use coedit_derive::context;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
	pub ip: Option<String>,
	pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Cors {
	#[serde(default)]
	pub allowed_origins: Vec<String>,
	pub max_age_seconds: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JailConfig {
	pub child_root_path: Option<PathBuf>,
	pub sys_template_path: Option<PathBuf>,
	pub lo_template_path: Option<PathBuf>,
	pub lo_jail_subpath: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
	/// Whether documents may be opened straight from the local filesystem
	/// rather than through a remote hosting endpoint. Defaults to `false`.
	pub filesystem_allowed: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AdminConfig {
	pub username: Option<String>,
	pub password: Option<String>,
	/// Sliding-window sample counts for the `mem_stats`/`cpu_stats` admin
	/// commands. Defaults match `AdminModel::new`.
	pub mem_stats_size: Option<usize>,
	pub cpu_stats_size: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AutosaveConfig {
	pub idle_threshold_secs: Option<u64>,
	/// The long "always save eventually" threshold: a document is saved
	/// once this much time has passed since its last save, regardless of
	/// idle time.
	pub autosave_duration_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WorkerPoolConfig {
	pub num_prespawn_children: Option<u32>,
	/// Path to the forker's named control pipe. Defaults to
	/// `/tmp/coedit-forker.sock`.
	pub forker_pipe_path: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
	#[serde(default)]
	pub server: ServerConfig,
	#[serde(default)]
	pub cors: Cors,
	#[serde(default)]
	pub jail: JailConfig,
	#[serde(default)]
	pub storage: StorageConfig,
	#[serde(default)]
	pub admin: AdminConfig,
	#[serde(default)]
	pub autosave: AutosaveConfig,
	#[serde(default)]
	pub worker_pool: WorkerPoolConfig,
	pub tile_cache_path: Option<PathBuf>,
}

impl Config {
	#[context("parsing config from reader (YAML)")]
	pub fn from_reader<R: Read>(reader: R) -> Result<Config> {
		Ok(serde_yaml_ng::from_reader(reader)?)
	}

	#[context("parsing config from string (YAML)")]
	pub fn from_string(text: &str) -> Result<Config> {
		Ok(serde_yaml_ng::from_str(text)?)
	}

	#[context("reading config file '{}'", path.display())]
	pub fn from_path(path: &Path) -> Result<Config> {
		let file = File::open(path)?;
		let mut cfg = Config::from_reader(BufReader::new(file))?;
		let base = path.parent().unwrap_or_else(|| Path::new("."));
		cfg.resolve_paths(base);
		Ok(cfg)
	}

	/// Resolve every relative path field against `base` (the config file's
	/// own directory). Absolute paths are left untouched.
	pub fn resolve_paths(&mut self, base: &Path) {
		for path in [
			&mut self.jail.child_root_path,
			&mut self.jail.sys_template_path,
			&mut self.jail.lo_template_path,
			&mut self.tile_cache_path,
		] {
			if let Some(p) = path {
				if p.is_relative() {
					*p = base.join(&p);
				}
			}
		}
	}

	#[must_use]
	pub fn idle_threshold(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.autosave.idle_threshold_secs.unwrap_or(30))
	}

	#[must_use]
	pub fn autosave_duration(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.autosave.autosave_duration_secs.unwrap_or(300))
	}

	#[must_use]
	pub fn num_prespawn_children(&self) -> u32 {
		self.worker_pool.num_prespawn_children.unwrap_or(4)
	}

	#[must_use]
	pub fn forker_pipe_path(&self) -> PathBuf {
		self.worker_pool.forker_pipe_path.clone().unwrap_or_else(|| PathBuf::from("/tmp/coedit-forker.sock"))
	}

	#[must_use]
	pub fn mem_stats_size(&self) -> usize {
		self.admin.mem_stats_size.unwrap_or(20)
	}

	#[must_use]
	pub fn cpu_stats_size(&self) -> usize {
		self.admin.cpu_stats_size.unwrap_or(20)
	}

	#[must_use]
	pub fn allowed_origins(&self) -> &[String] {
		&self.cors.allowed_origins
	}

	#[must_use]
	pub fn cors_max_age_seconds(&self) -> u64 {
		self.cors.max_age_seconds.unwrap_or(3600)
	}

	#[must_use]
	pub fn bind_addr(&self) -> String {
		format!("{}:{}", self.server.ip.as_deref().unwrap_or("0.0.0.0"), self.server.port.unwrap_or(9980))
	}
}
