//! Server-wide shared state: the broker map, the worker pool, and the
//! session-id counter, all behind one cheap-to-clone handle.

use crate::admin::AdminModel;
use crate::broker::DocumentBroker;
use coedit_core::{DocKey, SessionId};
use coedit_worker::WorkerPool;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

struct ServerInner {
	brokers: DashMap<DocKey, Arc<DocumentBroker>>,
	worker_pool: WorkerPool,
	admin: AdminModel,
	next_session_id: AtomicU64,
}

#[derive(Clone)]
pub struct Server {
	inner: Arc<ServerInner>,
}

impl Server {
	#[must_use]
	pub fn new(worker_pool: WorkerPool) -> Server {
		Server::with_admin(worker_pool, AdminModel::new())
	}

	#[must_use]
	pub fn with_admin(worker_pool: WorkerPool, admin: AdminModel) -> Server {
		Server {
			inner: Arc::new(ServerInner {
				brokers: DashMap::new(),
				worker_pool,
				admin,
				next_session_id: AtomicU64::new(1),
			}),
		}
	}

	#[must_use]
	pub fn worker_pool(&self) -> &WorkerPool {
		&self.inner.worker_pool
	}

	#[must_use]
	pub fn admin(&self) -> &AdminModel {
		&self.inner.admin
	}

	#[must_use]
	pub fn next_session_id(&self) -> SessionId {
		SessionId::new(self.inner.next_session_id.fetch_add(1, Ordering::SeqCst))
	}

	/// Returns the broker for `key`, creating it via `make` if this is the
	/// first session to open that document.
	pub fn get_or_create_broker(&self, key: DocKey, make: impl FnOnce() -> Arc<DocumentBroker>) -> Arc<DocumentBroker> {
		self.inner.brokers.entry(key).or_insert_with(make).clone()
	}

	#[must_use]
	pub fn get_broker(&self, key: &DocKey) -> Option<Arc<DocumentBroker>> {
		self.inner.brokers.get(key).map(|e| e.clone())
	}

	/// Drop a broker once its last session has departed.
	pub fn remove_broker_if_empty(&self, key: &DocKey) {
		let should_remove = self.inner.brokers.get(key).map(|b| b.is_empty()).unwrap_or(false);
		if should_remove {
			self.inner.brokers.remove(key);
			log::info!("document broker for '{key}' closed: no sessions remain");
		}
	}

	#[must_use]
	pub fn active_docs_count(&self) -> usize {
		self.inner.brokers.len()
	}

	#[must_use]
	pub fn active_users_count(&self) -> usize {
		self.inner.brokers.iter().map(|e| e.session_count()).sum()
	}

	pub fn for_each_broker(&self, mut f: impl FnMut(&DocumentBroker)) {
		for entry in &self.inner.brokers {
			f(entry.value());
		}
	}

	/// Snapshot of every currently open broker, for callers (the autosave
	/// sampler, shutdown's forced-save sweep) that need to `.await` per
	/// broker and so can't use [`Self::for_each_broker`]'s synchronous closure.
	#[must_use]
	pub fn brokers(&self) -> Vec<Arc<DocumentBroker>> {
		self.inner.brokers.iter().map(|e| e.value().clone()).collect()
	}
}
