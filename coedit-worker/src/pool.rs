//! Pre-spawn/acquire/replenish worker pool.
//!
//! Workers are spawned ahead of demand so that opening a document doesn't
//! pay fork/exec/sandbox-setup latency on the client's clock. Idle workers
//! are handed out LIFO: the most recently spawned worker still has warm
//! pages from process startup, so preferring it over an idle worker that's
//! been sitting around keeps the working set smaller.

use crate::forker::ForkerHandle;
use anyhow::{Result, bail};
use coedit_core::SessionId;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// A live sandboxed worker process, not yet assigned to any document.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
	id: u32,
	pid: u32,
}

impl WorkerHandle {
	#[must_use]
	pub fn new(id: u32, pid: u32) -> WorkerHandle {
		WorkerHandle { id, pid }
	}

	#[must_use]
	pub fn id(&self) -> u32 {
		self.id
	}

	#[must_use]
	pub fn pid(&self) -> u32 {
		self.pid
	}
}

struct Inner {
	forker: Arc<dyn ForkerHandle>,
	target: u32,
	idle: Mutex<Vec<WorkerHandle>>,
	pending_spawns: AtomicU32,
	notify: Notify,
}

#[derive(Clone)]
pub struct WorkerPool {
	inner: Arc<Inner>,
}

impl WorkerPool {
	#[must_use]
	pub fn new(forker: Arc<dyn ForkerHandle>, target: u32) -> WorkerPool {
		WorkerPool {
			inner: Arc::new(Inner {
				forker,
				target,
				idle: Mutex::new(Vec::new()),
				pending_spawns: AtomicU32::new(0),
				notify: Notify::new(),
			}),
		}
	}

	/// Bring the idle pool up to its pre-spawn target, accounting for
	/// workers already idle or already requested.
	pub fn top_up(&self) -> Result<()> {
		let idle = self.inner.idle.lock().len() as u32;
		let pending = self.inner.pending_spawns.load(Ordering::SeqCst);
		let deficit = self.inner.target.saturating_sub(idle + pending);
		if deficit > 0 {
			self.inner.forker.request_spawn(deficit)?;
			self.inner.pending_spawns.fetch_add(deficit, Ordering::SeqCst);
		}
		Ok(())
	}

	/// Called when the forker reports a new worker process is ready.
	pub fn worker_ready(&self, handle: WorkerHandle) {
		self.inner.pending_spawns.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |p| Some(p.saturating_sub(1))).ok();
		self.inner.idle.lock().push(handle);
		self.inner.notify.notify_one();
	}

	/// Pop the most recently added idle worker, waiting up to `timeout` for
	/// one to become available if the pool is currently empty.
	pub async fn acquire(&self, timeout: Duration) -> Result<WorkerHandle> {
		if let Some(handle) = self.inner.idle.lock().pop() {
			self.top_up()?;
			return Ok(handle);
		}
		self.request_spawn_for_acquire()?;
		let wait = self.inner.notify.notified();
		tokio::select! {
			() = wait => {}
			() = tokio::time::sleep(timeout) => {
				bail!("timed out after {:?} waiting for an idle worker process", timeout);
			}
		}
		let handle = self
			.inner
			.idle
			.lock()
			.pop()
			.ok_or_else(|| anyhow::anyhow!("worker pool woke up with no idle worker available"))?;
		self.top_up()?;
		Ok(handle)
	}

	/// Called by `acquire()` when the idle list is empty: compute the
	/// deficit against the pre-spawn target and request one extra worker on
	/// top of it, since this request must also satisfy the acquire call
	/// that's about to wait, not just bring the idle pool back to target.
	fn request_spawn_for_acquire(&self) -> Result<()> {
		let idle = self.inner.idle.lock().len() as u32;
		let deficit = self.inner.target.saturating_sub(idle);
		let to_request = deficit + 1;
		self.inner.forker.request_spawn(to_request)?;
		self.inner.pending_spawns.fetch_add(to_request, Ordering::SeqCst);
		Ok(())
	}

	/// A worker assigned to `session` has died (or the document using it
	/// was closed); request a replacement so the idle pool recovers to
	/// target size.
	pub fn worker_died(&self, session: SessionId) -> Result<()> {
		log::warn!("worker serving session {session} died; requesting replacement");
		self.top_up()
	}

	#[must_use]
	pub fn idle_count(&self) -> usize {
		self.inner.idle.lock().len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::forker::test_support::FakeForker;

	#[tokio::test]
	async fn top_up_requests_exactly_the_deficit() {
		let forker = Arc::new(FakeForker::default());
		let pool = WorkerPool::new(forker.clone(), 3);
		pool.top_up().unwrap();
		assert_eq!(*forker.requests.lock(), vec![3]);

		pool.worker_ready(WorkerHandle::new(1, 100));
		pool.top_up().unwrap();
		// one already idle, two already pending from the first top_up; no new request
		assert_eq!(*forker.requests.lock(), vec![3]);
	}

	#[tokio::test]
	async fn acquire_returns_most_recently_added_worker() {
		let forker = Arc::new(FakeForker::default());
		let pool = WorkerPool::new(forker, 2);
		pool.worker_ready(WorkerHandle::new(1, 100));
		pool.worker_ready(WorkerHandle::new(2, 200));

		let acquired = pool.acquire(Duration::from_millis(50)).await.unwrap();
		assert_eq!(acquired.id(), 2);
	}

	#[tokio::test]
	async fn acquire_times_out_when_pool_is_empty() {
		let forker = Arc::new(FakeForker::default());
		let pool = WorkerPool::new(forker, 0);
		let err = pool.acquire(Duration::from_millis(20)).await.unwrap_err();
		assert!(err.to_string().contains("timed out"));
	}

	#[tokio::test]
	async fn acquire_requests_deficit_plus_one_when_idle_list_is_empty() {
		let forker = Arc::new(FakeForker::default());
		let pool = WorkerPool::new(forker.clone(), 2);
		let _ = pool.acquire(Duration::from_millis(20)).await;
		// idle=0, target=2 => deficit 2, +1 for this acquire's own demand.
		assert_eq!(*forker.requests.lock(), vec![3]);
	}

	#[tokio::test]
	async fn acquire_wakes_up_once_a_worker_arrives() {
		let forker = Arc::new(FakeForker::default());
		let pool = WorkerPool::new(forker, 0);
		let pool2 = pool.clone();
		let task = tokio::spawn(async move { pool2.acquire(Duration::from_secs(5)).await });
		tokio::time::sleep(Duration::from_millis(20)).await;
		pool.worker_ready(WorkerHandle::new(9, 900));
		let acquired = task.await.unwrap().unwrap();
		assert_eq!(acquired.id(), 9);
	}

	#[tokio::test]
	async fn worker_died_requests_one_replacement() {
		let forker = Arc::new(FakeForker::default());
		let pool = WorkerPool::new(forker.clone(), 1);
		pool.worker_died(SessionId::new(7)).unwrap();
		assert_eq!(*forker.requests.lock(), vec![1]);
	}
}
