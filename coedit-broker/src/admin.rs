//! The admin channel's model: subscriber bookkeeping plus the system/process
//! stats the `mem_stats`/`cpu_stats` commands report.
//!
//! Subscribers are keyed by session id (a `DashMap`) rather than held in a
//! flat list — it makes `unsubscribe` and duplicate-subscribe handling O(1)
//! and keyed lookups trivial.

use coedit_core::SessionId;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use sysinfo::System;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocStats {
	pub session_count: usize,
}

const DEFAULT_WINDOW_SIZE: usize = 20;

pub struct AdminModel {
	subscribers: DashMap<SessionId, UnboundedSender<String>>,
	system: Mutex<System>,
	mem_window: Mutex<VecDeque<u64>>,
	cpu_window: Mutex<VecDeque<f32>>,
	mem_window_size: usize,
	cpu_window_size: usize,
}

impl Default for AdminModel {
	fn default() -> Self {
		Self::new()
	}
}

impl AdminModel {
	#[must_use]
	pub fn new() -> AdminModel {
		AdminModel::with_window_sizes(DEFAULT_WINDOW_SIZE, DEFAULT_WINDOW_SIZE)
	}

	/// `mem_window_size`/`cpu_window_size` set the number of most-recent
	/// samples `mem_stats`/`cpu_stats` report, oldest evicted first once the
	/// window fills.
	#[must_use]
	pub fn with_window_sizes(mem_window_size: usize, cpu_window_size: usize) -> AdminModel {
		AdminModel {
			subscribers: DashMap::new(),
			system: Mutex::new(System::new_all()),
			mem_window: Mutex::new(VecDeque::with_capacity(mem_window_size.max(1))),
			cpu_window: Mutex::new(VecDeque::with_capacity(cpu_window_size.max(1))),
			mem_window_size: mem_window_size.max(1),
			cpu_window_size: cpu_window_size.max(1),
		}
	}

	/// Subscribe `session` to admin push notifications, returning the
	/// receiver half its WebSocket write loop should drain.
	pub fn subscribe(&self, session: SessionId) -> tokio::sync::mpsc::UnboundedReceiver<String> {
		let (tx, rx) = unbounded_channel();
		self.subscribers.insert(session, tx);
		rx
	}

	pub fn unsubscribe(&self, session: SessionId) {
		self.subscribers.remove(&session);
	}

	#[must_use]
	pub fn subscriber_count(&self) -> usize {
		self.subscribers.len()
	}

	/// Push `message` to every current subscriber, dropping any whose
	/// receiver has gone away.
	pub fn broadcast(&self, message: &str) {
		self.subscribers.retain(|_, tx| tx.send(message.to_string()).is_ok());
	}

	pub fn notify(&self, session: SessionId, message: &str) {
		if let Some(tx) = self.subscribers.get(&session) {
			tx.send(message.to_string()).ok();
		}
	}

	/// Instantaneous resident memory in bytes across all worker processes
	/// known to this host, refreshed on demand. Used by the `documents`
	/// listing's per-broker `memKb` column, which wants a current reading,
	/// not the sliding window `mem_stats` reports.
	pub fn current_mem_bytes(&self) -> u64 {
		let mut system = self.system.lock();
		system.refresh_memory();
		system.used_memory()
	}

	/// Instantaneous host-wide CPU usage percentage, refreshed on demand.
	pub fn current_cpu_percent(&self) -> f32 {
		let mut system = self.system.lock();
		system.refresh_cpu_usage();
		system.global_cpu_usage()
	}

	/// Sample memory usage now and push it into the sliding window the
	/// `mem_stats` admin command reports, evicting the oldest sample once
	/// the window is full. Called by the server's periodic sampler timer.
	pub fn sample_mem(&self) -> u64 {
		let value = self.current_mem_bytes();
		let mut window = self.mem_window.lock();
		if window.len() >= self.mem_window_size {
			window.pop_front();
		}
		window.push_back(value);
		self.broadcast(&format!("mem_stats {value}"));
		value
	}

	/// Sample CPU usage now and push it into the `cpu_stats` sliding window.
	pub fn sample_cpu(&self) -> f32 {
		let value = self.current_cpu_percent();
		let mut window = self.cpu_window.lock();
		if window.len() >= self.cpu_window_size {
			window.pop_front();
		}
		window.push_back(value);
		self.broadcast(&format!("cpu_stats {value:.2}"));
		value
	}

	/// Comma-separated sliding-window samples, oldest first, for the
	/// `mem_stats` admin command.
	#[must_use]
	pub fn mem_stats(&self) -> String {
		self.mem_window.lock().iter().map(u64::to_string).collect::<Vec<_>>().join(",")
	}

	/// Comma-separated sliding-window samples, oldest first, for the
	/// `cpu_stats` admin command.
	#[must_use]
	pub fn cpu_stats(&self) -> String {
		self.cpu_window.lock().iter().map(|v| format!("{v:.2}")).collect::<Vec<_>>().join(",")
	}
}
