//! The queue sitting between a client-facing session and its worker-facing
//! peer, carrying outbound tile requests with two always-on policies:
//!
//! - `canceltiles` purges every queued message with the literal `"tile "`
//!   prefix that does *not* carry an `id=` parameter, before being pushed to
//!   the front itself, so a client that scrolled away stops paying for
//!   renders it no longer wants. Requests tagged with `id=` are
//!   thumbnails/previews and survive cancellation. `tilecombine` requests are
//!   not `"tile "`-prefixed and are left untouched by this purge.
//! - a `tile ` request that's byte-identical to one already queued is
//!   dropped rather than enqueued a second time; the queued copy is left in
//!   place, unmodified.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

fn is_single_tile_message(msg: &str) -> bool {
	msg.starts_with("tile ")
}

fn has_id_param(msg: &str) -> bool {
	msg.split_whitespace().any(|tok| tok.starts_with("id="))
}

pub struct MessageQueue {
	inner: Mutex<VecDeque<String>>,
	notify: Notify,
}

impl Default for MessageQueue {
	fn default() -> Self {
		Self::new()
	}
}

impl MessageQueue {
	#[must_use]
	pub fn new() -> MessageQueue {
		MessageQueue {
			inner: Mutex::new(VecDeque::new()),
			notify: Notify::new(),
		}
	}

	pub fn put(&self, msg: String) {
		let mut queue = self.inner.lock();
		if msg.starts_with("canceltiles") {
			queue.retain(|m| !is_single_tile_message(m) || has_id_param(m));
			queue.push_front(msg);
		} else if is_single_tile_message(&msg) {
			if queue.iter().any(|m| *m == msg) {
				// Byte-identical request already queued; drop the new one,
				// leave the queued copy untouched.
			} else {
				queue.push_back(msg);
			}
		} else {
			queue.push_back(msg);
		}
		drop(queue);
		self.notify.notify_one();
	}

	/// Pop the next message, waiting indefinitely if the queue is empty.
	pub async fn pop(&self) -> String {
		loop {
			if let Some(msg) = self.inner.lock().pop_front() {
				return msg;
			}
			self.notify.notified().await;
		}
	}

	pub fn try_pop(&self) -> Option<String> {
		self.inner.lock().pop_front()
	}

	/// Remove every queued message at once.
	pub fn clear(&self) {
		self.inner.lock().clear();
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.inner.lock().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
