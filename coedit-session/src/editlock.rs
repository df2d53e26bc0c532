//! Single-writer gating among the client-facing sessions of one document.
//!
//! Exactly one client session may hold the edit lock at a time. Commands
//! from any other session are replaced with a no-op `dummymsg` before
//! reaching the worker, except for the handful of commands every session is
//! always allowed to issue regardless of lock ownership.

use coedit_core::SessionId;
use parking_lot::Mutex;

/// Commands every session may issue even without the edit lock: none of
/// these mutate the document.
const EXEMPT_COMMANDS: &[&str] = &["downloadas", "useractive", "userinactive"];

pub struct EditLock {
	holder: Mutex<Option<SessionId>>,
}

impl Default for EditLock {
	fn default() -> Self {
		Self::new()
	}
}

impl EditLock {
	#[must_use]
	pub fn new() -> EditLock {
		EditLock { holder: Mutex::new(None) }
	}

	#[must_use]
	pub fn holder(&self) -> Option<SessionId> {
		*self.holder.lock()
	}

	/// Grants the lock to `session` unconditionally, returning the previous
	/// holder if any (the caller is responsible for notifying it that it
	/// lost the lock).
	pub fn transfer_to(&self, session: SessionId) -> Option<SessionId> {
		self.holder.lock().replace(session)
	}

	pub fn release(&self, session: SessionId) {
		let mut holder = self.holder.lock();
		if *holder == Some(session) {
			*holder = None;
		}
	}

	fn command_token(msg: &str) -> &str {
		msg.split(|c: char| c == ' ' || c == ':').next().unwrap_or(msg)
	}

	#[must_use]
	pub fn is_exempt(msg: &str) -> bool {
		EXEMPT_COMMANDS.contains(&Self::command_token(msg))
	}

	/// Gate `msg` from `session`: passed through unchanged if `session`
	/// holds the lock (or no one does yet and the document has no other
	/// writer) or the command is exempt, otherwise replaced with
	/// `dummymsg`.
	#[must_use]
	pub fn gate(&self, session: SessionId, msg: &str) -> String {
		if Self::is_exempt(msg) || self.holder() == Some(session) {
			msg.to_string()
		} else {
			"dummymsg".to_string()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lock_holder_commands_pass_through() {
		let lock = EditLock::new();
		let s = SessionId::new(1);
		lock.transfer_to(s);
		assert_eq!(lock.gate(s, "key ..."), "key ...");
	}

	#[test]
	fn non_holder_commands_are_replaced_with_dummymsg() {
		let lock = EditLock::new();
		lock.transfer_to(SessionId::new(1));
		let other = SessionId::new(2);
		assert_eq!(lock.gate(other, "key ..."), "dummymsg");
	}

	#[test]
	fn exempt_commands_always_pass_through() {
		let lock = EditLock::new();
		lock.transfer_to(SessionId::new(1));
		let other = SessionId::new(2);
		assert_eq!(lock.gate(other, "useractive"), "useractive");
		assert_eq!(lock.gate(other, "downloadas id=1 format=pdf"), "downloadas id=1 format=pdf");
	}

	#[test]
	fn transfer_returns_previous_holder() {
		let lock = EditLock::new();
		assert_eq!(lock.transfer_to(SessionId::new(1)), None);
		assert_eq!(lock.transfer_to(SessionId::new(2)), Some(SessionId::new(1)));
	}

	#[test]
	fn release_only_clears_if_still_held_by_that_session() {
		let lock = EditLock::new();
		lock.transfer_to(SessionId::new(1));
		lock.release(SessionId::new(2));
		assert_eq!(lock.holder(), Some(SessionId::new(1)));
		lock.release(SessionId::new(1));
		assert_eq!(lock.holder(), None);
	}
}
