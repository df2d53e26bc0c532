//! Two-session scenarios against the public session API: the edit lock
//! changes hands mid-collaboration and the previous holder's commands stop
//! passing through (S2), and a `canceltiles` burst purges stale, un-tagged
//! tile requests while sparing the `id=`-tagged one a thumbnail fetch would
//! use (S4).

use coedit_core::SessionId;
use coedit_session::{EditLock, MessageQueue};

#[test]
fn s2_edit_lock_transfers_and_gates_the_previous_holder() {
	let lock = EditLock::new();
	let alice = SessionId::new(1);
	let bob = SessionId::new(2);

	assert_eq!(lock.transfer_to(alice), None);
	assert_eq!(lock.gate(alice, "key code=65"), "key code=65");
	assert_eq!(lock.gate(bob, "key code=66"), "dummymsg");

	let previous = lock.transfer_to(bob);
	assert_eq!(previous, Some(alice));

	// Alice lost the lock; her edits are now gated, Bob's pass through.
	assert_eq!(lock.gate(alice, "key code=65"), "dummymsg");
	assert_eq!(lock.gate(bob, "key code=66"), "key code=66");

	// Exempt commands are unaffected by who holds the lock.
	assert_eq!(lock.gate(alice, "useractive"), "useractive");
}

#[test]
fn s4_canceltiles_purges_stale_requests_but_spares_an_id_tagged_one() {
	let queue = MessageQueue::new();
	queue.put("tile part=0 tileposx=0 tileposy=0".to_string());
	queue.put("tile part=0 tileposx=3840 tileposy=0 id=42".to_string());
	queue.put("canceltiles".to_string());
	queue.put("tile part=0 tileposx=7680 tileposy=0".to_string());

	assert_eq!(queue.try_pop().as_deref(), Some("canceltiles"));
	assert_eq!(queue.try_pop().as_deref(), Some("tile part=0 tileposx=3840 tileposy=0 id=42"));
	assert_eq!(queue.try_pop().as_deref(), Some("tile part=0 tileposx=7680 tileposy=0"));
	assert!(queue.try_pop().is_none());
}
