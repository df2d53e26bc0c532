//! Dual-session multiplexing: one client-facing and one worker-facing
//! [`Session`] per document view, joined by a [`SessionPair`] that applies
//! edit-lock gating in one direction and the snoop table in the other, plus
//! the [`MessageQueue`] each direction's outbound traffic flows through.

mod editlock;
mod message_queue;
mod saveas;
mod session;
mod snoop;

pub use editlock::EditLock;
pub use message_queue::MessageQueue;
pub use saveas::{SaveAsResult, SaveAsRendezvous};
pub use session::{Session, SessionKind, SessionPair};
pub use snoop::BrokerEffects;
