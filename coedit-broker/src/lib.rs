//! Document broker and server-wide shared state.
//!
//! [`DocumentBroker`] is the per-document orchestrator (storage, tile cache,
//! edit lock, autosave decision). [`Server`] is the process-wide handle
//! holding the broker map, the worker pool, and the session-id counter.
//! [`AdminModel`] backs the admin channel's subscriber and stats commands.

mod admin;
mod broker;
mod effects;
mod server;

pub use admin::{AdminModel, DocStats};
pub use broker::DocumentBroker;
pub use effects::BrokerSnoop;
pub use server::Server;
