//! Remote storage client.
//!
//! One [`StorageBackend`] trait, three concrete variants
//! ([`LocalStorage`], [`WopiStorage`], [`WebDavStorage`]) behind it, chosen
//! at document-load time by whatever scheme the document's URI carries.

mod auth;
mod backend;
mod local;
mod webdav;
mod wopi;

pub use auth::{AuthAgent, BasicAuth, BearerAuth, NoAuth};
pub use backend::{FileInfo, StorageBackend};
pub use local::LocalStorage;
pub use webdav::WebDavStorage;
pub use wopi::WopiStorage;
