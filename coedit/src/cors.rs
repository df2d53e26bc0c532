//! CORS configuration: only exact origin matches and the `"*"` wildcard are
//! supported, since the `Cors` config section (`config.rs`) carries a plain
//! `Vec<String>` of origins and nothing here calls for prefix/suffix/regex
//! patterns. Pulling in `regex` for a feature no config field exposes would
//! be dead weight.

use std::time::Duration;

use axum::http::{header::HeaderValue, request::Parts};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Build a `CorsLayer` from a list of allowed origins (exact strings, or
/// `"*"` to allow every origin) and a preflight cache lifetime.
#[must_use]
pub fn build_cors_layer(allowed_origins: &[String], max_age_seconds: u64) -> CorsLayer {
	let allow_all = allowed_origins.iter().any(|o| o == "*");
	let exact: Vec<String> = allowed_origins.iter().filter(|o| *o != "*").cloned().collect();

	CorsLayer::new()
		.allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _req: &Parts| {
			allow_all || exact.iter().any(|o| o.as_bytes() == origin.as_bytes())
		}))
		.max_age(Duration::from_secs(max_age_seconds))
}
