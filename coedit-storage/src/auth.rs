//! Pluggable credential agents for the WOPI and WebDAV storage backends.

use reqwest::RequestBuilder;
use std::fmt::Debug;

pub trait AuthAgent: Debug + Send + Sync {
	fn apply(&self, builder: RequestBuilder) -> RequestBuilder;
}

#[derive(Debug, Clone, Default)]
pub struct NoAuth;

impl AuthAgent for NoAuth {
	fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
		builder
	}
}

#[derive(Debug, Clone)]
pub struct BearerAuth {
	pub token: String,
}

impl AuthAgent for BearerAuth {
	fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
		builder.bearer_auth(&self.token)
	}
}

#[derive(Debug, Clone)]
pub struct BasicAuth {
	pub username: String,
	pub password: String,
}

impl AuthAgent for BasicAuth {
	fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
		builder.basic_auth(&self.username, Some(&self.password))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn no_auth_leaves_request_untouched() {
		let client = reqwest::Client::new();
		let builder = client.get("http://example.com");
		let built = NoAuth.apply(builder).build().unwrap();
		assert!(built.headers().get("authorization").is_none());
	}
}
