//! Parsing for the client/server text wire protocol: a leading command
//! token followed by whitespace-separated `key=value` pairs, values
//! percent-decoded ("urlencoded" fields).

use percent_encoding::percent_decode_str;
use std::collections::HashMap;

pub struct ParsedCommand {
	pub command: String,
	pub args: HashMap<String, String>,
}

impl ParsedCommand {
	#[must_use]
	pub fn get(&self, key: &str) -> Option<&str> {
		self.args.get(key).map(String::as_str)
	}
}

#[must_use]
pub fn parse_command(line: &str) -> ParsedCommand {
	let mut tokens = line.split_whitespace();
	let command = tokens.next().unwrap_or_default().to_string();
	let mut args = HashMap::new();
	for token in tokens {
		if let Some((key, value)) = token.split_once('=') {
			let decoded = percent_decode_str(value).decode_utf8_lossy().into_owned();
			args.insert(key.to_string(), decoded);
		}
	}
	ParsedCommand { command, args }
}

/// Split a document URL into a `(host, path)` pair for [`coedit_core::DocKey`].
/// Accepts `scheme://host/path` URLs as well as bare filesystem paths, in
/// which case the host is the fixed sentinel `"localhost"`.
#[must_use]
pub fn split_uri(uri: &str) -> (&str, &str) {
	if let Some(rest) = uri.split("://").nth(1) {
		match rest.find('/') {
			Some(idx) => (&rest[..idx], &rest[idx..]),
			None => (rest, "/"),
		}
	} else {
		("localhost", uri)
	}
}
