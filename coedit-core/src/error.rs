//! The closed set of protocol-facing error kinds that travel over the wire
//! in an `error: cmd=... kind=... message=...` frame. Internal failures use
//! `anyhow::Result`/`#[context(...)]`; this enum is only for the kinds the
//! client is expected to branch on.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Syntax,
	Invalid,
	Unknown,
	UriInvalid,
	PasswordRequiredToView,
	PasswordRequiredToModify,
	PasswordFailed,
	DocDirty,
	Full,
	LoadFailed,
	ServiceUnavailable,
}

impl ErrorKind {
	#[must_use]
	pub fn as_wire_token(self) -> &'static str {
		use ErrorKind::{
			DocDirty, Full, Invalid, LoadFailed, PasswordFailed, PasswordRequiredToModify, PasswordRequiredToView,
			ServiceUnavailable, Syntax, Unknown, UriInvalid,
		};
		match self {
			Syntax => "syntax",
			Invalid => "invalid",
			Unknown => "unknown",
			UriInvalid => "uriinvalid",
			PasswordRequiredToView => "passwordrequired:to-view",
			PasswordRequiredToModify => "passwordrequired:to-modify",
			PasswordFailed => "passwordfailed",
			DocDirty => "docdirty",
			Full => "full",
			LoadFailed => "loadfailed",
			ServiceUnavailable => "serviceunavailable",
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_wire_token())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wire_tokens_match_protocol_vocabulary() {
		assert_eq!(ErrorKind::Syntax.as_wire_token(), "syntax");
		assert_eq!(ErrorKind::PasswordRequiredToView.to_string(), "passwordrequired:to-view");
	}
}
