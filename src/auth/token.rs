//! Bearer token wrapper that redacts sensitive material.

// self
use crate::_prelude::*;

/// Redacted secret wrapper keeping bearer tokens and passwords out of logs.
///
/// The upstream issues opaque tokens with no advertised lifetime, so the wrapper carries no
/// expiry: a token is considered valid until the upstream rejects it with 403.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken(String);
impl AuthToken {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Whether no token has been obtained yet.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl AsRef<str> for AuthToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for AuthToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AuthToken").field(&"<redacted>").finish()
	}
}
impl Display for AuthToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
