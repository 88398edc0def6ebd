//! Identity-endpoint secrets that must never reach logs.

// self
use crate::_prelude::*;

/// Access or refresh token issued by the remote identity endpoint.
///
/// Both formatters print `<redacted>`, so a [`TokenPair`](crate::auth::TokenPair) can be logged
/// or debug-printed alongside relay diagnostics.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw token, for outbound headers and refresh-grant bodies only.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// `true` when `candidate` equals the wrapped token.
	///
	/// Used by the store's compare-and-swap on the refresh token.
	pub fn matches(&self, candidate: &str) -> bool {
		self.0 == candidate
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenSecret(<redacted>)")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
