//! Immutable access/refresh token pairs and their expiry lifecycle.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Lifecycle status of a [`TokenPair`] relative to a safety margin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token stays valid beyond the safety margin.
	Valid,
	/// Token is still valid but falls inside the safety margin.
	AboutToExpire,
	/// Token exceeded its expiry instant.
	Expired,
}
impl TokenStatus {
	/// Returns `true` when the pair must be refreshed before use.
	pub fn needs_refresh(self) -> bool {
		!matches!(self, Self::Valid)
	}
}

/// Errors produced by [`TokenPairBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenPairBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no refresh token value was provided.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
	/// Issued when `expires_in` is zero, negative, or absent.
	#[error("expires_in must be a positive number of seconds.")]
	NonPositiveExpiresIn,
}

/// OAuth 2.0 access/refresh pair issued by the remote identity endpoint.
///
/// Pairs are never edited in place; a refresh produces a new pair that replaces the old one
/// wholesale.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenPair {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret.
	pub refresh_token: TokenSecret,
	/// Token type reported by the identity endpoint (usually `bearer`).
	pub token_type: String,
	/// Space-delimited scope string reported by the identity endpoint.
	pub scope: String,
	/// Instant the pair was received.
	pub issued_at: OffsetDateTime,
	/// Lifetime in seconds, always positive.
	pub expires_in_seconds: i64,
}
impl TokenPair {
	/// Returns a builder for constructing pairs.
	pub fn builder() -> TokenPairBuilder {
		TokenPairBuilder::default()
	}

	/// Absolute expiry instant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.issued_at + Duration::seconds(self.expires_in_seconds)
	}

	/// Returns `true` if `instant` is at or past the expiry instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at()
	}

	/// Returns `true` if `instant` is at or past `expiry - margin`.
	pub fn is_about_to_expire_at(&self, instant: OffsetDateTime, margin: Duration) -> bool {
		instant >= self.expires_at() - margin
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime, margin: Duration) -> TokenStatus {
		if self.is_expired_at(instant) {
			TokenStatus::Expired
		} else if self.is_about_to_expire_at(instant, margin) {
			TokenStatus::AboutToExpire
		} else {
			TokenStatus::Valid
		}
	}

	/// Convenience helper that checks the status using the current UTC instant.
	pub fn status(&self, margin: Duration) -> TokenStatus {
		self.status_at(OffsetDateTime::now_utc(), margin)
	}

	/// `Authorization` header value carrying the access token.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.access_token.expose())
	}
}
impl Debug for TokenPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenPair")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("expires_in_seconds", &self.expires_in_seconds)
			.finish()
	}
}

/// Builder for [`TokenPair`].
#[derive(Clone, Debug, Default)]
pub struct TokenPairBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	token_type: Option<String>,
	scope: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_in_seconds: Option<i64>,
}
impl TokenPairBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the token type (defaults to `bearer`).
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets the scope string (defaults to empty).
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Sets the issued-at instant (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets the lifetime in seconds.
	pub fn expires_in(mut self, seconds: i64) -> Self {
		self.expires_in_seconds = Some(seconds);

		self
	}

	/// Consumes the builder and produces a [`TokenPair`].
	pub fn build(self) -> Result<TokenPair, TokenPairBuilderError> {
		let access_token = self.access_token.ok_or(TokenPairBuilderError::MissingAccessToken)?;
		let refresh_token = self.refresh_token.ok_or(TokenPairBuilderError::MissingRefreshToken)?;
		let expires_in_seconds = self
			.expires_in_seconds
			.filter(|secs| *secs > 0)
			.ok_or(TokenPairBuilderError::NonPositiveExpiresIn)?;

		Ok(TokenPair {
			access_token,
			refresh_token,
			token_type: self.token_type.unwrap_or_else(|| "bearer".into()),
			scope: self.scope.unwrap_or_default(),
			issued_at: self.issued_at.unwrap_or_else(OffsetDateTime::now_utc),
			expires_in_seconds,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn pair(issued: OffsetDateTime, expires_in: i64) -> TokenPair {
		TokenPair::builder()
			.access_token("access")
			.refresh_token("refresh")
			.issued_at(issued)
			.expires_in(expires_in)
			.build()
			.expect("Token pair fixture should build.")
	}

	#[test]
	fn about_to_expire_respects_safety_margin() {
		let t0 = macros::datetime!(2025-01-01 00:00 UTC);
		let pair = pair(t0, 300);
		let margin = Duration::seconds(60);

		assert!(!pair.is_about_to_expire_at(t0 + Duration::seconds(100), margin));
		assert!(!pair.is_about_to_expire_at(t0 + Duration::seconds(239), margin));
		assert!(pair.is_about_to_expire_at(t0 + Duration::seconds(240), margin));
		assert!(pair.is_about_to_expire_at(t0 + Duration::seconds(241), margin));
		assert!(!pair.is_expired_at(t0 + Duration::seconds(241)));
		assert!(pair.is_expired_at(t0 + Duration::seconds(300)));
	}

	#[test]
	fn status_walks_through_lifecycle() {
		let t0 = macros::datetime!(2025-01-01 00:00 UTC);
		let pair = pair(t0, 300);
		let margin = Duration::seconds(60);

		assert_eq!(pair.status_at(t0, margin), TokenStatus::Valid);
		assert_eq!(pair.status_at(t0 + Duration::seconds(250), margin), TokenStatus::AboutToExpire);
		assert_eq!(pair.status_at(t0 + Duration::seconds(301), margin), TokenStatus::Expired);
		assert!(!TokenStatus::Valid.needs_refresh());
		assert!(TokenStatus::AboutToExpire.needs_refresh());
		assert!(TokenStatus::Expired.needs_refresh());
	}

	#[test]
	fn builder_rejects_non_positive_lifetimes() {
		let err = TokenPair::builder()
			.access_token("a")
			.refresh_token("r")
			.expires_in(0)
			.build()
			.expect_err("Zero lifetime must be rejected.");

		assert_eq!(err, TokenPairBuilderError::NonPositiveExpiresIn);

		let err = TokenPair::builder()
			.refresh_token("r")
			.expires_in(60)
			.build()
			.expect_err("Missing access token must be rejected.");

		assert_eq!(err, TokenPairBuilderError::MissingAccessToken);
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let pair = pair(macros::datetime!(2025-01-01 00:00 UTC), 60);
		let rendered = format!("{pair:?}");

		assert!(!rendered.contains("\"access\""));
		assert!(rendered.contains("<redacted>"));
		assert_eq!(pair.bearer(), "Bearer access");
		assert_eq!(pair.token_type, "bearer");
	}
}
