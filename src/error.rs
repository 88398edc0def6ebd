//! Relay-level error types shared across the pipeline, token flows, and stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Unexpected upstream response; transport-class.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Relay endpoint answered with a non-success status.
	#[error(transparent)]
	Relay(#[from] RelayError),

	/// Identity endpoint rejected the credentials or the refresh token.
	#[error("Identity endpoint rejected the grant: {reason}.")]
	Unauthorized {
		/// Provider- or relay-supplied reason string.
		reason: String,
	},
	/// No token pair is bound to the principal; a password-grant login is required.
	#[error("Principal `{principal}` has no remote session.")]
	NotAuthenticated {
		/// Principal without a stored token pair.
		principal: String,
	},
	/// Adapter authorization pre-check failed.
	#[error("Adapter and/or remote system are not running.")]
	AdapterUnauthorized,
	/// Adapter liveness pre-check failed.
	#[error("Adapter is not running.")]
	AdapterUnavailable,
	/// The authorization gate produced a deny-all rule set.
	#[error("Request denied by the authorization gate.")]
	AccessDenied,
	/// Resource payload lacks what the relay needs (type, id, or valid JSON).
	#[error("Resource cannot be relayed: {reason}.")]
	InvalidResource {
		/// Human-readable description of the defect.
		reason: String,
	},
}
impl Error {
	/// HTTP status the hosting server should answer with when this error aborts a request.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::AdapterUnauthorized | Self::AdapterUnavailable => 500,
			Self::Unauthorized { .. } | Self::NotAuthenticated { .. } => 401,
			Self::AccessDenied => 403,
			Self::InvalidResource { .. } => 422,
			Self::Transport(_) | Self::Transient(_) | Self::Relay(_) => 502,
			Self::Storage(_) | Self::Config(_) => 500,
		}
	}

	/// Returns `true` for network failures and unexpected upstream responses.
	pub fn is_transport(&self) -> bool {
		matches!(self, Self::Transport(_) | Self::Transient(_))
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A required setting is absent.
	#[error("Missing required setting `{key}`.")]
	Missing {
		/// Setting name.
		key: &'static str,
	},
	/// A setting holds a value that cannot be parsed.
	#[error("Setting `{key}` is invalid: {reason}.")]
	Invalid {
		/// Setting name.
		key: &'static str,
		/// Parser failure summary.
		reason: String,
	},
	/// A configured or derived URL is malformed.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a URL parse failure together with the offending text.
	pub fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
		Self::InvalidUrl { url: url.into(), source }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Unexpected upstream responses (transport-class).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Identity endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Identity endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint response omitted `refresh_token` on a password grant.
	#[error("Token endpoint response is missing refresh_token.")]
	MissingRefreshToken,
	/// Local FHIR server answered an internal call with a payload that could not be parsed.
	#[error("Local server returned malformed JSON.")]
	LocalResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
	/// Local FHIR server answered an internal call with an unexpected status.
	#[error("Local server returned HTTP {status}.")]
	LocalStatus {
		/// HTTP status code.
		status: u16,
	},
}

/// Transport-level failures (network, IO, timeout).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling `{target}`.")]
	Network {
		/// Endpoint label (identity, relay, local, probe).
		target: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Outbound call exceeded the configured timeout.
	#[error("Request to `{target}` timed out.")]
	Timeout {
		/// Endpoint label (identity, relay, local, probe).
		target: &'static str,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(target: &'static str, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { target, source: Box::new(src) }
	}
}

/// Relay endpoint rejected the mirrored resource.
#[derive(Debug, ThisError)]
#[error("Relay endpoint returned HTTP {status}: {message}.")]
pub struct RelayError {
	/// HTTP status code returned by the adapter.
	pub status: u16,
	/// Body preview or adapter-reported error text.
	pub message: String,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn pre_check_failures_surface_as_server_errors() {
		assert_eq!(Error::AdapterUnauthorized.status_code(), 500);
		assert_eq!(Error::AdapterUnavailable.status_code(), 500);
		assert_eq!(
			Error::AdapterUnauthorized.to_string(),
			"Adapter and/or remote system are not running."
		);
		assert_eq!(Error::AdapterUnavailable.to_string(), "Adapter is not running.");
	}

	#[test]
	fn unauthorized_is_distinct_from_transport_failures() {
		let unauthorized = Error::Unauthorized { reason: "bad credentials".into() };
		let timeout = Error::from(TransportError::Timeout { target: "identity" });

		assert!(!unauthorized.is_transport());
		assert!(timeout.is_transport());
		assert_eq!(unauthorized.status_code(), 401);
		assert_eq!(timeout.status_code(), 502);
	}

	#[test]
	fn malformed_token_responses_are_transport_class() {
		let missing_expiry = Error::from(TransientError::MissingExpiresIn);
		let missing_refresh = Error::from(TransientError::MissingRefreshToken);

		assert!(missing_expiry.is_transport());
		assert!(missing_refresh.is_transport());
		assert_eq!(missing_refresh.status_code(), 502);
	}

	#[test]
	fn relay_error_renders_status() {
		let err = Error::from(RelayError { status: 503, message: "adapter down".into() });

		assert_eq!(err.to_string(), "Relay endpoint returned HTTP 503: adapter down.");
	}
}
