//! Process-level configuration loaded once at start.
//!
//! Use [`RelayConfig::from_env`] for convention-based setup or [`RelayConfig::new`] with the
//! `with_*` methods for full control.

// self
use crate::{_prelude::*, error::ConfigError};

const ENV_REMOTE_BASE_URL: &str = "FHIR_RELAY_REMOTE_BASE_URL";
const ENV_IDENTITY_BASE_URL: &str = "FHIR_RELAY_IDENTITY_BASE_URL";
const ENV_CLIENT_ID: &str = "FHIR_RELAY_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "FHIR_RELAY_CLIENT_SECRET";
const ENV_LOCAL_BASE_URL: &str = "FHIR_RELAY_LOCAL_BASE_URL";
const ENV_ADAPTER_HEALTH_URL: &str = "FHIR_RELAY_ADAPTER_HEALTH_URL";
const ENV_ADAPTER_AUTHORIZATION_URL: &str = "FHIR_RELAY_ADAPTER_AUTHORIZATION_URL";
const ENV_SAFETY_MARGIN_SECS: &str = "FHIR_RELAY_SAFETY_MARGIN_SECS";
const ENV_TIMEOUT_SECS: &str = "FHIR_RELAY_TIMEOUT_SECS";
const ENV_CHECK_AUTHORIZED_BY_ADAPTER: &str = "FHIR_RELAY_CHECK_AUTHORIZED_BY_ADAPTER";
const ENV_STORE_RESOURCE_BEFORE_UPDATE: &str = "FHIR_RELAY_STORE_RESOURCE_BEFORE_UPDATE";
const ENV_CHECK_ADAPTER_IS_RUNNING: &str = "FHIR_RELAY_CHECK_ADAPTER_IS_RUNNING";

/// Capability toggles consulted by the interception pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
	/// Ask the adapter whether the caller's bearer token is authorized before a write.
	pub check_if_authorized_by_adapter: bool,
	/// Fetch and stash the server-side copy of a resource before an update.
	pub store_resource_before_update: bool,
	/// Ask the adapter whether it is running before a write.
	///
	/// Ignored when `check_if_authorized_by_adapter` is set.
	pub check_if_adapter_is_running: bool,
}

/// Endpoints, client credentials, and timing knobs for the relay.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayConfig {
	/// Adapter base URL; relay calls go to `{remote_base_url}/remote-fhir-express/...`.
	pub remote_base_url: Url,
	/// Remote identity base URL; tokens come from `{identity_base_url}/uaa/oauth/token`.
	pub identity_base_url: Url,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// OAuth 2.0 client secret.
	pub client_secret: String,
	/// Local FHIR base URL used for loop-guarded internal calls.
	pub local_base_url: Option<Url>,
	/// Adapter liveness endpoint.
	pub adapter_health_url: Option<Url>,
	/// Adapter endpoint that validates a forwarded bearer token.
	pub adapter_authorization_url: Option<Url>,
	/// Window before expiry in which a token counts as about to expire.
	pub safety_margin: Duration,
	/// Upper bound on every outbound call.
	pub request_timeout: Duration,
	/// Pipeline capability toggles.
	pub capabilities: Capabilities,
}
impl RelayConfig {
	/// Default safety margin before expiry.
	pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::seconds(60);
	/// Default outbound request timeout.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(30);

	/// Creates a configuration with the required endpoints and client credentials.
	pub fn new(
		remote_base_url: Url,
		identity_base_url: Url,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Self {
		Self {
			remote_base_url,
			identity_base_url,
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			local_base_url: None,
			adapter_health_url: None,
			adapter_authorization_url: None,
			safety_margin: Self::DEFAULT_SAFETY_MARGIN,
			request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
			capabilities: Capabilities::default(),
		}
	}

	/// Creates a configuration from environment variables.
	///
	/// # Required env vars
	/// - `FHIR_RELAY_REMOTE_BASE_URL`
	/// - `FHIR_RELAY_IDENTITY_BASE_URL`
	/// - `FHIR_RELAY_CLIENT_ID`
	/// - `FHIR_RELAY_CLIENT_SECRET`
	///
	/// # Optional env vars
	/// - `FHIR_RELAY_LOCAL_BASE_URL`, `FHIR_RELAY_ADAPTER_HEALTH_URL`,
	///   `FHIR_RELAY_ADAPTER_AUTHORIZATION_URL`
	/// - `FHIR_RELAY_SAFETY_MARGIN_SECS` (default 60), `FHIR_RELAY_TIMEOUT_SECS` (default 30)
	/// - `FHIR_RELAY_CHECK_AUTHORIZED_BY_ADAPTER`, `FHIR_RELAY_STORE_RESOURCE_BEFORE_UPDATE`,
	///   `FHIR_RELAY_CHECK_ADAPTER_IS_RUNNING` (`1`/`true` to enable)
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Same as [`RelayConfig::from_env`] but reads values through `lookup`.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let required = |key: &'static str| {
			lookup(key).filter(|value| !value.trim().is_empty()).ok_or(ConfigError::Missing { key })
		};
		let url = |raw: String| {
			Url::parse(raw.trim()).map_err(|source| ConfigError::invalid_url(raw, source))
		};
		let optional_url = |key: &'static str| lookup(key).map(url).transpose();
		let seconds = |key: &'static str, default: Duration| match lookup(key) {
			Some(raw) => raw
				.trim()
				.parse::<u32>()
				.map(|secs| Duration::seconds(i64::from(secs)))
				.map_err(|e| ConfigError::Invalid { key, reason: e.to_string() }),
			None => Ok(default),
		};
		let flag = |key: &'static str| {
			lookup(key).is_some_and(|raw| {
				let raw = raw.trim();

				raw == "1" || raw.eq_ignore_ascii_case("true")
			})
		};
		let mut config = Self::new(
			url(required(ENV_REMOTE_BASE_URL)?)?,
			url(required(ENV_IDENTITY_BASE_URL)?)?,
			required(ENV_CLIENT_ID)?,
			required(ENV_CLIENT_SECRET)?,
		);

		config.local_base_url = optional_url(ENV_LOCAL_BASE_URL)?;
		config.adapter_health_url = optional_url(ENV_ADAPTER_HEALTH_URL)?;
		config.adapter_authorization_url = optional_url(ENV_ADAPTER_AUTHORIZATION_URL)?;
		config.safety_margin = seconds(ENV_SAFETY_MARGIN_SECS, Self::DEFAULT_SAFETY_MARGIN)?;
		config.request_timeout = seconds(ENV_TIMEOUT_SECS, Self::DEFAULT_REQUEST_TIMEOUT)?;
		config.capabilities = Capabilities {
			check_if_authorized_by_adapter: flag(ENV_CHECK_AUTHORIZED_BY_ADAPTER),
			store_resource_before_update: flag(ENV_STORE_RESOURCE_BEFORE_UPDATE),
			check_if_adapter_is_running: flag(ENV_CHECK_ADAPTER_IS_RUNNING),
		};

		Ok(config)
	}

	/// Sets the local FHIR base URL used for loop-guarded internal calls.
	pub fn with_local_base_url(mut self, url: Url) -> Self {
		self.local_base_url = Some(url);

		self
	}

	/// Sets the adapter liveness endpoint.
	pub fn with_adapter_health_url(mut self, url: Url) -> Self {
		self.adapter_health_url = Some(url);

		self
	}

	/// Sets the adapter authorization endpoint.
	pub fn with_adapter_authorization_url(mut self, url: Url) -> Self {
		self.adapter_authorization_url = Some(url);

		self
	}

	/// Overrides the safety margin (negative values clamp to zero).
	pub fn with_safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Overrides the outbound request timeout.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Replaces the capability toggles.
	pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
		self.capabilities = capabilities;

		self
	}

	/// Token endpoint on the remote identity service.
	pub fn identity_token_endpoint(&self) -> Result<Url, ConfigError> {
		let raw = format!("{}/uaa/oauth/token", self.identity_base_url.as_str().trim_end_matches('/'));

		Url::parse(&raw).map_err(|source| ConfigError::invalid_url(raw, source))
	}
}
impl Debug for RelayConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RelayConfig")
			.field("remote_base_url", &self.remote_base_url.as_str())
			.field("identity_base_url", &self.identity_base_url.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret_set", &!self.client_secret.is_empty())
			.field("local_base_url", &self.local_base_url.as_ref().map(Url::as_str))
			.field("safety_margin", &self.safety_margin)
			.field("request_timeout", &self.request_timeout)
			.field("capabilities", &self.capabilities)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> =
			pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();

		move |key| map.get(key).cloned()
	}

	const REQUIRED: [(&str, &str); 4] = [
		(ENV_REMOTE_BASE_URL, "https://adapter.example.org"),
		(ENV_IDENTITY_BASE_URL, "https://remote.example.org/"),
		(ENV_CLIENT_ID, "relay"),
		(ENV_CLIENT_SECRET, "s3cret"),
	];

	#[test]
	fn loads_required_values_with_defaults() {
		let config =
			RelayConfig::from_lookup(lookup(&REQUIRED)).expect("Required settings should load.");

		assert_eq!(config.client_id, "relay");
		assert_eq!(config.safety_margin, Duration::seconds(60));
		assert_eq!(config.request_timeout, Duration::seconds(30));
		assert_eq!(config.capabilities, Capabilities::default());
		assert!(config.local_base_url.is_none());
		assert_eq!(
			config.identity_token_endpoint().expect("Token endpoint should build.").as_str(),
			"https://remote.example.org/uaa/oauth/token"
		);
	}

	#[test]
	fn reads_optional_values_and_flags() {
		let mut pairs = REQUIRED.to_vec();

		pairs.extend([
			(ENV_LOCAL_BASE_URL, "http://localhost:8080/fhir"),
			(ENV_SAFETY_MARGIN_SECS, "90"),
			(ENV_TIMEOUT_SECS, "5"),
			(ENV_CHECK_AUTHORIZED_BY_ADAPTER, "true"),
			(ENV_STORE_RESOURCE_BEFORE_UPDATE, "1"),
			(ENV_CHECK_ADAPTER_IS_RUNNING, "no"),
		]);

		let config =
			RelayConfig::from_lookup(lookup(&pairs)).expect("Optional settings should load.");

		assert_eq!(
			config.local_base_url.as_ref().map(Url::as_str),
			Some("http://localhost:8080/fhir")
		);
		assert_eq!(config.safety_margin, Duration::seconds(90));
		assert_eq!(config.request_timeout, Duration::seconds(5));
		assert!(config.capabilities.check_if_authorized_by_adapter);
		assert!(config.capabilities.store_resource_before_update);
		assert!(!config.capabilities.check_if_adapter_is_running);
	}

	#[test]
	fn flags_ignore_case() {
		let mut pairs = REQUIRED.to_vec();

		pairs.extend([
			(ENV_CHECK_AUTHORIZED_BY_ADAPTER, "TRUE"),
			(ENV_STORE_RESOURCE_BEFORE_UPDATE, " True "),
			(ENV_CHECK_ADAPTER_IS_RUNNING, "false"),
		]);

		let config = RelayConfig::from_lookup(lookup(&pairs)).expect("Flags should load.");

		assert!(config.capabilities.check_if_authorized_by_adapter);
		assert!(config.capabilities.store_resource_before_update);
		assert!(!config.capabilities.check_if_adapter_is_running);
	}

	#[test]
	fn reports_missing_and_invalid_settings() {
		let err = RelayConfig::from_lookup(lookup(&REQUIRED[..3]))
			.expect_err("Missing client secret should fail.");

		assert!(matches!(err, ConfigError::Missing { key: ENV_CLIENT_SECRET }));

		let mut pairs = REQUIRED.to_vec();

		pairs.push((ENV_TIMEOUT_SECS, "soon"));

		let err = RelayConfig::from_lookup(lookup(&pairs))
			.expect_err("Non-numeric timeout should fail.");

		assert!(matches!(err, ConfigError::Invalid { key: ENV_TIMEOUT_SECS, .. }));
	}

	#[test]
	fn debug_hides_client_secret() {
		let config =
			RelayConfig::from_lookup(lookup(&REQUIRED)).expect("Required settings should load.");

		assert!(!format!("{config:?}").contains("s3cret"));
	}
}
