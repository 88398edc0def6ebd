//! Identity endpoint exchanges (password and refresh grants) built on the `oauth2` crate.

pub use oauth2;

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use oauth2::{
	AsyncHttpClient, AuthType, ClientId, EndpointNotSet, EndpointSet, HttpClientError,
	HttpRequest, RefreshToken, RequestTokenError, ResourceOwnerPassword, ResourceOwnerUsername,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
	http::{HeaderValue, header::AUTHORIZATION},
};
// self
use crate::{
	_prelude::*,
	auth::TokenPair,
	config::RelayConfig,
	error::{ConfigError, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeTokenResponse = oauth2::basic::BasicTokenResponse;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Grants issued against the remote identity endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Resource-owner password grant used by `login`.
	Password,
	/// Refresh-token grant used to extend a session.
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::Password => "password",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Maps HTTP transport failures into relay [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a relay error.
	fn map_transport_error(
		&self,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(grant, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => map_generic_transport_error(meta, message),
			_ => map_generic_transport_error(meta, "unknown transport failure"),
		}
	}
}

/// Builds `Basic base64(client_id:client_secret)` over the raw credentials.
///
/// `oauth2`'s own basic auth form-encodes both halves first, which changes the header for any
/// secret containing reserved characters.
pub fn basic_authorization(client_id: &str, client_secret: &str) -> Result<HeaderValue> {
	let credential = STANDARD.encode(format!("{client_id}:{client_secret}"));
	let mut value = HeaderValue::from_str(&format!("Basic {credential}")).map_err(|e| {
		ConfigError::Invalid { key: "client_credentials", reason: e.to_string() }
	})?;

	value.set_sensitive(true);

	Ok(value)
}

/// Token transport handle that stamps the client credentials on every identity call.
struct ClientAuthHandle<H> {
	inner: H,
	authorization: HeaderValue,
}
impl<'c, H> AsyncHttpClient<'c> for ClientAuthHandle<H>
where
	H: AsyncHttpClient<'c>,
{
	type Error = H::Error;
	type Future = H::Future;

	fn call(&'c self, mut request: HttpRequest) -> Self::Future {
		request.headers_mut().insert(AUTHORIZATION, self.authorization.clone());

		self.inner.call(request)
	}
}

/// Password and refresh grant client for the remote identity endpoint.
///
/// Client credentials travel as `Authorization: Basic base64(client_id:client_secret)` and
/// responses are requested as JSON.
pub(crate) struct IdentityFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	client_authorization: HeaderValue,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> IdentityFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_config(
		config: &RelayConfig,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let endpoint = config.identity_token_endpoint()?;
		let token_url = TokenUrl::new(endpoint.to_string())
			.map_err(|source| ConfigError::invalid_url(endpoint.as_str(), source))?;
		// No secret on the oauth2 client; the handle sets the Basic header itself.
		let oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_auth_type(AuthType::BasicAuth)
			.set_token_uri(token_url);
		let client_authorization = basic_authorization(&config.client_id, &config.client_secret)?;

		Ok(Self { oauth_client, client_authorization, http_client, error_mapper })
	}

	fn handle(&self, meta: ResponseMetadataSlot) -> ClientAuthHandle<C::Handle> {
		ClientAuthHandle {
			inner: self.http_client.with_metadata(meta),
			authorization: self.client_authorization.clone(),
		}
	}

	pub(crate) fn exchange_password<'a>(
		&'a self,
		username: &'a str,
		password: &'a str,
	) -> FacadeFuture<'a, TokenPair> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.handle(meta.clone());
			let username = ResourceOwnerUsername::new(username.to_owned());
			let password = ResourceOwnerPassword::new(password.to_owned());
			let response = self
				.oauth_client
				.exchange_password(&username, &password)
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(GrantType::Password, meta.take(), err, self.error_mapper.as_ref())
				})?;

			map_token_response(response, None)
		})
	}

	pub(crate) fn exchange_refresh_token<'a>(
		&'a self,
		refresh_token: &'a str,
	) -> FacadeFuture<'a, TokenPair> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.handle(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(
						GrantType::RefreshToken,
						meta.take(),
						err,
						self.error_mapper.as_ref(),
					)
				})?;

			map_token_response(response, Some(refresh_token))
		})
	}
}

fn map_token_response(
	response: FacadeTokenResponse,
	previous_refresh: Option<&str>,
) -> Result<TokenPair> {
	let expires_in = response.expires_in().ok_or(TransientError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| TransientError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(TransientError::NonPositiveExpiresIn.into());
	}

	// A refresh grant may omit the refresh token, in which case the old one stays valid.
	let refresh_token = response
		.refresh_token()
		.map(|token| token.secret().to_owned())
		.or_else(|| previous_refresh.map(str::to_owned))
		.ok_or(TransientError::MissingRefreshToken)?;
	let scope = response
		.scopes()
		.map(|scopes| scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" "))
		.unwrap_or_default();

	TokenPair::builder()
		.access_token(response.access_token().secret().to_owned())
		.refresh_token(refresh_token)
		.token_type(response.token_type().as_ref())
		.scope(scope)
		.issued_at(OffsetDateTime::now_utc())
		.expires_in(expires_in)
		.build()
		.map_err(|_| TransientError::NonPositiveExpiresIn.into())
}

fn map_request_error<E, M>(
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();
	let status = meta_status(meta_ref);

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(grant, response, status),
		RequestTokenError::Request(error) => mapper.map_transport_error(grant, meta_ref, error),
		RequestTokenError::Parse(source, body) => match status {
			Some(code) if is_client_error(code) => Error::Unauthorized {
				reason: format!(
					"{grant} grant returned HTTP {code}: {}",
					String::from_utf8_lossy(&body).chars().take(256).collect::<String>()
				),
			},
			_ => TransientError::TokenResponseParse { source, status }.into(),
		},
		RequestTokenError::Other(message) =>
			TransientError::TokenEndpoint { message, status }.into(),
	}
}

// Any OAuth error body from the identity endpoint means the grant itself was refused; for the
// password grant that is bad credentials, for the refresh grant a stale or revoked refresh
// token. Both force a new password-grant login.
fn map_server_response_error(
	grant: GrantType,
	response: BasicErrorResponse,
	status: Option<u16>,
) -> Error {
	let reason = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	match status {
		Some(code) if !is_client_error(code) => TransientError::TokenEndpoint {
			message: format!("{grant} grant failed with HTTP {code}: {reason}"),
			status,
		}
		.into(),
		_ => Error::Unauthorized { reason },
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(grant: GrantType, err: ReqwestError) -> Error {
	let _ = grant;

	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransportError::Timeout { target: "identity" }.into();
	}

	TransportError::network("identity", err).into()
}

fn map_generic_transport_error(meta: Option<&ResponseMetadata>, message: impl Display) -> Error {
	TransientError::TokenEndpoint {
		message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
		status: meta_status(meta),
	}
	.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn is_client_error(status: u16) -> bool {
	(400..500).contains(&status)
}
