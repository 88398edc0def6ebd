//! Remote session orchestration: password-grant login and self-refreshing access tokens.

pub mod common;
pub mod login;
pub mod refresh;

pub use common::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	config::RelayConfig,
	http::TokenHttpClient,
	oauth::{IdentityFacade, TransportErrorMapper},
	store::SessionStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Owns the remote OAuth 2.0 sessions of every principal.
///
/// The broker holds the identity transport, the session store, and one singleflight guard per
/// principal, so concurrent requests of the same principal never refresh the same pair twice.
/// The principal is always passed explicitly; nothing is read from ambient state.
#[derive(Clone)]
pub struct Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Session store holding one token pair per principal.
	pub store: Arc<dyn SessionStore>,
	/// Window before expiry in which a pair is refreshed eagerly.
	pub safety_margin: Duration,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	facade: Arc<IdentityFacade<C, M>>,
	client_id: String,
	flow_guards: Arc<Mutex<HashMap<crate::auth::PrincipalId, Arc<AsyncMutex<()>>>>>,
}
impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: Arc<dyn SessionStore>,
		config: &RelayConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let facade = IdentityFacade::from_config(config, http_client.into(), mapper.into())?;

		Ok(Self {
			store,
			safety_margin: config.safety_margin,
			refresh_metrics: Default::default(),
			facade: Arc::new(facade),
			client_id: config.client_id.clone(),
			flow_guards: Default::default(),
		})
	}

	/// Overrides the safety margin taken from the configuration.
	pub fn with_safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a broker with its own reqwest transport bounded by the configured timeout.
	pub fn new(store: Arc<dyn SessionStore>, config: &RelayConfig) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(config.request_timeout)?;

		Self::with_http_client(store, config, http_client, ReqwestTransportErrorMapper)
	}
}
impl<C, M> Debug for Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("client_id", &self.client_id)
			.field("safety_margin", &self.safety_margin)
			.field("sessions_guarded", &self.flow_guards.lock().len())
			.finish()
	}
}
