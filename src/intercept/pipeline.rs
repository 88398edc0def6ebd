//! The interception pipeline: gate, pre-check, snapshot, local write, relay.

// self
use crate::{
	_prelude::*,
	config::{Capabilities, RelayConfig},
	error::ConfigError,
	http::ResourceHttpClient,
	intercept::{
		AdapterErrorPolicy, AdapterProbe, AuthorizationGate, BindingEnvelopeFactory,
		EnvelopeFactory, HttpAdapterProbe, LocalResourceClient, LoopGuard, RESOURCE_BEFORE_UPDATE,
		RelayDispatcher, RelayOutcome, RequestContext, ResponseContext, RestLocalClient,
		RestOperation,
	},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, log},
};

/// Wraps a local FHIR write with the relay stages.
///
/// Order per request: authorization gate, [`Interceptor::pre_check`],
/// [`Interceptor::pre_handle`], the local write, then [`Interceptor::relay`].
/// [`Interceptor::process`] runs all of them around a caller-supplied write.
#[derive(Clone)]
pub struct Interceptor {
	capabilities: Capabilities,
	gate: Option<AuthorizationGate>,
	probe: Option<Arc<dyn AdapterProbe>>,
	local: Option<Arc<dyn LocalResourceClient>>,
	dispatcher: RelayDispatcher,
}
impl Interceptor {
	/// Starts a builder around the relay transport, envelope factory, and error policy.
	pub fn builder(
		http: Arc<dyn ResourceHttpClient>,
		envelopes: Arc<dyn EnvelopeFactory>,
		policy: Arc<dyn AdapterErrorPolicy>,
	) -> InterceptorBuilder {
		InterceptorBuilder::new(http, envelopes, policy)
	}

	/// Wires the default components from `config`: binding-based envelopes, an HTTP adapter
	/// probe for whichever adapter URLs are set, and a REST local client when
	/// `local_base_url` is set.
	pub fn from_config(
		config: &RelayConfig,
		http: Arc<dyn ResourceHttpClient>,
		policy: Arc<dyn AdapterErrorPolicy>,
	) -> Result<Self, ConfigError> {
		let envelopes = Arc::new(BindingEnvelopeFactory::new(config.remote_base_url.clone()));
		let mut builder =
			Self::builder(http.clone(), envelopes, policy).capabilities(config.capabilities);

		if config.adapter_health_url.is_some() || config.adapter_authorization_url.is_some() {
			let mut probe = HttpAdapterProbe::new(http.clone());

			if let Some(url) = config.adapter_health_url.clone() {
				probe = probe.with_health_url(url);
			}
			if let Some(url) = config.adapter_authorization_url.clone() {
				probe = probe.with_authorization_url(url);
			}

			builder = builder.probe(Arc::new(probe));
		}
		if let Some(base) = config.local_base_url.clone() {
			builder = builder.local_client(Arc::new(RestLocalClient::new(base, http)));
		}

		builder.build()
	}

	/// Capability toggles in effect.
	pub fn capabilities(&self) -> Capabilities {
		self.capabilities
	}

	/// Evaluates the authorization gate, if one is installed.
	///
	/// The gate runs even for loop-guarded requests, so the marker cannot be used to skip
	/// authorization.
	pub async fn authorize(&self, request: &RequestContext) -> Result<()> {
		match &self.gate {
			Some(gate) => gate.build_rule_list(request.authorization()).await.enforce(),
			None => Ok(()),
		}
	}

	/// Asks the adapter whether a create or update may go ahead.
	///
	/// The authorization check takes precedence over the liveness check; at most one runs.
	pub async fn pre_check(&self, request: &RequestContext) -> Result<()> {
		const KIND: FlowKind = FlowKind::PreCheck;

		if LoopGuard::should_skip(&request.headers) {
			log::loop_guard_skip(KIND);
			obs::record_flow_outcome(KIND, FlowOutcome::Skipped);

			return Ok(());
		}
		if !request.operation.is_relayed() {
			return Ok(());
		}

		let Some(probe) = self.probe.as_ref() else {
			return Ok(());
		};
		let span = FlowSpan::new(KIND, "pre_check");
		let result = span
			.instrument(async {
				if self.capabilities.check_if_authorized_by_adapter {
					if !probe.is_authorized_by_adapter(request.authorization()).await {
						return Err(Error::AdapterUnauthorized);
					}
				} else if self.capabilities.check_if_adapter_is_running
					&& !probe.is_adapter_running().await
				{
					return Err(Error::AdapterUnavailable);
				}

				Ok(())
			})
			.await;

		match &result {
			Ok(()) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				log::pre_check_rejected(e);
			},
		}

		result
	}

	/// Prepares the in-flight resource before the local write.
	///
	/// Create and update requests get the saved marker reset to `false`. Updates also get
	/// the server-side copy stashed under [`RESOURCE_BEFORE_UPDATE`] when that capability is
	/// on and a copy exists.
	pub async fn pre_handle(&self, request: &mut RequestContext) -> Result<()> {
		const KIND: FlowKind = FlowKind::Snapshot;

		if LoopGuard::should_skip(&request.headers) {
			log::loop_guard_skip(KIND);

			return Ok(());
		}
		if !request.operation.is_relayed() {
			return Ok(());
		}
		if let Some(resource) = request.resource.as_mut() {
			resource.set_saved_marker(false);
		}
		if request.operation != RestOperation::Update
			|| !self.capabilities.store_resource_before_update
		{
			return Ok(());
		}

		let Some(local) = self.local.as_ref() else {
			return Ok(());
		};
		let (resource_type, id) = match request.resource.as_ref() {
			Some(resource) => (
				request
					.resource_name
					.clone()
					.or_else(|| resource.resource_type().map(str::to_owned)),
				resource.id().map(str::to_owned),
			),
			None => (request.resource_name.clone(), None),
		};
		let (Some(resource_type), Some(id)) = (resource_type, id) else {
			return Err(Error::InvalidResource {
				reason: "Update request carries no resource id.".into(),
			});
		};
		let headers = LoopGuard::guarded_headers(request.authorization());
		let span = FlowSpan::for_resource(KIND, "pre_handle", &resource_type, &id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let found = span.instrument(local.search_by_id(&resource_type, &id, headers)).await;
		let found = match found {
			Ok(found) => found,
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				return Err(e);
			},
		};

		match found {
			Some(existing) => {
				request.user_data.insert(RESOURCE_BEFORE_UPDATE.into(), existing.into_value());
			},
			None => log::snapshot_missing(&resource_type, &id),
		}

		obs::record_flow_outcome(KIND, FlowOutcome::Success);

		Ok(())
	}

	/// Relays the written resource; see [`RelayDispatcher::dispatch`].
	pub async fn relay(
		&self,
		request: &RequestContext,
		response: &mut ResponseContext,
	) -> Result<RelayOutcome> {
		self.dispatcher.dispatch(request, response).await
	}

	/// Runs every stage around `write`, the hosting server's local persistence call.
	///
	/// Gate, pre-check, and snapshot failures abort before `write` runs. A `write` failure
	/// is returned as-is and nothing is relayed.
	pub async fn process<F, Fut>(&self, mut request: RequestContext, write: F) -> Result<Processed>
	where
		F: FnOnce(RequestContext) -> Fut,
		Fut: Future<Output = Result<ResponseContext>>,
	{
		self.authorize(&request).await?;
		self.pre_check(&request).await?;
		self.pre_handle(&mut request).await?;

		let mut response = write(request.clone()).await?;
		let relay = self.relay(&request, &mut response).await?;

		Ok(Processed { request, response, relay })
	}
}
impl Debug for Interceptor {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("Interceptor")
			.field("capabilities", &self.capabilities)
			.field("gate", &self.gate.is_some())
			.field("probe", &self.probe.is_some())
			.field("local", &self.local.is_some())
			.field("dispatcher", &self.dispatcher)
			.finish()
	}
}

/// Builder for [`Interceptor`] values.
pub struct InterceptorBuilder {
	http: Arc<dyn ResourceHttpClient>,
	envelopes: Arc<dyn EnvelopeFactory>,
	policy: Arc<dyn AdapterErrorPolicy>,
	capabilities: Capabilities,
	gate: Option<AuthorizationGate>,
	probe: Option<Arc<dyn AdapterProbe>>,
	local: Option<Arc<dyn LocalResourceClient>>,
}
impl InterceptorBuilder {
	/// Creates a builder with every capability off.
	pub fn new(
		http: Arc<dyn ResourceHttpClient>,
		envelopes: Arc<dyn EnvelopeFactory>,
		policy: Arc<dyn AdapterErrorPolicy>,
	) -> Self {
		Self {
			http,
			envelopes,
			policy,
			capabilities: Capabilities::default(),
			gate: None,
			probe: None,
			local: None,
		}
	}

	/// Sets the capability toggles.
	pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
		self.capabilities = capabilities;

		self
	}

	/// Installs the authorization gate.
	pub fn gate(mut self, gate: AuthorizationGate) -> Self {
		self.gate = Some(gate);

		self
	}

	/// Installs the adapter probe used by the pre-check.
	pub fn probe(mut self, probe: Arc<dyn AdapterProbe>) -> Self {
		self.probe = Some(probe);

		self
	}

	/// Installs the local client used for snapshots and saved-marker writes.
	pub fn local_client(mut self, local: Arc<dyn LocalResourceClient>) -> Self {
		self.local = Some(local);

		self
	}

	/// Validates that every enabled capability has the component it needs.
	pub fn build(self) -> Result<Interceptor, ConfigError> {
		let Capabilities {
			check_if_authorized_by_adapter,
			store_resource_before_update,
			check_if_adapter_is_running,
		} = self.capabilities;

		if (check_if_authorized_by_adapter || check_if_adapter_is_running) && self.probe.is_none() {
			return Err(ConfigError::Missing { key: "adapter_probe" });
		}
		if store_resource_before_update && self.local.is_none() {
			return Err(ConfigError::Missing { key: "local_base_url" });
		}

		let mut dispatcher = RelayDispatcher::new(self.http, self.envelopes, self.policy);

		if let Some(local) = self.local.clone() {
			dispatcher = dispatcher.with_local_client(local);
		}

		Ok(Interceptor {
			capabilities: self.capabilities,
			gate: self.gate,
			probe: self.probe,
			local: self.local,
			dispatcher,
		})
	}
}
impl Debug for InterceptorBuilder {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("InterceptorBuilder")
			.field("capabilities", &self.capabilities)
			.finish_non_exhaustive()
	}
}

/// Everything [`Interceptor::process`] produced for one request.
#[derive(Debug)]
pub struct Processed {
	/// Request after the pre-write stages (marker reset, snapshot stored).
	pub request: RequestContext,
	/// Response after the relay (marker set on success).
	pub response: ResponseContext,
	/// Relay outcome.
	pub relay: RelayOutcome,
}
impl Processed {
	/// Whether the hosting server should answer the caller with the write's success.
	pub fn proceed(&self) -> bool {
		self.relay.proceed()
	}
}
