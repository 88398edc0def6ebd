//! Post-write relay: forwards the written resource to the adapter and records the outcome.

// crates.io
use oauth2::http::{
	HeaderMap, HeaderValue, Method,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	error::RelayError,
	http::{OutboundRequest, ResourceHttpClient},
	intercept::{
		AdapterErrorPolicy, EnvelopeFactory, LocalResourceClient, LoopGuard, RelayEnvelope,
		RequestContext, ResponseContext,
	},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, log},
};

/// Result of the post-write stage.
#[derive(Debug)]
pub enum RelayOutcome {
	/// Nothing was relayed (loop guard, read-only operation, no resource, or unlinked caller).
	Skipped,
	/// The adapter accepted the resource and the saved marker is set.
	Saved,
	/// The relay POST failed; `proceed` is the error policy's verdict.
	Failed {
		/// Whether the caller still sees success.
		proceed: bool,
		/// Failure reported to the policy.
		error: Error,
	},
}
impl RelayOutcome {
	/// Whether the hosting server should continue with the caller's response.
	pub fn proceed(&self) -> bool {
		match self {
			Self::Skipped | Self::Saved => true,
			Self::Failed { proceed, .. } => *proceed,
		}
	}

	/// Returns `true` only when the adapter accepted the resource.
	pub fn saved_in_remote(&self) -> bool {
		matches!(self, Self::Saved)
	}
}

/// Relays finished writes to the adapter.
#[derive(Clone)]
pub struct RelayDispatcher {
	http: Arc<dyn ResourceHttpClient>,
	envelopes: Arc<dyn EnvelopeFactory>,
	policy: Arc<dyn AdapterErrorPolicy>,
	local: Option<Arc<dyn LocalResourceClient>>,
}
impl RelayDispatcher {
	/// Creates a dispatcher; without a local client the saved marker is only set on the
	/// in-memory response resource.
	pub fn new(
		http: Arc<dyn ResourceHttpClient>,
		envelopes: Arc<dyn EnvelopeFactory>,
		policy: Arc<dyn AdapterErrorPolicy>,
	) -> Self {
		Self { http, envelopes, policy, local: None }
	}

	/// Persists the saved marker through `local` after a successful relay.
	pub fn with_local_client(mut self, local: Arc<dyn LocalResourceClient>) -> Self {
		self.local = Some(local);

		self
	}

	/// Runs the post-write stage for one request.
	///
	/// Errors are only returned for defects that prevent building the envelope; relay
	/// failures are folded into [`RelayOutcome::Failed`].
	pub async fn dispatch(
		&self,
		request: &RequestContext,
		response: &mut ResponseContext,
	) -> Result<RelayOutcome> {
		const KIND: FlowKind = FlowKind::Relay;

		if LoopGuard::should_skip(&request.headers) {
			log::loop_guard_skip(KIND);
			obs::record_flow_outcome(KIND, FlowOutcome::Skipped);

			return Ok(RelayOutcome::Skipped);
		}
		if !request.operation.is_relayed() {
			return Ok(RelayOutcome::Skipped);
		}

		let Some(resource) = response.resource.as_ref() else {
			return Ok(RelayOutcome::Skipped);
		};
		let envelope = self.envelopes.create(request, response, resource)?;
		let Some(url) = envelope.relay_url().transpose()? else {
			obs::record_flow_outcome(KIND, FlowOutcome::Skipped);

			return Ok(RelayOutcome::Skipped);
		};
		let span = FlowSpan::for_resource(
			KIND,
			"dispatch",
			&envelope.resource_type,
			&envelope.resource_id,
		);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		match span.instrument(self.post(url, &envelope, request.authorization())).await {
			Ok(()) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				self.mark_saved(&envelope, request, response).await;

				Ok(RelayOutcome::Saved)
			},
			Err(error) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				log::relay_failed(&envelope, &error);

				let proceed =
					self.policy.handle_adapter_error(&envelope, request, response, &error).await;

				Ok(RelayOutcome::Failed { proceed, error })
			},
		}
	}

	async fn post(
		&self,
		url: Url,
		envelope: &RelayEnvelope,
		authorization: Option<&str>,
	) -> Result<()> {
		let mut headers = HeaderMap::new();

		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		if let Some(value) = authorization.and_then(|value| HeaderValue::from_str(value).ok()) {
			headers.insert(AUTHORIZATION, value);
		}

		let request = OutboundRequest::new(Method::POST, url, "relay")
			.with_headers(headers)
			.with_body(envelope.resource_body.clone());
		let reply = match self.http.send(request).await {
			Ok(reply) => reply,
			Err(e) => {
				obs::record_adapter_reply(None);

				return Err(e.into());
			},
		};

		obs::record_adapter_reply(Some(reply.status));

		if reply.is_success() {
			Ok(())
		} else {
			Err(RelayError { status: reply.status, message: reply.body_preview() }.into())
		}
	}

	async fn mark_saved(
		&self,
		envelope: &RelayEnvelope,
		request: &RequestContext,
		response: &mut ResponseContext,
	) {
		let Some(resource) = response.resource.as_mut() else {
			return;
		};

		resource.set_saved_marker(true);

		let Some(local) = self.local.as_ref() else {
			return;
		};
		let headers = LoopGuard::guarded_headers(request.authorization());

		if let Err(e) = local.update(resource, headers).await {
			log::saved_marker_not_persisted(envelope, &e);
		}
	}
}
impl Debug for RelayDispatcher {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("RelayDispatcher").field("persists_marker", &self.local.is_some()).finish()
	}
}
