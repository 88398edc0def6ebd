//! Refresh-grant orchestration with singleflight guards and compare-and-swap rotation.
//!
//! [`Broker::current_access_token`] is the single read/refresh entry point for outbound calls
//! that need a fresh bearer token. Each call acquires the per-principal guard, re-reads the
//! stored pair, and only performs a `grant_type=refresh_token` exchange when the pair is
//! expired or inside the safety margin. Callers that queued behind an in-flight refresh
//! observe the rotated pair and return without contacting the identity endpoint.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{PrincipalId, TokenPair, TokenSecret},
	flows::{Broker, common},
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::CompareAndSwapOutcome,
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Performs a raw refresh-grant exchange without touching the session store.
	///
	/// A rejected refresh token surfaces as [`Error::Unauthorized`] so callers re-login.
	pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
		self.refresh_metrics.record_grant_call();
		self.facade.exchange_refresh_token(refresh_token).await
	}

	/// Returns the access token bound to `principal`, refreshing it first when it is expired
	/// or about to expire.
	pub async fn current_access_token(&self, principal: &PrincipalId) -> Result<TokenSecret> {
		self.current_pair(principal).await.map(|pair| pair.access_token)
	}

	/// Same as [`Broker::current_access_token`] but yields the whole pair.
	pub async fn current_pair(&self, principal: &PrincipalId) -> Result<TokenPair> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "current_pair");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		let result = span.instrument(self.refresh_under_guard(principal)).await;

		match &result {
			Ok(_) => {
				self.refresh_metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(_) => {
				self.refresh_metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	async fn refresh_under_guard(&self, principal: &PrincipalId) -> Result<TokenPair> {
		let guard = common::flow_guard(self, principal);
		let _singleflight = guard.lock().await;
		let current = self
			.store
			.fetch(principal)
			.await?
			.ok_or_else(|| Error::NotAuthenticated { principal: principal.to_string() })?;

		if !current.status(self.safety_margin).needs_refresh() {
			return Ok(current);
		}

		let expected_refresh = current.refresh_token.expose().to_owned();
		let refreshed = self.refresh(&expected_refresh).await?;
		let outcome = self
			.store
			.compare_and_swap_refresh(principal, &expected_refresh, refreshed.clone())
			.await?;

		match outcome {
			CompareAndSwapOutcome::Updated => Ok(refreshed),
			// The session was dropped while the exchange was in flight; keep it dropped.
			CompareAndSwapOutcome::Missing =>
				Err(Error::NotAuthenticated { principal: principal.to_string() }),
			// A concurrent login replaced the pair; its tokens win.
			CompareAndSwapOutcome::RefreshMismatch => match self.store.fetch(principal).await? {
				Some(existing) => Ok(existing),
				None => Err(Error::NotAuthenticated { principal: principal.to_string() }),
			},
		}
	}
}
