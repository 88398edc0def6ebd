//! Password-grant login binding a fresh token pair to a principal.

// self
use crate::{
	_prelude::*,
	auth::{PrincipalId, TokenPair},
	flows::{Broker, common},
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges `username`/`password` for a new pair and binds it to `principal`.
	///
	/// Rejected credentials surface as [`Error::Unauthorized`]; network failures as
	/// [`Error::Transport`]. Any previously bound pair is replaced wholesale.
	pub async fn login(
		&self,
		principal: &PrincipalId,
		username: &str,
		password: &str,
	) -> Result<TokenPair> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let guard = common::flow_guard(self, principal);
				let _singleflight = guard.lock().await;
				let pair = self.facade.exchange_password(username, password).await?;

				self.store.save(principal, pair.clone()).await?;

				Ok(pair)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
