//! Shared helpers for session flows (singleflight guards, session state).

// self
use crate::{
	_prelude::*,
	auth::{PrincipalId, TokenPair, TokenStatus},
	flows::Broker,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
};

/// Lifecycle of a principal's remote session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
	/// No pair is bound; a password-grant login is required.
	Unauthenticated,
	/// Pair is usable beyond the safety margin.
	Valid,
	/// Pair is usable but inside the safety margin; the next read refreshes it.
	AboutToExpire,
	/// Pair expired; the next read refreshes it.
	Expired,
}
impl SessionState {
	/// Derives the state from an optional pair at `instant`.
	pub fn of(pair: Option<&TokenPair>, instant: OffsetDateTime, margin: Duration) -> Self {
		match pair.map(|pair| pair.status_at(instant, margin)) {
			None => Self::Unauthenticated,
			Some(TokenStatus::Valid) => Self::Valid,
			Some(TokenStatus::AboutToExpire) => Self::AboutToExpire,
			Some(TokenStatus::Expired) => Self::Expired,
		}
	}
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Reports the session state of `principal` at the current instant.
	pub async fn session_state(&self, principal: &PrincipalId) -> Result<SessionState> {
		let pair = self.store.fetch(principal).await?;

		Ok(SessionState::of(pair.as_ref(), OffsetDateTime::now_utc(), self.safety_margin))
	}

	/// Drops the session of `principal`, returning the pair that was bound.
	pub async fn logout(&self, principal: &PrincipalId) -> Result<Option<TokenPair>> {
		let guard = flow_guard(self, principal);
		let removed = {
			let _singleflight = guard.lock().await;

			self.store.remove(principal).await?
		};

		release_flow_guard(self, principal, guard);

		Ok(removed)
	}
}

/// Returns (and creates on demand) the singleflight guard for a principal.
pub(crate) fn flow_guard<C, M>(broker: &Broker<C, M>, principal: &PrincipalId) -> Arc<AsyncMutex<()>>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let mut guards = broker.flow_guards.lock();

	guards.entry(principal.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}

/// Drops the guard entry of `principal` once `guard` is its last holder besides the map.
pub(crate) fn release_flow_guard<C, M>(
	broker: &Broker<C, M>,
	principal: &PrincipalId,
	guard: Arc<AsyncMutex<()>>,
) where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let mut guards = broker.flow_guards.lock();

	// Clones are only handed out under the map lock, so the count cannot grow here.
	if guards.get(principal).is_some_and(|entry| Arc::ptr_eq(entry, &guard))
		&& Arc::strong_count(&guard) == 2
	{
		guards.remove(principal);
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	#[cfg(feature = "reqwest")]
	use crate::{config::RelayConfig, store::MemoryStore};

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn logout_releases_the_principal_guard() {
		let base = Url::parse("http://127.0.0.1:9").expect("URL fixture should parse.");
		let config = RelayConfig::new(base.clone(), base, "relay-client", "relay-secret");
		let broker = Broker::new(Arc::new(MemoryStore::default()), &config)
			.expect("Broker should build from a valid configuration.");
		let alice = PrincipalId::new("alice").expect("Principal fixture should be valid.");
		let bob = PrincipalId::new("bob").expect("Principal fixture should be valid.");
		let held = flow_guard(&broker, &bob);

		drop(flow_guard(&broker, &alice));

		assert_eq!(broker.flow_guards.lock().len(), 2);

		broker.logout(&alice).await.expect("Logout should succeed.");
		broker.logout(&bob).await.expect("Logout should succeed.");

		let guards = broker.flow_guards.lock();

		assert!(!guards.contains_key("alice"), "Idle guards should be dropped on logout.");
		assert!(guards.contains_key("bob"), "Guards still held elsewhere must survive.");
		assert!(Arc::ptr_eq(&guards["bob"], &held));
	}

	#[test]
	fn session_state_follows_pair_status() {
		let t0 = macros::datetime!(2025-06-01 08:00 UTC);
		let margin = Duration::seconds(60);
		let pair = TokenPair::builder()
			.access_token("access")
			.refresh_token("refresh")
			.issued_at(t0)
			.expires_in(300)
			.build()
			.expect("Token pair fixture should build.");

		assert_eq!(SessionState::of(None, t0, margin), SessionState::Unauthenticated);
		assert_eq!(SessionState::of(Some(&pair), t0, margin), SessionState::Valid);
		assert_eq!(
			SessionState::of(Some(&pair), t0 + Duration::seconds(241), margin),
			SessionState::AboutToExpire
		);
		assert_eq!(
			SessionState::of(Some(&pair), t0 + Duration::seconds(300), margin),
			SessionState::Expired
		);
	}
}
