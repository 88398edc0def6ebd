//! Thread-safe in-memory [`SessionStore`] implementation.

// self
use crate::{
	_prelude::*,
	auth::{PrincipalId, TokenPair},
	store::{CompareAndSwapOutcome, SessionStore, StoreError, StoreFuture},
};

type SessionMap = Arc<RwLock<HashMap<PrincipalId, TokenPair>>>;

/// Process-local session store; pairs vanish with the process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SessionMap);
impl MemoryStore {
	/// Number of principals with a bound pair.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no principal has a bound pair.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn cas_now(
		map: &SessionMap,
		principal: &PrincipalId,
		expected_refresh: &str,
		replacement: TokenPair,
	) -> CompareAndSwapOutcome {
		let mut guard = map.write();
		let outcome = match guard.get(principal) {
			Some(existing) if existing.refresh_token.matches(expected_refresh) =>
				CompareAndSwapOutcome::Updated,
			Some(_) => CompareAndSwapOutcome::RefreshMismatch,
			None => CompareAndSwapOutcome::Missing,
		};

		if matches!(outcome, CompareAndSwapOutcome::Updated) {
			guard.insert(principal.clone(), replacement);
		}

		outcome
	}
}
impl SessionStore for MemoryStore {
	fn save<'a>(&'a self, principal: &'a PrincipalId, pair: TokenPair) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.0.write().insert(principal.clone(), pair);

			Ok::<_, StoreError>(())
		})
	}

	fn fetch<'a>(&'a self, principal: &'a PrincipalId) -> StoreFuture<'a, Option<TokenPair>> {
		Box::pin(async move { Ok(self.0.read().get(principal).cloned()) })
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		principal: &'a PrincipalId,
		expected_refresh: &'a str,
		replacement: TokenPair,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move { Ok(Self::cas_now(&self.0, principal, expected_refresh, replacement)) })
	}

	fn remove<'a>(&'a self, principal: &'a PrincipalId) -> StoreFuture<'a, Option<TokenPair>> {
		Box::pin(async move { Ok(self.0.write().remove(principal)) })
	}
}
