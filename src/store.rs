//! Storage contracts and the built-in in-memory store for per-principal token pairs.

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{PrincipalId, TokenPair},
};

/// Boxed future returned by [`SessionStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Session backend holding one [`TokenPair`] per principal.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Binds (or replaces) the pair for `principal`.
	fn save<'a>(&'a self, principal: &'a PrincipalId, pair: TokenPair) -> StoreFuture<'a, ()>;

	/// Fetches the pair bound to `principal`, if any.
	fn fetch<'a>(&'a self, principal: &'a PrincipalId) -> StoreFuture<'a, Option<TokenPair>>;

	/// Atomically swaps the pair if the stored refresh secret still equals `expected_refresh`.
	fn compare_and_swap_refresh<'a>(
		&'a self,
		principal: &'a PrincipalId,
		expected_refresh: &'a str,
		replacement: TokenPair,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;

	/// Drops the pair bound to `principal`, returning it when present.
	fn remove<'a>(&'a self, principal: &'a PrincipalId) -> StoreFuture<'a, Option<TokenPair>>;
}

/// Result of a refresh-token compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The refresh secret matched the expected value and the pair was replaced.
	Updated,
	/// A pair exists but its refresh secret no longer matches.
	RefreshMismatch,
	/// No pair is bound to the principal.
	Missing,
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
