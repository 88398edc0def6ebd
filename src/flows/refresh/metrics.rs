// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for token reads and refresh-grant exchanges.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	grant_calls: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of token reads.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of successful reads (cached or refreshed).
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed reads.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh-grant exchanges sent to the identity endpoint.
	pub fn grant_calls(&self) -> u64 {
		self.grant_calls.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_grant_call(&self) {
		self.grant_calls.fetch_add(1, Ordering::Relaxed);
	}
}
