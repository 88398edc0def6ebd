//! Observability helpers for token flows and pipeline stages.
//!
//! # Feature Flags
//!
//! - `tracing` (default) emits spans named `fhir_remote_relay.flow` with the `flow` and `stage`
//!   fields, plus the log events in [`log`].
//! - `metrics` increments the `fhir_remote_relay_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and
//!   `fhir_remote_relay_adapter_replies_total` for every relay POST, labeled by status `class`.

pub mod log;

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flows and pipeline stages observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Password-grant login.
	Login,
	/// Refresh-grant exchange or cached-token read.
	Refresh,
	/// Adapter authorization/liveness pre-check.
	PreCheck,
	/// Pre-update snapshot capture.
	Snapshot,
	/// Post-write relay to the adapter.
	Relay,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Login => "login",
			FlowKind::Refresh => "refresh",
			FlowKind::PreCheck => "pre_check",
			FlowKind::Snapshot => "snapshot",
			FlowKind::Relay => "relay",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow or stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller or handed to a policy.
	Failure,
	/// Stage skipped (loop guard, no binding, nothing to do).
	Skipped,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Skipped => "skipped",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
