//! Structured log events emitted by the pipeline (no-ops without the `tracing` feature).

// self
use crate::{_prelude::*, intercept::RelayEnvelope, obs::FlowKind};

/// A stage stepped aside because the request carries the loop-guard header.
pub fn loop_guard_skip(stage: FlowKind) {
	#[cfg(feature = "tracing")]
	tracing::debug!(stage = stage.as_str(), "Loop-guard header present; stage skipped.");
	#[cfg(not(feature = "tracing"))]
	let _ = stage;
}

/// A pre-check rejected the request before the local write.
pub fn pre_check_rejected(err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(error = %err, "Pre-check rejected the write request.");
	#[cfg(not(feature = "tracing"))]
	let _ = err;
}

/// The internal read found no server-side copy to snapshot.
pub fn snapshot_missing(resource_type: &str, id: &str) {
	#[cfg(feature = "tracing")]
	tracing::debug!(resource_type, id, "No server-side copy found; snapshot not stored.");
	#[cfg(not(feature = "tracing"))]
	let _ = (resource_type, id);
}

/// The relay POST failed and the error policy is about to decide the outcome.
pub fn relay_failed(envelope: &RelayEnvelope, err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::error!(
		resource_type = envelope.resource_type.as_str(),
		resource_id = envelope.resource_id.as_str(),
		client_id = envelope.client_id.as_str(),
		error = %err,
		"Error saving a resource in the remote system."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (envelope, err);
}

/// The relay succeeded but the saved marker could not be written back locally.
pub fn saved_marker_not_persisted(envelope: &RelayEnvelope, err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		resource_type = envelope.resource_type.as_str(),
		resource_id = envelope.resource_id.as_str(),
		error = %err,
		"Relay succeeded but the saved marker was not persisted."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (envelope, err);
}
