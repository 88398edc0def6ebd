// self
use crate::{_prelude::*, obs::FlowKind};

/// Future returned by [`FlowSpan::instrument`]; plain `F` without the `tracing` feature.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; plain `F` without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// `fhir_remote_relay.flow` span around one token flow or pipeline stage.
///
/// Pipeline stages that act on a single FHIR resource (snapshot read, relay POST) attach
/// `resource_type` and `resource_id` so every outbound call can be traced back to the write
/// that caused it.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Span tagged with `kind` and `stage` only.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"fhir_remote_relay.flow",
				flow = kind.as_str(),
				stage,
				resource_type = tracing::field::Empty,
				resource_id = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Span for a stage acting on `resource_type/resource_id`.
	pub fn for_resource(
		kind: FlowKind,
		stage: &'static str,
		resource_type: &str,
		resource_id: &str,
	) -> Self {
		let span = Self::new(kind, stage);

		#[cfg(feature = "tracing")]
		{
			span.span.record("resource_type", resource_type);
			span.span.record("resource_id", resource_id);
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (resource_type, resource_id);
		}

		span
	}

	/// Runs `fut` inside the span; no guard is held across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn relay_span_passes_the_post_result_through() {
		let span = FlowSpan::for_resource(FlowKind::Relay, "dispatch", "Observation", "obs-1");
		let status = span.instrument(async { 201_u16 }).await;

		assert_eq!(status, 201);
	}

	#[tokio::test]
	async fn snapshot_span_can_wrap_a_failed_read() {
		let span = FlowSpan::for_resource(FlowKind::Snapshot, "pre_handle", "Patient", "p-1");
		let read: Result<Option<Value>> =
			span.instrument(async { Err(Error::InvalidResource { reason: "gone".into() }) }).await;

		assert!(matches!(read, Err(Error::InvalidResource { .. })));
	}
}
