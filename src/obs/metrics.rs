// self
use crate::obs::{FlowKind, FlowOutcome};

/// Increments `fhir_remote_relay_flow_total{flow, outcome}` (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"fhir_remote_relay_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Increments `fhir_remote_relay_adapter_replies_total{class}` for one relay POST.
///
/// `status` is `None` when no response arrived.
pub fn record_adapter_reply(status: Option<u16>) {
	let class = reply_class(status);

	#[cfg(feature = "metrics")]
	{
		metrics::counter!("fhir_remote_relay_adapter_replies_total", "class" => class).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = class;
	}
}

fn reply_class(status: Option<u16>) -> &'static str {
	match status {
		None => "transport",
		Some(200..=299) => "2xx",
		Some(400..=499) => "4xx",
		Some(500..=599) => "5xx",
		Some(_) => "other",
	}
}
