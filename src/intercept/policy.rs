//! Deployment-supplied decision on what a failed relay means for the caller.

// self
use crate::{
	_prelude::*,
	intercept::{HookFuture, RelayEnvelope, RequestContext, ResponseContext},
};

/// Decides whether the caller still sees success after the relay POST failed.
///
/// Implementations may log, queue the envelope for an out-of-band retry, or flag the
/// resource; the pipeline only honors the returned boolean (`true` = proceed).
pub trait AdapterErrorPolicy
where
	Self: Send + Sync,
{
	/// Handles a failed relay of `envelope`.
	fn handle_adapter_error<'a>(
		&'a self,
		envelope: &'a RelayEnvelope,
		request: &'a RequestContext,
		response: &'a ResponseContext,
		error: &'a Error,
	) -> HookFuture<'a, bool>;
}
impl<F> AdapterErrorPolicy for F
where
	F: Fn(&RelayEnvelope, &RequestContext, &ResponseContext, &Error) -> bool + Send + Sync,
{
	fn handle_adapter_error<'a>(
		&'a self,
		envelope: &'a RelayEnvelope,
		request: &'a RequestContext,
		response: &'a ResponseContext,
		error: &'a Error,
	) -> HookFuture<'a, bool> {
		let proceed = self(envelope, request, response, error);

		Box::pin(async move { proceed })
	}
}
