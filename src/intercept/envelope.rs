//! Relay envelope and its factory.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	intercept::{RequestContext, Resource, ResponseContext},
};

/// Relay path segment between the adapter base URL and the client identifiers.
pub const RELAY_PATH: &str = "remote-fhir-express";

/// Everything the relay POST needs about one written resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayEnvelope {
	/// FHIR type of the resource.
	pub resource_type: String,
	/// Logical id assigned by the local server.
	pub resource_id: String,
	/// Serialized JSON body to forward.
	pub resource_body: String,
	/// Adapter client identifier.
	pub client_id: String,
	/// Remote-side resource id; absent or empty means the request is not relayed.
	pub client_resource_id: Option<String>,
	/// Adapter base URL.
	pub base_url: Url,
}
impl RelayEnvelope {
	/// `{base}/remote-fhir-express/{clientId}/{clientResourceId}/{type}/{id}`.
	///
	/// Returns `None` when the client id or the client resource id is absent or empty.
	pub fn relay_url(&self) -> Option<Result<Url>> {
		let client_resource_id = self.client_resource_id.as_deref().filter(|id| !id.is_empty())?;
		let client_id = Some(self.client_id.as_str()).filter(|id| !id.is_empty())?;
		let raw = format!(
			"{}/{RELAY_PATH}/{client_id}/{client_resource_id}/{}/{}",
			self.base_url.as_str().trim_end_matches('/'),
			self.resource_type,
			self.resource_id,
		);

		Some(Url::parse(&raw).map_err(|e| ConfigError::invalid_url(raw, e).into()))
	}
}

/// Builds a [`RelayEnvelope`] from a finished write.
pub trait EnvelopeFactory
where
	Self: Send + Sync,
{
	/// Describes `resource` (the written copy) in the context of `request`/`response`.
	fn create(
		&self,
		request: &RequestContext,
		response: &ResponseContext,
		resource: &Resource,
	) -> Result<RelayEnvelope>;
}

/// Default factory: identifiers from the request's [`ClientBinding`](crate::intercept::ClientBinding),
/// type and id from the written resource.
#[derive(Clone, Debug)]
pub struct BindingEnvelopeFactory {
	base_url: Url,
}
impl BindingEnvelopeFactory {
	/// Creates a factory targeting the adapter at `base_url`.
	pub fn new(base_url: Url) -> Self {
		Self { base_url }
	}
}
impl EnvelopeFactory for BindingEnvelopeFactory {
	fn create(
		&self,
		request: &RequestContext,
		_: &ResponseContext,
		resource: &Resource,
	) -> Result<RelayEnvelope> {
		let resource_type = resource
			.resource_type()
			.or(request.resource_name.as_deref())
			.ok_or_else(|| Error::InvalidResource { reason: "resourceType is missing".into() })?;
		let resource_id = resource
			.id()
			.ok_or_else(|| Error::InvalidResource { reason: "written resource has no id".into() })?;
		let (client_id, client_resource_id) = match &request.binding {
			Some(binding) => (binding.client_id.clone(), binding.client_resource_id.clone()),
			None => (String::new(), None),
		};

		Ok(RelayEnvelope {
			resource_type: resource_type.to_owned(),
			resource_id: resource_id.to_owned(),
			resource_body: resource.to_json()?,
			client_id,
			client_resource_id,
			base_url: self.base_url.clone(),
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::intercept::{ClientBinding, RestOperation};

	fn factory() -> BindingEnvelopeFactory {
		BindingEnvelopeFactory::new(
			Url::parse("https://adapter.example.org/").expect("URL fixture should parse."),
		)
	}

	fn written() -> Resource {
		Resource::new(json!({ "resourceType": "Observation", "id": "obs-7" }))
			.expect("Observation fixture should be valid.")
	}

	#[test]
	fn relay_url_joins_all_segments() {
		let request = RequestContext::new(RestOperation::Create)
			.with_binding(ClientBinding::linked("client-a", "remote-9"));
		let envelope = factory()
			.create(&request, &ResponseContext::new(201, None), &written())
			.expect("Envelope should build.");
		let url = envelope
			.relay_url()
			.expect("Linked envelope should have a URL.")
			.expect("Relay URL should parse.");

		assert_eq!(
			url.as_str(),
			"https://adapter.example.org/remote-fhir-express/client-a/remote-9/Observation/obs-7"
		);
		assert_eq!(envelope.resource_body, r#"{"id":"obs-7","resourceType":"Observation"}"#);
	}

	#[test]
	fn unbound_request_has_no_relay_url() {
		let envelope = factory()
			.create(
				&RequestContext::new(RestOperation::Create),
				&ResponseContext::new(201, None),
				&written(),
			)
			.expect("Envelope should build.");

		assert!(envelope.relay_url().is_none());
	}

	#[test]
	fn empty_binding_identifiers_have_no_relay_url() {
		for binding in [ClientBinding::linked("client-a", ""), ClientBinding::linked("", "remote-9")] {
			let request = RequestContext::new(RestOperation::Create).with_binding(binding);
			let envelope = factory()
				.create(&request, &ResponseContext::new(201, None), &written())
				.expect("Envelope should build.");

			assert!(envelope.relay_url().is_none(), "{envelope:?} should not be relayed.");
		}
	}

	#[test]
	fn written_resource_without_id_is_rejected() {
		let resource =
			Resource::new(json!({ "resourceType": "Patient" })).expect("Fixture should be valid.");
		let err = factory()
			.create(
				&RequestContext::new(RestOperation::Create),
				&ResponseContext::new(201, None),
				&resource,
			)
			.expect_err("Missing id should be rejected.");

		assert!(matches!(err, Error::InvalidResource { .. }));
	}
}
