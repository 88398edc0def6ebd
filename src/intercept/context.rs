//! Request/response context carried through the pipeline and the FHIR resource wrapper.

// crates.io
use oauth2::http::{HeaderMap, header::AUTHORIZATION};
use serde_json::Map;
// self
use crate::_prelude::*;

/// User-data key under which the pre-update snapshot is stored.
pub const RESOURCE_BEFORE_UPDATE: &str = "resource_before_update";

/// REST interaction resolved by the hosting server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestOperation {
	/// `POST [type]`.
	Create,
	/// `PUT [type]/[id]`.
	Update,
	/// `PATCH [type]/[id]`.
	Patch,
	/// `GET [type]/[id]`.
	Read,
	/// `GET [type]?...`.
	Search,
	/// `DELETE [type]/[id]`.
	Delete,
	/// Any other interaction (history, operations, metadata, ...).
	Other,
}
impl RestOperation {
	/// Returns `true` for the interactions the pipeline mirrors (create and update).
	pub fn is_relayed(self) -> bool {
		matches!(self, Self::Create | Self::Update)
	}
}

/// JSON FHIR resource; the pipeline only touches `resourceType`, `id`, and `extension`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(Value);
impl Resource {
	/// Extension URL of the marker recording whether the resource reached the remote system.
	pub const SAVED_EXTENSION_URL: &str =
		"https://fhir-remote-relay.dev/StructureDefinition/saved-in-remote";

	/// Wraps a JSON object carrying a string `resourceType`.
	pub fn new(value: Value) -> Result<Self> {
		match value.get("resourceType") {
			Some(Value::String(_)) => Ok(Self(value)),
			_ => Err(Error::InvalidResource { reason: "resourceType is missing".into() }),
		}
	}

	/// Parses a resource from its JSON text.
	pub fn from_json(text: &str) -> Result<Self> {
		let value = serde_json::from_str(text)
			.map_err(|e| Error::InvalidResource { reason: e.to_string() })?;

		Self::new(value)
	}

	/// `resourceType` of the resource.
	pub fn resource_type(&self) -> Option<&str> {
		self.0.get("resourceType").and_then(Value::as_str)
	}

	/// Logical id, if assigned.
	pub fn id(&self) -> Option<&str> {
		self.0.get("id").and_then(Value::as_str)
	}

	/// Current value of the saved marker, if present.
	pub fn saved_marker(&self) -> Option<bool> {
		self.0
			.get("extension")
			.and_then(Value::as_array)?
			.iter()
			.find(|ext| ext.get("url").and_then(Value::as_str) == Some(Self::SAVED_EXTENSION_URL))
			.and_then(|ext| ext.get("valueBoolean"))
			.and_then(Value::as_bool)
	}

	/// Sets (or adds) the saved marker extension.
	pub fn set_saved_marker(&mut self, saved: bool) {
		let Some(object) = self.0.as_object_mut() else {
			return;
		};
		let extensions = object.entry("extension").or_insert_with(|| Value::Array(Vec::new()));

		if !extensions.is_array() {
			*extensions = Value::Array(Vec::new());
		}

		let Some(extensions) = extensions.as_array_mut() else {
			return;
		};
		let existing = extensions.iter_mut().find(|ext| {
			ext.get("url").and_then(Value::as_str) == Some(Self::SAVED_EXTENSION_URL)
		});

		match existing {
			Some(Value::Object(ext)) => {
				ext.insert("valueBoolean".into(), Value::Bool(saved));
			},
			_ => {
				let mut ext = Map::new();

				ext.insert("url".into(), Value::String(Self::SAVED_EXTENSION_URL.into()));
				ext.insert("valueBoolean".into(), Value::Bool(saved));
				extensions.push(Value::Object(ext));
			},
		}
	}

	/// Serializes the resource to compact JSON.
	pub fn to_json(&self) -> Result<String> {
		serde_json::to_string(&self.0).map_err(|e| Error::InvalidResource { reason: e.to_string() })
	}

	/// Borrows the underlying JSON value.
	pub fn as_value(&self) -> &Value {
		&self.0
	}

	/// Returns the underlying JSON value.
	pub fn into_value(self) -> Value {
		self.0
	}
}

/// Remote identity of the principal issuing the request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientBinding {
	/// Adapter client identifier.
	pub client_id: String,
	/// Remote-side resource id linked to the principal; absent means "do not relay".
	pub client_resource_id: Option<String>,
}
impl ClientBinding {
	/// Creates a binding linked to a remote resource.
	pub fn linked(client_id: impl Into<String>, client_resource_id: impl Into<String>) -> Self {
		Self { client_id: client_id.into(), client_resource_id: Some(client_resource_id.into()) }
	}
}

/// Inbound request as seen by the pipeline.
#[derive(Clone, Debug)]
pub struct RequestContext {
	/// Resolved REST interaction.
	pub operation: RestOperation,
	/// Resource type named in the request path.
	pub resource_name: Option<String>,
	/// Inbound request headers.
	pub headers: HeaderMap,
	/// Resource carried by the request body.
	pub resource: Option<Resource>,
	/// Remote binding of the calling principal.
	pub binding: Option<ClientBinding>,
	/// Per-request scratch space shared between stages and the hosting server.
	pub user_data: HashMap<String, Value>,
}
impl RequestContext {
	/// Creates a context for `operation` with empty headers.
	pub fn new(operation: RestOperation) -> Self {
		Self {
			operation,
			resource_name: None,
			headers: HeaderMap::new(),
			resource: None,
			binding: None,
			user_data: HashMap::new(),
		}
	}

	/// Sets the in-flight resource and, when absent, the resource name.
	pub fn with_resource(mut self, resource: Resource) -> Self {
		if self.resource_name.is_none() {
			self.resource_name = resource.resource_type().map(str::to_owned);
		}

		self.resource = Some(resource);

		self
	}

	/// Replaces the request headers.
	pub fn with_headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;

		self
	}

	/// Attaches the caller's remote binding.
	pub fn with_binding(mut self, binding: ClientBinding) -> Self {
		self.binding = Some(binding);

		self
	}

	/// Raw `Authorization` header value.
	pub fn authorization(&self) -> Option<&str> {
		self.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok())
	}

	/// Pre-update snapshot captured by the pipeline, if any.
	pub fn resource_before_update(&self) -> Option<Resource> {
		self.user_data.get(RESOURCE_BEFORE_UPDATE).cloned().and_then(|value| Resource::new(value).ok())
	}
}

/// Outcome of the local write as seen by the pipeline.
#[derive(Clone, Debug)]
pub struct ResponseContext {
	/// HTTP status of the local write.
	pub status: u16,
	/// Resource returned by the local write.
	pub resource: Option<Resource>,
}
impl ResponseContext {
	/// Creates a response carrying `resource`.
	pub fn new(status: u16, resource: Option<Resource>) -> Self {
		Self { status, resource }
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn patient() -> Resource {
		Resource::new(json!({ "resourceType": "Patient", "id": "p-1" }))
			.expect("Patient fixture should be valid.")
	}

	#[test]
	fn saved_marker_is_added_then_updated_in_place() {
		let mut resource = patient();

		assert_eq!(resource.saved_marker(), None);

		resource.set_saved_marker(false);

		assert_eq!(resource.saved_marker(), Some(false));

		resource.set_saved_marker(true);

		assert_eq!(resource.saved_marker(), Some(true));
		assert_eq!(
			resource.as_value()["extension"].as_array().map(Vec::len),
			Some(1),
			"Marker must not be duplicated."
		);
	}

	#[test]
	fn saved_marker_leaves_foreign_extensions_alone() {
		let mut resource = Resource::new(json!({
			"resourceType": "Observation",
			"extension": [{ "url": "https://example.org/other", "valueString": "x" }],
		}))
		.expect("Observation fixture should be valid.");

		resource.set_saved_marker(true);

		let extensions =
			resource.as_value()["extension"].as_array().expect("Extensions should be an array.");

		assert_eq!(extensions.len(), 2);
		assert_eq!(extensions[0]["valueString"], "x");
		assert_eq!(resource.saved_marker(), Some(true));
	}

	#[test]
	fn resource_requires_resource_type() {
		assert!(Resource::new(json!({ "id": "x" })).is_err());
		assert!(Resource::from_json("not json").is_err());

		let resource = patient();

		assert_eq!(resource.resource_type(), Some("Patient"));
		assert_eq!(resource.id(), Some("p-1"));
	}

	#[test]
	fn request_context_reads_authorization_and_snapshot() {
		let mut headers = HeaderMap::new();

		headers.insert(AUTHORIZATION, "Bearer abc".parse().expect("Header should parse."));

		let mut request =
			RequestContext::new(RestOperation::Update).with_headers(headers).with_resource(patient());

		assert_eq!(request.resource_name.as_deref(), Some("Patient"));
		assert_eq!(request.authorization(), Some("Bearer abc"));
		assert!(request.resource_before_update().is_none());

		request.user_data.insert(RESOURCE_BEFORE_UPDATE.into(), patient().into_value());

		assert_eq!(request.resource_before_update(), Some(patient()));
	}

	#[test]
	fn only_create_and_update_are_relayed() {
		assert!(RestOperation::Create.is_relayed());
		assert!(RestOperation::Update.is_relayed());
		assert!(!RestOperation::Delete.is_relayed());
		assert!(!RestOperation::Read.is_relayed());
		assert!(!RestOperation::Patch.is_relayed());
	}
}
