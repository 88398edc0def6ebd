//! Internal calls back into the local FHIR server.
//!
//! Every call carries the loop-guard header so the pipeline steps aside when the local
//! server routes the call through it again.

// crates.io
use oauth2::http::{
	HeaderMap, HeaderValue, Method,
	header::{ACCEPT, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError},
	http::{HttpReply, OutboundRequest, ResourceHttpClient},
	intercept::{HookFuture, Resource},
};

const FHIR_JSON: &str = "application/fhir+json";

/// Read/write access to the local FHIR server.
pub trait LocalResourceClient
where
	Self: Send + Sync,
{
	/// Looks up the server-side copy of `resource_type`/`id`.
	fn search_by_id<'a>(
		&'a self,
		resource_type: &'a str,
		id: &'a str,
		headers: HeaderMap,
	) -> HookFuture<'a, Result<Option<Resource>>>;

	/// Overwrites the server-side copy with `resource`.
	fn update<'a>(&'a self, resource: &'a Resource, headers: HeaderMap) -> HookFuture<'a, Result<()>>;
}

/// [`LocalResourceClient`] speaking the FHIR REST API over a [`ResourceHttpClient`].
#[derive(Clone)]
pub struct RestLocalClient {
	base_url: Url,
	http: Arc<dyn ResourceHttpClient>,
}
impl RestLocalClient {
	/// Creates a client rooted at `base_url` (e.g. `https://fhir.example.org/fhir`).
	pub fn new(base_url: Url, http: Arc<dyn ResourceHttpClient>) -> Self {
		Self { base_url, http }
	}

	fn endpoint(&self, segments: &[&str]) -> Result<Url> {
		let raw = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), segments.join("/"));

		Url::parse(&raw).map_err(|e| ConfigError::invalid_url(raw, e).into())
	}

	async fn call(&self, request: OutboundRequest) -> Result<HttpReply> {
		let reply = self.http.send(request).await?;

		if !reply.is_success() {
			return Err(TransientError::LocalStatus { status: reply.status }.into());
		}

		Ok(reply)
	}
}
impl LocalResourceClient for RestLocalClient {
	fn search_by_id<'a>(
		&'a self,
		resource_type: &'a str,
		id: &'a str,
		headers: HeaderMap,
	) -> HookFuture<'a, Result<Option<Resource>>> {
		Box::pin(async move {
			let mut url = self.endpoint(&[resource_type])?;

			url.query_pairs_mut().append_pair("_id", id);

			let request = OutboundRequest::new(Method::GET, url, "local")
				.with_headers(headers)
				.with_headers(fhir_headers(false));
			let reply = self.call(request).await?;
			let mut deserializer = serde_json::Deserializer::from_str(&reply.body);
			let bundle: SearchBundle = serde_path_to_error::deserialize(&mut deserializer)
				.map_err(|source| TransientError::LocalResponseParse { source })?;

			bundle
				.entry
				.into_iter()
				.find_map(|entry| entry.resource)
				.map(Resource::new)
				.transpose()
		})
	}

	fn update<'a>(&'a self, resource: &'a Resource, headers: HeaderMap) -> HookFuture<'a, Result<()>> {
		Box::pin(async move {
			let (Some(resource_type), Some(id)) = (resource.resource_type(), resource.id()) else {
				return Err(Error::InvalidResource {
					reason: "Local update requires resourceType and id.".into(),
				});
			};
			let url = self.endpoint(&[resource_type, id])?;
			let request = OutboundRequest::new(Method::PUT, url, "local")
				.with_headers(headers)
				.with_headers(fhir_headers(true))
				.with_body(resource.to_json()?);

			self.call(request).await.map(|_| ())
		})
	}
}
impl Debug for RestLocalClient {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("RestLocalClient").field("base_url", &self.base_url.as_str()).finish()
	}
}

#[derive(Deserialize)]
struct SearchBundle {
	#[serde(default)]
	entry: Vec<SearchEntry>,
}

#[derive(Deserialize)]
struct SearchEntry {
	resource: Option<Value>,
}

fn fhir_headers(with_body: bool) -> HeaderMap {
	let mut headers = HeaderMap::new();

	headers.insert(ACCEPT, HeaderValue::from_static(FHIR_JSON));

	if with_body {
		headers.insert(CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON));
	}

	headers
}
