//! Adapter liveness and authorization probes used by the pre-check stage.

// crates.io
use oauth2::http::{HeaderMap, HeaderValue, Method, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	http::{OutboundRequest, ResourceHttpClient},
	intercept::HookFuture,
};

/// Yes/no questions the pre-check asks the adapter.
pub trait AdapterProbe
where
	Self: Send + Sync,
{
	/// Resolves to `true` when the adapter accepts the caller's `Authorization` header.
	fn is_authorized_by_adapter<'a>(&'a self, authorization: Option<&'a str>) -> HookFuture<'a, bool>;

	/// Resolves to `true` when the adapter answers its health endpoint.
	fn is_adapter_running(&self) -> HookFuture<'_, bool>;
}

/// Probe issuing plain GETs; any 2xx is "yes", anything else (including transport failure)
/// is "no".
#[derive(Clone)]
pub struct HttpAdapterProbe {
	http: Arc<dyn ResourceHttpClient>,
	health_url: Option<Url>,
	authorization_url: Option<Url>,
}
impl HttpAdapterProbe {
	/// Creates a probe with no endpoints; unset endpoints always answer "no".
	pub fn new(http: Arc<dyn ResourceHttpClient>) -> Self {
		Self { http, health_url: None, authorization_url: None }
	}

	/// Sets the adapter health endpoint.
	pub fn with_health_url(mut self, url: Url) -> Self {
		self.health_url = Some(url);

		self
	}

	/// Sets the adapter authorization-check endpoint.
	pub fn with_authorization_url(mut self, url: Url) -> Self {
		self.authorization_url = Some(url);

		self
	}

	async fn answers_ok(&self, url: &Url, headers: HeaderMap) -> bool {
		let request = OutboundRequest::new(Method::GET, url.clone(), "adapter").with_headers(headers);

		match self.http.send(request).await {
			Ok(reply) => reply.is_success(),
			Err(_) => false,
		}
	}
}
impl AdapterProbe for HttpAdapterProbe {
	fn is_authorized_by_adapter<'a>(&'a self, authorization: Option<&'a str>) -> HookFuture<'a, bool> {
		Box::pin(async move {
			let (Some(url), Some(value)) = (
				self.authorization_url.as_ref(),
				authorization.and_then(|value| HeaderValue::from_str(value).ok()),
			) else {
				return false;
			};
			let mut headers = HeaderMap::new();

			headers.insert(AUTHORIZATION, value);

			self.answers_ok(url, headers).await
		})
	}

	fn is_adapter_running(&self) -> HookFuture<'_, bool> {
		Box::pin(async move {
			match self.health_url.as_ref() {
				Some(url) => self.answers_ok(url, HeaderMap::new()).await,
				None => false,
			}
		})
	}
}
impl Debug for HttpAdapterProbe {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("HttpAdapterProbe")
			.field("health_url", &self.health_url.as_ref().map(Url::as_str))
			.field("authorization_url", &self.authorization_url.as_ref().map(Url::as_str))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{error::TransportError, http::{HttpFuture, HttpReply}};

	struct FixedStatus(Option<u16>);
	impl ResourceHttpClient for FixedStatus {
		fn send(&self, _: OutboundRequest) -> HttpFuture<'_, HttpReply> {
			let status = self.0;

			Box::pin(async move {
				match status {
					Some(status) => Ok(HttpReply { status, body: String::new() }),
					None => Err(TransportError::Timeout { target: "adapter" }),
				}
			})
		}
	}

	fn probe(status: Option<u16>) -> HttpAdapterProbe {
		let url = Url::parse("https://adapter.example.org/health").expect("URL fixture should parse.");

		HttpAdapterProbe::new(Arc::new(FixedStatus(status)))
			.with_health_url(url.clone())
			.with_authorization_url(url)
	}

	#[tokio::test]
	async fn only_2xx_counts_as_yes() {
		assert!(probe(Some(204)).is_adapter_running().await);
		assert!(!probe(Some(503)).is_adapter_running().await);
		assert!(!probe(None).is_adapter_running().await);
		assert!(probe(Some(200)).is_authorized_by_adapter(Some("Bearer a")).await);
		assert!(!probe(Some(401)).is_authorized_by_adapter(Some("Bearer a")).await);
	}

	#[tokio::test]
	async fn unset_endpoints_and_missing_header_answer_no() {
		let bare = HttpAdapterProbe::new(Arc::new(FixedStatus(Some(200))));

		assert!(!bare.is_adapter_running().await);
		assert!(!bare.is_authorized_by_adapter(Some("Bearer a")).await);
		assert!(!probe(Some(200)).is_authorized_by_adapter(None).await);
	}
}
