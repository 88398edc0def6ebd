#![cfg(all(feature = "reqwest", feature = "test"))]

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use fhir_remote_relay::{
	_preludet::*,
	config::{Capabilities, RelayConfig},
	http::ResourceHttpClient,
	intercept::{
		ClientBinding, Interceptor, RelayEnvelope, RelayOutcome, RequestContext, Resource,
		ResponseContext, RestOperation,
	},
	oauth::oauth2::http::{HeaderMap, HeaderValue, header::AUTHORIZATION},
};

const RELAY_PATH: &str = "/remote-fhir-express/client-a/remote-9/Observation/obs-1";

fn config(server: &MockServer, capabilities: Capabilities) -> RelayConfig {
	test_config(&server.base_url())
		.with_local_base_url(Url::parse(&server.url("/fhir")).expect("Local URL should parse."))
		.with_adapter_health_url(
			Url::parse(&server.url("/adapter/health")).expect("Health URL should parse."),
		)
		.with_capabilities(capabilities)
}

fn interceptor(config: &RelayConfig, verdict: bool, calls: Arc<AtomicUsize>) -> Interceptor {
	let http: Arc<dyn ResourceHttpClient> = Arc::new(test_reqwest_http_client());
	let policy = move |_: &RelayEnvelope, _: &RequestContext, _: &ResponseContext, _: &Error| {
		calls.fetch_add(1, Ordering::SeqCst);

		verdict
	};

	Interceptor::from_config(config, http, Arc::new(policy))
		.expect("Interceptor should build from the test configuration.")
}

fn request(operation: RestOperation, value: &str) -> RequestContext {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer caller-token"));

	let resource = Resource::new(json!({
		"resourceType": "Observation",
		"id": "obs-1",
		"valueString": value,
	}))
	.expect("Observation fixture should be valid.");

	RequestContext::new(operation)
		.with_headers(headers)
		.with_resource(resource)
		.with_binding(ClientBinding::linked("client-a", "remote-9"))
}

async fn echo_write(request: RequestContext) -> Result<ResponseContext> {
	Ok(ResponseContext::new(201, request.resource))
}

async fn must_not_write(_: RequestContext) -> Result<ResponseContext> {
	panic!("The local write must not run when the adapter is down.")
}

#[tokio::test]
async fn create_is_relayed_and_saved_marker_written_back() {
	let server = MockServer::start_async().await;
	let config = config(&server, Capabilities::default());
	let relay = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(RELAY_PATH)
				.header("authorization", "Bearer caller-token")
				.header("content-type", "application/json")
				.body_includes("\"valueString\":\"new\"");
			then.status(201);
		})
		.await;
	let write_back = server
		.mock_async(|when, then| {
			when.method(PUT)
				.path("/fhir/Observation/obs-1")
				.header("x-sync-hint", "NO-REMOTE-SAVE")
				.body_includes("\"valueBoolean\":true");
			then.status(200).header("content-type", "application/fhir+json").body("{}");
		})
		.await;
	let calls = Arc::new(AtomicUsize::new(0));
	let processed = interceptor(&config, false, calls.clone())
		.process(request(RestOperation::Create, "new"), echo_write)
		.await
		.expect("Create should succeed.");

	relay.assert_calls_async(1).await;
	write_back.assert_calls_async(1).await;

	assert!(processed.relay.saved_in_remote());
	assert!(processed.proceed());
	assert_eq!(processed.response.resource.as_ref().and_then(Resource::saved_marker), Some(true));
	assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn update_snapshots_the_local_copy_through_a_guarded_read() {
	let server = MockServer::start_async().await;
	let capabilities = Capabilities { store_resource_before_update: true, ..Default::default() };
	let config = config(&server, capabilities);
	let search = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/fhir/Observation")
				.query_param("_id", "obs-1")
				.header("x-sync-hint", "NO-REMOTE-SAVE")
				.header("authorization", "Bearer caller-token");
			then.status(200).header("content-type", "application/fhir+json").body(
				"{\"resourceType\":\"Bundle\",\"entry\":[{\"resource\":{\"resourceType\":\"Observation\",\"id\":\"obs-1\",\"valueString\":\"old\"}}]}",
			);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(RELAY_PATH);
			then.status(200);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(PUT).path("/fhir/Observation/obs-1");
			then.status(200).body("{}");
		})
		.await;

	let processed = interceptor(&config, true, Arc::new(AtomicUsize::new(0)))
		.process(request(RestOperation::Update, "new"), echo_write)
		.await
		.expect("Update should succeed.");

	search.assert_calls_async(1).await;

	let snapshot =
		processed.request.resource_before_update().expect("Pre-update snapshot should exist.");

	assert_eq!(snapshot.as_value()["valueString"], "old");
	assert_eq!(
		processed.response.resource.as_ref().map(|resource| resource.as_value()["valueString"].clone()),
		Some(json!("new"))
	);
}

#[tokio::test]
async fn stopped_adapter_blocks_the_write() {
	let server = MockServer::start_async().await;
	let capabilities = Capabilities { check_if_adapter_is_running: true, ..Default::default() };
	let config = config(&server, capabilities);
	let health = server
		.mock_async(|when, then| {
			when.method(GET).path("/adapter/health");
			then.status(503);
		})
		.await;
	let relay = server
		.mock_async(|when, then| {
			when.method(POST).path(RELAY_PATH);
			then.status(201);
		})
		.await;
	let err = interceptor(&config, true, Arc::new(AtomicUsize::new(0)))
		.process(request(RestOperation::Create, "new"), must_not_write)
		.await
		.expect_err("Stopped adapter should abort the request.");

	health.assert_calls_async(1).await;
	relay.assert_calls_async(0).await;

	assert!(matches!(err, Error::AdapterUnavailable));
	assert_eq!(err.to_string(), "Adapter is not running.");
}

#[tokio::test]
async fn failed_relay_defers_to_the_policy() {
	let server = MockServer::start_async().await;
	let config = config(&server, Capabilities::default());
	let relay = server
		.mock_async(|when, then| {
			when.method(POST).path(RELAY_PATH);
			then.status(500).body("remote system down");
		})
		.await;
	let write_back = server
		.mock_async(|when, then| {
			when.method(PUT).path("/fhir/Observation/obs-1");
			then.status(200);
		})
		.await;
	let calls = Arc::new(AtomicUsize::new(0));
	let processed = interceptor(&config, false, calls.clone())
		.process(request(RestOperation::Create, "new"), echo_write)
		.await
		.expect("Relay failures are reported through the outcome.");

	relay.assert_calls_async(1).await;
	write_back.assert_calls_async(0).await;

	assert!(!processed.proceed());
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert!(matches!(
		&processed.relay,
		RelayOutcome::Failed { proceed: false, error: Error::Relay(relay_error) }
			if relay_error.status == 500 && relay_error.message == "remote system down"
	));
	assert_eq!(processed.response.resource.as_ref().and_then(Resource::saved_marker), Some(false));
}
