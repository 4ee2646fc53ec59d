#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use gateway_client::{
	auth::Credential,
	config::ClientConfig,
	error::Error,
	http::ApiRequest,
	http_types::{HeaderName, HeaderValue, StatusCode},
	pipeline::ReqwestPipeline,
	refresh::RefreshFailure,
	store::MemoryStore,
	url::Url,
};

fn build_pipeline(server: &MockServer, store: MemoryStore) -> ReqwestPipeline {
	let base_url =
		Url::parse(&server.url("/api/")).expect("Mock server base URL should parse successfully.");
	let config = ClientConfig::builder(base_url)
		.build()
		.expect("Client configuration should build successfully.");

	ReqwestPipeline::new(config, Arc::new(store)).expect("Reqwest pipeline should build.")
}

#[tokio::test]
async fn expired_bearer_is_refreshed_and_request_retried() {
	let server = MockServer::start_async().await;
	let store = MemoryStore::with_credential(Credential::new("T1").with_refresh("R1"));
	let pipeline = build_pipeline(&server, store.clone());
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/routes").header("authorization", "Bearer T1");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh").json_body(json!({ "token": "R1" }));
			then.status(200).json_body(json!({ "token": "T2", "refreshToken": "R2" }));
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/routes").header("authorization", "Bearer T2");
			then.status(200).json_body(json!([{ "name": "users", "upstream": "users-svc" }]));
		})
		.await;
	let routes = pipeline
		.get_json::<serde_json::Value>("/routes")
		.await
		.expect("Request should succeed after refresh.");

	rejected.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;
	accepted.assert_calls_async(1).await;

	assert_eq!(routes[0]["name"], "users");
	assert_eq!(store.current(), Some(Credential::new("T2").with_refresh("R2")));

	let summary = pipeline.metrics.summary();

	assert_eq!(summary.total, 2);
	assert_eq!(summary.errors, 1);
	assert_eq!(summary.error_rate, 50.);
}

#[tokio::test]
async fn concurrent_rejections_share_one_refresh_call() {
	let server = MockServer::start_async().await;
	let store = MemoryStore::with_credential(Credential::new("T1").with_refresh("R1"));
	let pipeline = build_pipeline(&server, store.clone());
	let _rejected = server
		.mock_async(|when, then| {
			when.method(GET).header("authorization", "Bearer T1");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200)
				.delay(std::time::Duration::from_millis(200))
				.json_body(json!({ "token": "T2" }));
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).header("authorization", "Bearer T2");
			then.status(200).body("{}");
		})
		.await;
	let calls = ["/routes", "/services", "/security/settings", "/analytics"]
		.into_iter()
		.map(|path| {
			let pipeline = pipeline.clone();

			tokio::spawn(async move { pipeline.get(path).await })
		})
		.collect::<Vec<_>>();

	for call in calls {
		call.await
			.expect("Request task should not panic.")
			.expect("Every request should succeed with the shared credential.");
	}

	refresh.assert_calls_async(1).await;
	accepted.assert_calls_async(4).await;

	assert_eq!(pipeline.coordinator.metrics().attempts(), 1);
	assert_eq!(
		store.current().and_then(|credential| credential.refresh),
		Some(gateway_client::auth::TokenSecret::new("R1")),
		"Refresh credential should be kept when the backend does not rotate it."
	);
}

#[tokio::test]
async fn rejected_refresh_clears_credentials() {
	let server = MockServer::start_async().await;
	let store = MemoryStore::with_credential(Credential::new("T1").with_refresh("R1"));
	let pipeline = build_pipeline(&server, store.clone());
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/services");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(401).json_body(json!({ "message": "refresh token revoked" }));
		})
		.await;
	let err = pipeline.get("/services").await.expect_err("Refresh rejection should surface.");

	rejected.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;

	assert!(matches!(
		err,
		Error::AuthenticationExpired { reason: RefreshFailure::Rejected { status: 401 } }
	));
	assert!(err.requires_login());
	assert!(store.current().is_none());
}

#[tokio::test]
async fn server_errors_are_not_retried() {
	let server = MockServer::start_async().await;
	let pipeline = build_pipeline(&server, MemoryStore::with_credential(Credential::new("T1")));
	let failing = server
		.mock_async(|when, then| {
			when.method(PUT).path("/api/security/settings");
			then.status(503).json_body(json!({ "message": "maintenance" }));
		})
		.await;
	let err = pipeline
		.put_json("/security/settings", &json!({ "rateLimit": 100 }))
		.await
		.expect_err("503 should surface.");

	failing.assert_calls_async(1).await;

	assert_eq!(err.to_string(), "Server error (HTTP 503): maintenance.");
	assert_eq!(pipeline.metrics.snapshot()[0].status, Some(503));
}

#[tokio::test]
async fn slow_backend_times_out_as_network_error() {
	let server = MockServer::start_async().await;
	let base_url = Url::parse(&server.url("/api/")).expect("Mock server base URL should parse.");
	let config = ClientConfig::builder(base_url)
		.request_timeout(time::Duration::milliseconds(100))
		.build()
		.expect("Client configuration should build successfully.");
	let pipeline = ReqwestPipeline::new(config, Arc::new(MemoryStore::default()))
		.expect("Reqwest pipeline should build.");
	let _slow = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/analytics");
			then.status(200).delay(std::time::Duration::from_secs(2)).body("{}");
		})
		.await;
	let err = pipeline.get("/analytics").await.expect_err("Slow backend should time out.");

	assert!(matches!(err, Error::Network(ref e) if e.is_timeout()));
	assert_eq!(pipeline.metrics.snapshot()[0].status, None);
}

#[tokio::test]
async fn headers_pass_through_both_directions() {
	let server = MockServer::start_async().await;
	let pipeline = build_pipeline(&server, MemoryStore::with_credential(Credential::new("T1")));
	let tagged = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/routes")
				.header("x-client-tag", "dashboard")
				.header("authorization", "Bearer T1");
			then.status(200).header("x-request-id", "req-42").body("[]");
		})
		.await;
	let request = ApiRequest::get("/routes")
		.with_header(HeaderName::from_static("x-client-tag"), HeaderValue::from_static("dashboard"));
	let response = pipeline.send(request).await.expect("Tagged request should succeed.");

	tagged.assert_calls_async(1).await;

	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(response.headers["x-request-id"], "req-42");
}
