//! Request pipeline: credential attachment, execution, classification, and one-shot
//! refresh-and-retry.
//!
//! Every logical call runs the same fixed stages:
//!
//! 1. attach the stored bearer as `Authorization: Bearer <token>`;
//! 2. execute the attempt and record a [`MetricRecord`];
//! 3. classify the response;
//! 4. on a 401 for the initial attempt, refresh through the [`AuthRefreshCoordinator`] and
//!    execute the derived retry descriptor exactly once.
//!
//! Network failures and timeouts are recorded and surfaced without any retry.

// std
use std::time::Instant;
// crates.io
use http::Method;
// self
use crate::{
	_prelude::*,
	collector::{MetricRecord, MetricsCollector},
	config::ClientConfig,
	error::ConfigError,
	http::{ApiRequest, ApiResponse, Attempt, HttpTransport, RequestDescriptor},
	obs::{self, RequestOutcome, RequestSpan},
	refresh::{AuthRefreshCoordinator, HttpTokenRefresher, TokenRefresher},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Pipeline specialized for the crate's default reqwest transport.
pub type ReqwestPipeline = RequestPipeline<ReqwestTransport>;

/// Executes logical API calls with credential attachment, auth recovery, and metrics.
///
/// Cloning is cheap; clones share the transport, credential store, refresh coordinator, and
/// metrics collector.
pub struct RequestPipeline<T>
where
	T: ?Sized + HttpTransport,
{
	/// Transport used for every physical attempt.
	pub transport: Arc<T>,
	/// Store holding the bearer and refresh credentials.
	pub store: Arc<dyn CredentialStore>,
	/// Single-flight refresh coordinator bound to `store`.
	pub coordinator: Arc<AuthRefreshCoordinator>,
	/// Windowed metrics fed by every physical attempt.
	pub metrics: Arc<MetricsCollector>,
	/// Validated client configuration.
	pub config: ClientConfig,
}
impl<T> RequestPipeline<T>
where
	T: ?Sized + HttpTransport,
{
	/// Wires a pipeline whose refresh call goes through the same transport.
	pub fn with_transport(
		config: ClientConfig,
		transport: impl Into<Arc<T>>,
		store: Arc<dyn CredentialStore>,
	) -> Result<Self, ConfigError> {
		let transport = transport.into();
		let refresher: Arc<dyn TokenRefresher> =
			Arc::new(HttpTokenRefresher::new(transport.clone(), &config)?);
		let coordinator = Arc::new(AuthRefreshCoordinator::new(store.clone(), refresher));
		let metrics = Arc::new(MetricsCollector::new(config.metrics_retention));

		Ok(Self::from_parts(config, transport, store, coordinator, metrics))
	}

	/// Assembles a pipeline from explicitly constructed collaborators.
	///
	/// `coordinator` must be bound to the same `store`.
	pub fn from_parts(
		config: ClientConfig,
		transport: Arc<T>,
		store: Arc<dyn CredentialStore>,
		coordinator: Arc<AuthRefreshCoordinator>,
		metrics: Arc<MetricsCollector>,
	) -> Self {
		Self { transport, store, coordinator, metrics, config }
	}

	/// Sends a logical call and returns the successful response.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let url = self.config.endpoint(&request.path)?;
		let descriptor = RequestDescriptor::from_request(request, url, self.config.request_timeout);
		let span = RequestSpan::new("send", descriptor.method(), Attempt::Initial);

		span.instrument(self.dispatch(descriptor)).await
	}

	/// Sends a logical call and decodes the JSON response body.
	pub async fn send_json<R>(&self, request: ApiRequest) -> Result<R>
	where
		R: for<'de> Deserialize<'de>,
	{
		self.send(request).await?.json()
	}

	/// `GET path`, decoding the JSON body.
	pub async fn get_json<R>(&self, path: &str) -> Result<R>
	where
		R: for<'de> Deserialize<'de>,
	{
		self.send_json(ApiRequest::get(path)).await
	}

	/// `GET path`.
	pub async fn get(&self, path: &str) -> Result<ApiResponse> {
		self.send(ApiRequest::get(path)).await
	}

	/// `DELETE path`.
	pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
		self.send(ApiRequest::delete(path)).await
	}

	/// `POST path` with a JSON body.
	pub async fn post_json<B>(&self, path: &str, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		self.send(Self::json_request(Method::POST, path, body)?).await
	}

	/// `PUT path` with a JSON body.
	pub async fn put_json<B>(&self, path: &str, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		self.send(Self::json_request(Method::PUT, path, body)?).await
	}

	/// `PATCH path` with a JSON body.
	pub async fn patch_json<B>(&self, path: &str, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		self.send(Self::json_request(Method::PATCH, path, body)?).await
	}

	async fn dispatch(&self, descriptor: RequestDescriptor) -> Result<ApiResponse> {
		let credential = self.store.get().await?;
		let initial = descriptor.authorized(credential.as_ref())?;
		let response = self.execute(&initial).await?;

		if RequestOutcome::classify(Some(response.status.as_u16())) != RequestOutcome::Unauthorized
		{
			return Self::settle(response, Attempt::Initial);
		}

		let stale = credential.map(|credential| credential.bearer);
		let refreshed = self
			.coordinator
			.refresh_after(stale.as_ref())
			.await
			.map_err(|reason| Error::AuthenticationExpired { reason })?;
		let retry = initial.retry().authorized(Some(&refreshed))?;
		let response = self.execute(&retry).await?;

		Self::settle(response, Attempt::Retry)
	}

	/// Runs one physical attempt and records exactly one metric for it.
	pub(crate) async fn execute(&self, descriptor: &RequestDescriptor) -> Result<ApiResponse> {
		let method = descriptor.method();
		let span = RequestSpan::new("execute", method, descriptor.attempt());

		span.instrument(async move {
			obs::log_request(method, descriptor.url());

			let started_at = OffsetDateTime::now_utc();
			let clock = Instant::now();
			let result = self.transport.execute(descriptor).await;
			let elapsed = Duration::try_from(clock.elapsed()).unwrap_or(Duration::MAX);
			let status = result.as_ref().ok().map(|response| response.status.as_u16());

			self.metrics.record(MetricRecord::new(
				started_at,
				elapsed,
				status,
				descriptor.url().as_str(),
				method.clone(),
			));
			obs::record_request(method, RequestOutcome::classify(status), elapsed);
			obs::log_response(status, descriptor.url(), elapsed);

			result.map_err(Error::from)
		})
		.await
	}

	/// Maps a final response onto the caller-facing result.
	pub(crate) fn settle(response: ApiResponse, attempt: Attempt) -> Result<ApiResponse> {
		match RequestOutcome::classify(Some(response.status.as_u16())) {
			RequestOutcome::Success => Ok(response),
			RequestOutcome::Unauthorized if matches!(attempt, Attempt::Retry) =>
				Err(Error::RefreshExhausted { response }),
			RequestOutcome::ServerError => Err(Error::Server { response }),
			_ => Err(Error::Client { response }),
		}
	}

	fn json_request<B>(method: Method, path: &str, body: &B) -> Result<ApiRequest>
	where
		B: ?Sized + Serialize,
	{
		ApiRequest::new(method, path).with_json(body).map_err(|e| ConfigError::from(e).into())
	}
}
#[cfg(feature = "reqwest")]
impl RequestPipeline<ReqwestTransport> {
	/// Creates a pipeline backed by a default reqwest client.
	pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ConfigError> {
		Self::with_transport(config, ReqwestTransport::default(), store)
	}
}
impl<T> Clone for RequestPipeline<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			coordinator: self.coordinator.clone(),
			metrics: self.metrics.clone(),
			config: self.config.clone(),
		}
	}
}
impl<T> Debug for RequestPipeline<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestPipeline")
			.field("base_url", &self.config.base_url.as_str())
			.field("coordinator", &self.coordinator)
			.field("retained_metrics", &self.metrics.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use http::{
		StatusCode,
		header::{AUTHORIZATION, CONTENT_TYPE},
	};
	// self
	use super::*;
	use crate::{
		_preludet::*,
		auth::{Credential, TokenSecret},
		error::TransportError,
		refresh::RefreshFailure,
		store::MemoryStore,
	};

	fn bearer(request: &RequestDescriptor) -> Option<&str> {
		request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok())
	}

	/// Backend that accepts only `Bearer T2` and hands out `T2` on refresh.
	fn rotating_backend(refresh_status: StatusCode) -> Arc<ScriptedTransport> {
		ScriptedTransport::respond(move |request| {
			if request.url().path() == "/auth/refresh" {
				return Ok(if refresh_status == StatusCode::OK {
					ApiResponse::json_body(StatusCode::OK, &serde_json::json!({ "token": "T2" }))
				} else {
					ApiResponse::new(refresh_status, "")
				});
			}

			match bearer(request) {
				Some("Bearer T2") =>
					Ok(ApiResponse::json_body(StatusCode::OK, &serde_json::json!([]))),
				_ => Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, "")),
			}
		})
	}

	#[tokio::test]
	async fn refresh_success_retries_with_new_credential() {
		let transport = rotating_backend(StatusCode::OK);
		let store = MemoryStore::with_credential(Credential::new("T1").with_refresh("R1"));
		let pipeline = build_scripted_pipeline(transport.clone(), store.clone());
		let response = pipeline.get("/routes").await.expect("Retried request should succeed.");

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(store.current().map(|c| c.bearer), Some(TokenSecret::new("T2")));

		let requests = transport.requests();

		assert_eq!(requests.len(), 3);
		assert_eq!(bearer(&requests[0]), Some("Bearer T1"));
		assert!(!requests[0].is_retry());
		assert_eq!(requests[1].url().path(), "/auth/refresh");
		assert_eq!(requests[1].body(), Some(br#"{"token":"R1"}"#.as_slice()));
		assert_eq!(bearer(&requests[2]), Some("Bearer T2"));
		assert!(requests[2].is_retry());

		let metrics = pipeline.metrics.snapshot();

		assert_eq!(metrics.len(), 2, "One record per physical pipeline attempt.");
		assert_eq!(metrics[0].status, Some(401));
		assert_eq!(metrics[1].status, Some(200));
		assert!(metrics[0].timestamp <= metrics[1].timestamp);
	}

	#[tokio::test]
	async fn refresh_failure_clears_store_and_skips_retry() {
		let transport = rotating_backend(StatusCode::UNAUTHORIZED);
		let store = MemoryStore::with_credential(Credential::new("T1").with_refresh("R1"));
		let pipeline = build_scripted_pipeline(transport.clone(), store.clone());
		let err = pipeline.get("/routes").await.expect_err("Refresh failure should surface.");

		assert!(matches!(
			err,
			Error::AuthenticationExpired { reason: RefreshFailure::Rejected { status: 401 } }
		));
		assert!(store.current().is_none());
		assert_eq!(transport.calls_to("/routes"), 1, "No retried request may be sent.");
		assert_eq!(pipeline.metrics.len(), 1);
		assert_eq!(pipeline.metrics.error_rate(), 100.);
	}

	#[tokio::test]
	async fn retry_rejected_again_does_not_refresh_twice() {
		let refreshes = Arc::new(AtomicUsize::new(0));
		let transport = ScriptedTransport::respond({
			let refreshes = refreshes.clone();

			move |request| {
				if request.url().path() == "/auth/refresh" {
					refreshes.fetch_add(1, Ordering::SeqCst);

					return Ok(ApiResponse::json_body(
						StatusCode::OK,
						&serde_json::json!({ "token": "T2" }),
					));
				}

				Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, ""))
			}
		});
		let store = MemoryStore::with_credential(Credential::new("T1").with_refresh("R1"));
		let pipeline = build_scripted_pipeline(transport.clone(), store);
		let err = pipeline.get("/routes").await.expect_err("Second 401 should surface.");

		assert!(matches!(err, Error::RefreshExhausted { ref response } if response.status == StatusCode::UNAUTHORIZED));
		assert_eq!(refreshes.load(Ordering::SeqCst), 1);
		assert_eq!(transport.calls_to("/routes"), 2);
	}

	#[tokio::test]
	async fn missing_credential_on_401_expires_without_refresh_call() {
		let transport = rotating_backend(StatusCode::OK);
		let pipeline = build_scripted_pipeline(transport.clone(), MemoryStore::default());
		let err = pipeline.get("/routes").await.expect_err("Anonymous 401 should surface.");

		assert!(matches!(
			err,
			Error::AuthenticationExpired { reason: RefreshFailure::MissingRefreshToken }
		));
		assert!(bearer(&transport.requests()[0]).is_none());
		assert_eq!(transport.calls_to("/auth/refresh"), 0);
	}

	#[tokio::test]
	async fn network_failure_is_recorded_and_not_retried() {
		let transport = ScriptedTransport::respond(|_| {
			Err(TransportError::Timeout { after: Duration::seconds(10) })
		});
		let store = MemoryStore::with_credential(Credential::new("T1").with_refresh("R1"));
		let pipeline = build_scripted_pipeline(transport.clone(), store);
		let err = pipeline.get("/services").await.expect_err("Timeout should surface.");

		assert!(matches!(err, Error::Network(TransportError::Timeout { .. })));
		assert_eq!(transport.requests().len(), 1);

		let metrics = pipeline.metrics.snapshot();

		assert_eq!(metrics.len(), 1);
		assert_eq!(metrics[0].status, None);
		assert_eq!(pipeline.metrics.error_rate(), 100.);
	}

	#[tokio::test]
	async fn non_auth_errors_pass_through() {
		let transport = ScriptedTransport::respond(|request| {
			Ok(match request.url().path() {
				"/routes" => ApiResponse::json_body(
					StatusCode::NOT_FOUND,
					&serde_json::json!({ "message": "gone" }),
				),
				_ => ApiResponse::new(StatusCode::BAD_GATEWAY, "bad gateway"),
			})
		});
		let pipeline = build_scripted_pipeline(
			transport.clone(),
			MemoryStore::with_credential(Credential::new("T1")),
		);
		let err = pipeline.get("/routes").await.expect_err("404 should surface.");

		assert!(matches!(err, Error::Client { ref response } if response.status == StatusCode::NOT_FOUND));
		assert_eq!(err.to_string(), "Client error (HTTP 404): gone.");

		let err = pipeline.get("/security/settings").await.expect_err("502 should surface.");

		assert!(matches!(err, Error::Server { ref response } if response.body == b"bad gateway"));
		assert_eq!(transport.calls_to("/auth/refresh"), 0);
	}

	#[tokio::test]
	async fn concurrent_unauthorized_requests_refresh_once() {
		let transport = ScriptedTransport::new(|request| {
			let is_refresh = request.url().path() == "/auth/refresh";
			let authorized = bearer(request) == Some("Bearer T2");

			Box::pin(async move {
				if is_refresh {
					tokio::time::sleep(std::time::Duration::from_millis(50)).await;

					return Ok(ApiResponse::json_body(
						StatusCode::OK,
						&serde_json::json!({ "token": "T2" }),
					));
				}

				Ok(if authorized {
					ApiResponse::new(StatusCode::OK, "ok")
				} else {
					ApiResponse::new(StatusCode::UNAUTHORIZED, "")
				})
			})
		});
		let store = MemoryStore::with_credential(Credential::new("T1").with_refresh("R1"));
		let pipeline = build_scripted_pipeline(transport.clone(), store);
		let calls = (0..5)
			.map(|i| {
				let pipeline = pipeline.clone();

				tokio::spawn(async move { pipeline.get(&format!("/routes/{i}")).await })
			})
			.collect::<Vec<_>>();

		for call in calls {
			let response = call
				.await
				.expect("Request task should not panic.")
				.expect("Every request should succeed after the shared refresh.");

			assert_eq!(response.status, StatusCode::OK);
		}

		assert_eq!(transport.calls_to("/auth/refresh"), 1);
		assert_eq!(pipeline.coordinator.metrics().attempts(), 1);
		assert_eq!(pipeline.metrics.len(), transport.requests().len() - 1);
	}

	#[tokio::test]
	async fn post_json_sends_caller_content_type() {
		let transport =
			ScriptedTransport::respond(|_| {
				Ok(ApiResponse::json_body(StatusCode::CREATED, &serde_json::json!({})))
			});
		let pipeline = build_scripted_pipeline(
			transport.clone(),
			MemoryStore::with_credential(Credential::new("T1")),
		);

		pipeline
			.post_json("/routes", &serde_json::json!({ "name": "users" }))
			.await
			.expect("POST should succeed.");

		let request = &transport.requests()[0];

		assert_eq!(request.method(), &Method::POST);
		assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
		assert_eq!(request.timeout(), pipeline.config.request_timeout);
	}
}
