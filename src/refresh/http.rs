//! Default [`TokenRefresher`] that calls the backend's refresh endpoint.

// crates.io
use http::{HeaderValue, Method, header::CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	auth::{RefreshResponse, TokenSecret},
	config::ClientConfig,
	error::{ConfigError, TransportError},
	http::{HttpTransport, RequestDescriptor},
	obs,
	refresh::{RefreshFailure, RefreshFuture, TokenRefresher},
};

/// Sends `POST <refresh path>` with `{"token": <refresh credential>}` through a transport.
///
/// The call bypasses the pipeline: it is never retried and never triggers another refresh.
pub struct HttpTokenRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	url: Url,
	timeout: Duration,
}
impl<T> HttpTokenRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	/// Targets the refresh endpoint described by `config`.
	pub fn new(transport: Arc<T>, config: &ClientConfig) -> Result<Self, ConfigError> {
		let url = config.endpoint(&config.auth_paths.refresh)?;

		Ok(Self { transport, url, timeout: config.refresh_timeout })
	}

	/// Refresh endpoint URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	fn map_transport_error(err: TransportError) -> RefreshFailure {
		match err {
			TransportError::Timeout { .. } => RefreshFailure::Timeout,
			other => RefreshFailure::Transport { message: other.to_string() },
		}
	}
}
impl<T> TokenRefresher for HttpTokenRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a> {
		Box::pin(async move {
			let body = serde_json::json!({ "token": refresh_token.expose() }).to_string();
			let descriptor = RequestDescriptor::new(Method::POST, self.url.clone(), self.timeout)
				.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
				.with_body(body);

			obs::log_request(descriptor.method(), descriptor.url());

			let response =
				self.transport.execute(&descriptor).await.map_err(Self::map_transport_error)?;

			if !response.status.is_success() {
				return Err(RefreshFailure::Rejected { status: response.status.as_u16() });
			}

			response
				.json::<RefreshResponse>()
				.map_err(|e| RefreshFailure::MalformedResponse { message: e.to_string() })
		})
	}
}
impl<T> Debug for HttpTokenRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpTokenRefresher")
			.field("url", &self.url.as_str())
			.field("timeout", &self.timeout)
			.finish()
	}
}
