//! Request and response values that flow through the pipeline.

// crates.io
use http::{
	HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{_prelude::*, auth::Credential, error::ConfigError};

/// Marks whether a descriptor is the original attempt or its single permitted retry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Attempt {
	/// First physical attempt of a logical call.
	#[default]
	Initial,
	/// Attempt sent after a credential refresh.
	Retry,
}
impl Attempt {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Attempt::Initial => "initial",
			Attempt::Retry => "retry",
		}
	}
}

/// Caller-facing description of a logical API call.
///
/// The pipeline turns it into a [`RequestDescriptor`]; callers never choose the retry marker.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path resolved against the configured base URL.
	pub path: String,
	/// Caller-provided headers.
	pub headers: HeaderMap,
	/// Raw body bytes.
	pub body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), headers: HeaderMap::new(), body: None }
	}

	/// Shortcut for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shortcut for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `value` as the JSON body and sets `Content-Type: application/json`.
	pub fn with_json<T>(self, value: &T) -> Result<Self, serde_json::Error>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(value)?;

		Ok(self.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json")).with_body(body))
	}
}

/// Immutable description of one physical attempt handed to the transport.
///
/// Derived descriptors (credential attachment, retries) are new values; a descriptor is
/// never mutated after a transport has seen it.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
	method: Method,
	url: Url,
	headers: HeaderMap,
	body: Option<Vec<u8>>,
	timeout: Duration,
	attempt: Attempt,
}
impl RequestDescriptor {
	/// Creates an initial-attempt descriptor.
	pub fn new(method: Method, url: Url, timeout: Duration) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None, timeout, attempt: Attempt::Initial }
	}

	pub(crate) fn from_request(request: ApiRequest, url: Url, timeout: Duration) -> Self {
		Self {
			method: request.method,
			url,
			headers: request.headers,
			body: request.body,
			timeout,
			attempt: Attempt::Initial,
		}
	}

	/// Returns a copy with an additional header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Returns a copy carrying `body`.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Returns a copy whose `Authorization` header reflects `credential`.
	///
	/// Fails when the stored bearer contains bytes that are not valid in a header value.
	pub fn authorized(mut self, credential: Option<&Credential>) -> Result<Self, ConfigError> {
		match credential {
			Some(credential) => {
				self.headers.insert(AUTHORIZATION, credential.bearer.bearer_header()?);
			},
			None => {
				self.headers.remove(AUTHORIZATION);
			},
		}

		Ok(self)
	}

	/// Derives the single permitted retry of this descriptor.
	pub fn retry(&self) -> Self {
		Self { attempt: Attempt::Retry, ..self.clone() }
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Absolute target URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Headers to send.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Body bytes, if any.
	pub fn body(&self) -> Option<&[u8]> {
		self.body.as_deref()
	}

	/// Timeout the transport must enforce for this attempt.
	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Attempt marker.
	pub fn attempt(&self) -> Attempt {
		self.attempt
	}

	/// Returns `true` for the retry sent after a credential refresh.
	pub fn is_retry(&self) -> bool {
		matches!(self.attempt, Attempt::Retry)
	}
}

/// Response received from the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response without headers.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Creates a JSON response from `value`.
	pub fn json_body(status: StatusCode, value: &serde_json::Value) -> Self {
		let mut response = Self::new(status, value.to_string());

		response.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		response
	}

	/// Returns `true` for statuses below 400.
	pub fn is_success(&self) -> bool {
		!self.status.is_client_error() && !self.status.is_server_error()
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: for<'de> Deserialize<'de>,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| Error::Decode { source, status: self.status.as_u16() })
	}

	/// Body as UTF-8 text, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Extracts the backend's `message` field from an error body.
	pub fn error_message(&self) -> Option<String> {
		#[derive(Deserialize)]
		struct ErrorBody {
			message: Option<String>,
		}

		serde_json::from_slice::<ErrorBody>(&self.body).ok()?.message
	}
}
