//! Client-level error types shared across the pipeline, refresh coordinator, and stores.

// self
use crate::{_prelude::*, http::ApiResponse, refresh::RefreshFailure};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// No response was received (network, I/O, or timeout); never retried by the pipeline.
	#[error(transparent)]
	Network(#[from] TransportError),

	/// The backend rejected the credential and it could not be refreshed.
	#[error("Authentication expired: {reason}")]
	AuthenticationExpired {
		/// Why the refresh did not produce a usable credential.
		#[source]
		reason: RefreshFailure,
	},
	/// The retried attempt was rejected with 401 again.
	#[error(
		"Request was rejected again after a credential refresh (HTTP {}).",
		.response.status.as_u16()
	)]
	RefreshExhausted {
		/// Response returned by the retried attempt.
		response: ApiResponse,
	},
	/// Backend returned a 5xx status.
	#[error("Server error (HTTP {}): {}.", .response.status.as_u16(), describe(.response))]
	Server {
		/// Untouched backend response.
		response: ApiResponse,
	},
	/// Backend returned a 4xx status other than 401.
	#[error("Client error (HTTP {}): {}.", .response.status.as_u16(), describe(.response))]
	Client {
		/// Untouched backend response.
		response: ApiResponse,
	},
	/// Response body did not match the expected JSON shape.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status of the decoded response.
		status: u16,
	},
}
impl Error {
	/// Returns the backend response carried by HTTP-level errors, if any.
	pub fn response(&self) -> Option<&ApiResponse> {
		match self {
			Self::RefreshExhausted { response }
			| Self::Server { response }
			| Self::Client { response } => Some(response),
			_ => None,
		}
	}

	/// Returns `true` when the caller should send the user back to the login screen.
	pub fn requires_login(&self) -> bool {
		matches!(self, Self::AuthenticationExpired { .. } | Self::RefreshExhausted { .. })
	}
}

fn describe(response: &ApiResponse) -> String {
	response.error_message().unwrap_or_else(|| "no message".into())
}

/// Configuration failures raised while preparing a request.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Request path could not be joined onto the base URL.
	#[error("Endpoint `{path}` is not a valid URL relative to the base URL.")]
	InvalidEndpoint {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request path resolved to a host other than the configured backend.
	#[error("Endpoint `{path}` resolves outside the configured base URL.")]
	ForeignEndpoint {
		/// Offending path.
		path: String,
	},
	/// Stored bearer cannot be carried in an `Authorization` header.
	#[error("Stored credential is not a valid HTTP header value.")]
	InvalidCredentialHeader(#[from] http::header::InvalidHeaderValue),
	/// Request body could not be serialized.
	#[error("Request body could not be serialized as JSON.")]
	RequestBody(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures where no HTTP response was received.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error - no response received.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The attempt exceeded its configured timeout.
	#[error("Request timed out after {after}.")]
	Timeout {
		/// Timeout that elapsed.
		after: Duration,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Returns `true` if the failure was a timeout.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}
}
