//! Transport primitives for the request pipeline.
//!
//! [`HttpTransport`] is the pipeline's only dependency on an HTTP stack. Implementations
//! execute one [`RequestDescriptor`] per call, enforce the descriptor's timeout, and report
//! any status code (including 4xx/5xx) as an [`ApiResponse`]. Only failures where no
//! response arrived are reported as [`TransportError`].

mod message;

pub use message::*;

// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Executes physical HTTP attempts on behalf of the pipeline and the refresh call.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by
/// every pipeline clone and by the refresh coordinator behind an `Arc`.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with whatever response the backend produced.
	fn execute<'a>(&'a self, request: &'a RequestDescriptor) -> TransportFuture<'a>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	fn map_error(err: ReqwestError, timeout: Duration) -> TransportError {
		if err.is_timeout() {
			TransportError::Timeout { after: timeout }
		} else {
			TransportError::network(err)
		}
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute<'a>(&'a self, request: &'a RequestDescriptor) -> TransportFuture<'a> {
		Box::pin(async move {
			let timeout = request.timeout();
			let mut builder = self
				.0
				.request(request.method().clone(), request.url().clone())
				.timeout(crate::config::to_std(timeout))
				.headers(request.headers().clone());

			if let Some(body) = request.body() {
				builder = builder.body(body.to_vec());
			}

			let response = builder.send().await.map_err(|e| Self::map_error(e, timeout))?;
			let status = response.status();
			let headers = response.headers().clone();
			let body = response.bytes().await.map_err(|e| Self::map_error(e, timeout))?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}
