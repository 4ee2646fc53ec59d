// self
// crates.io
use http::Method;
// self
use crate::{_prelude::*, http::Attempt};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRequest<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRequest<F> = F;

/// Span wrapping one pipeline stage.
#[derive(Clone, Debug)]
pub struct RequestSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RequestSpan {
	/// Creates a span tagged with the stage, method, and attempt marker.
	pub fn new(stage: &'static str, method: &Method, attempt: Attempt) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"gateway_client.request",
				stage,
				method = method.as_str(),
				attempt = attempt.as_str()
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, method, attempt);

			Self {}
		}
	}

	/// Creates the span wrapping a refresh episode.
	pub fn refresh() -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { span: tracing::info_span!("gateway_client.refresh") }
		}
		#[cfg(not(feature = "tracing"))]
		{
			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRequest<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs an outgoing attempt at debug level.
pub fn log_request(method: &Method, url: &Url) {
	#[cfg(feature = "tracing")]
	tracing::debug!(%method, %url, "api request");
	#[cfg(not(feature = "tracing"))]
	let _ = (method, url);
}

/// Logs a finished attempt; `None` means no response was received.
pub fn log_response(status: Option<u16>, url: &Url, elapsed: Duration) {
	#[cfg(feature = "tracing")]
	match status {
		Some(status) if status < 400 =>
			tracing::debug!(status, %url, elapsed_ms = elapsed.whole_milliseconds() as u64, "api response"),
		Some(status) =>
			tracing::debug!(status, %url, elapsed_ms = elapsed.whole_milliseconds() as u64, "api error"),
		None => tracing::warn!(%url, elapsed_ms = elapsed.whole_milliseconds() as u64, "api request received no response"),
	}
	#[cfg(not(feature = "tracing"))]
	let _ = (status, url, elapsed);
}

/// Logs a failure that is deliberately swallowed (best-effort calls).
pub fn log_discarded(context: &'static str, err: &dyn StdError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(context, error = %err, "ignoring best-effort failure");
	#[cfg(not(feature = "tracing"))]
	let _ = (context, err);
}

/// Logs a failed refresh episode.
pub fn log_refresh_failure(err: &dyn StdError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(error = %err, "credential refresh failed; clearing stored credential");
	#[cfg(not(feature = "tracing"))]
	let _ = err;
}
