// self
// crates.io
use http::Method;
// self
use crate::{
	_prelude::*,
	obs::{RefreshEvent, RequestOutcome},
};

/// Records a physical attempt via the global metrics recorder (when enabled).
pub fn record_request(method: &Method, outcome: RequestOutcome, duration: Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"gateway_client_request_total",
			"method" => method.to_string(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
		metrics::histogram!("gateway_client_request_duration_ms", "method" => method.to_string())
			.record(duration.as_seconds_f64() * 1_000.);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (method, outcome, duration);
	}
}

/// Records a refresh coordinator event via the global metrics recorder (when enabled).
pub fn record_refresh(event: RefreshEvent) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("gateway_client_refresh_total", "event" => event.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = event;
	}
}
