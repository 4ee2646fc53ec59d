//! Optional observability helpers for the pipeline and the refresh coordinator.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `gateway_client.request` (fields `stage`, `method`,
//!   `attempt`) and `gateway_client.refresh`, plus debug/warn events for request lines,
//!   refresh failures, and discarded logout failures.
//! - Enable `metrics` to publish `gateway_client_request_total` (labels `method`, `outcome`),
//!   the `gateway_client_request_duration_ms` histogram, and `gateway_client_refresh_total`
//!   (label `event`) through the global recorder.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Classified outcome of one physical attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
	/// Status below 400.
	Success,
	/// Status 401.
	Unauthorized,
	/// Any other 4xx status.
	ClientError,
	/// Status 500 and above.
	ServerError,
	/// No response (network failure or timeout).
	NetworkError,
}
impl RequestOutcome {
	/// Classifies an attempt by its status; `None` means no response was received.
	pub const fn classify(status: Option<u16>) -> Self {
		match status {
			None => RequestOutcome::NetworkError,
			Some(401) => RequestOutcome::Unauthorized,
			Some(status) if status >= 500 => RequestOutcome::ServerError,
			Some(status) if status >= 400 => RequestOutcome::ClientError,
			Some(_) => RequestOutcome::Success,
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestOutcome::Success => "success",
			RequestOutcome::Unauthorized => "unauthorized",
			RequestOutcome::ClientError => "client_error",
			RequestOutcome::ServerError => "server_error",
			RequestOutcome::NetworkError => "network_error",
		}
	}
}
impl Display for RequestOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Refresh coordinator events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshEvent {
	/// A refresh network call was issued.
	Started,
	/// A caller joined an in-flight refresh instead of issuing a new call.
	Coalesced,
	/// A caller reused a credential that a finished refresh had already stored.
	Reused,
	/// The refresh call produced a new credential.
	Succeeded,
	/// The refresh call failed and the credential was cleared.
	Failed,
	/// The credential changed while the refresh call was in flight; the result was dropped.
	Superseded,
}
impl RefreshEvent {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshEvent::Started => "started",
			RefreshEvent::Coalesced => "coalesced",
			RefreshEvent::Reused => "reused",
			RefreshEvent::Succeeded => "succeeded",
			RefreshEvent::Failed => "failed",
			RefreshEvent::Superseded => "superseded",
		}
	}
}
impl Display for RefreshEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
