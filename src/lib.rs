//! Resilient HTTP client layer for API gateway dashboards: bearer attachment, single-flight
//! credential refresh with one retry, and time-windowed request metrics.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod collector;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod pipeline;
pub mod refresh;
pub mod session;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and scripted transports for tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::ClientConfig,
		error::TransportError,
		http::{ApiResponse, HttpTransport, RequestDescriptor, TransportFuture},
		pipeline::RequestPipeline,
		store::MemoryStore,
	};

	type Script = dyn Fn(&RequestDescriptor) -> TransportFuture<'static> + Send + Sync;

	/// Transport that answers from a closure and records every descriptor it receives.
	pub struct ScriptedTransport {
		script: Box<Script>,
		requests: Mutex<Vec<RequestDescriptor>>,
	}
	impl ScriptedTransport {
		/// Creates a transport whose replies may suspend (latency, gates).
		pub fn new<F>(script: F) -> Arc<Self>
		where
			F: 'static + Send + Sync + Fn(&RequestDescriptor) -> TransportFuture<'static>,
		{
			Arc::new(Self { script: Box::new(script), requests: Default::default() })
		}

		/// Creates a transport that replies immediately.
		pub fn respond<F>(reply: F) -> Arc<Self>
		where
			F: 'static
				+ Send
				+ Sync
				+ Fn(&RequestDescriptor) -> Result<ApiResponse, TransportError>,
		{
			Self::new(move |request| {
				let result = reply(request);

				Box::pin(async move { result })
			})
		}

		/// Every descriptor executed so far, in arrival order.
		pub fn requests(&self) -> Vec<RequestDescriptor> {
			self.requests.lock().clone()
		}

		/// Number of attempts whose URL path equals `path`.
		pub fn calls_to(&self, path: &str) -> usize {
			self.requests.lock().iter().filter(|request| request.url().path() == path).count()
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn execute<'a>(&'a self, request: &'a RequestDescriptor) -> TransportFuture<'a> {
			self.requests.lock().push(request.clone());

			(self.script)(request)
		}
	}

	/// Configuration rooted at `https://gateway.local/` with default paths and timeouts.
	pub fn test_config() -> ClientConfig {
		let base_url = Url::parse("https://gateway.local/").expect("Fixture base URL should parse.");

		ClientConfig::builder(base_url).build().expect("Fixture config should be valid.")
	}

	/// Wires a pipeline over `transport` and `store` using [`test_config`].
	pub fn build_scripted_pipeline(
		transport: Arc<ScriptedTransport>,
		store: MemoryStore,
	) -> RequestPipeline<ScriptedTransport> {
		RequestPipeline::with_transport(test_config(), transport, Arc::new(store))
			.expect("Fixture pipeline should build.")
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tracing_subscriber as _};
