//! Single-flight credential refresh shared by every in-flight request.
//!
//! [`AuthRefreshCoordinator::refresh`] collapses concurrent refresh requests into one
//! network call. The first caller moves the coordinator from `Idle` to `Refreshing` and
//! publishes the episode as a shared future; later callers subscribe to that future instead
//! of calling the backend again, and every subscriber receives the same outcome. Success
//! stores the rotated credential, failure clears the store, and both return the coordinator
//! to `Idle`.
//!
//! Both writes are conditional on the store still holding the refresh secret the episode
//! started from. A logout or a fresh login that lands while the call is in flight wins; the
//! episode's result is dropped and waiters observe [`RefreshFailure::Superseded`] or the
//! newer credential.
//!
//! [`AuthRefreshCoordinator::refresh_after`] additionally compares the stored bearer with the
//! one a request was rejected with, so a 401 that lands after an episode already finished
//! reuses the stored credential rather than starting a second episode.

mod http;
mod metrics;

pub use self::http::HttpTokenRefresher;
pub use metrics::RefreshMetrics;

// std
use std::{
	panic::AssertUnwindSafe,
	sync::atomic::{AtomicUsize, Ordering},
};
// crates.io
use futures::future::{BoxFuture, FutureExt, Shared};
// self
use crate::{
	_prelude::*,
	auth::{Credential, RefreshResponse, TokenSecret},
	obs::{self, RefreshEvent, RequestSpan},
	store::{CompareAndSwapOutcome, CredentialStore, StoreError},
};

/// Boxed future returned by [`TokenRefresher::refresh`].
pub type RefreshFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RefreshResponse, RefreshFailure>> + 'a + Send>>;

/// Outcome shared by every caller of one refresh episode.
pub type RefreshOutcome = Result<Credential, RefreshFailure>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Network call that exchanges a refresh credential for a new bearer.
pub trait TokenRefresher
where
	Self: Send + Sync,
{
	/// Performs the exchange; the coordinator guarantees at most one call in flight.
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a>;
}

/// Why a refresh episode did not produce a credential.
///
/// Cloneable so one failure can be handed to every waiter of the episode.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshFailure {
	/// No refresh credential is stored; no network call was made.
	#[error("No refresh credential is stored.")]
	MissingRefreshToken,
	/// The refresh endpoint answered with a non-2xx status.
	#[error("Refresh endpoint rejected the credential with HTTP {status}.")]
	Rejected {
		/// Status returned by the refresh endpoint.
		status: u16,
	},
	/// The refresh call received no response.
	#[error("Refresh call failed before a response arrived: {message}")]
	Transport {
		/// Transport failure description.
		message: String,
	},
	/// The refresh call exceeded its timeout.
	#[error("Refresh call timed out.")]
	Timeout,
	/// The refresh endpoint answered 2xx with an unexpected body.
	#[error("Refresh response was malformed: {message}")]
	MalformedResponse {
		/// Decoding failure description.
		message: String,
	},
	/// The credential store failed while reading or writing the credential.
	#[error("Credential store failed during refresh: {message}")]
	Storage {
		/// Store failure description.
		message: String,
	},
	/// The credential was cleared while the refresh call was in flight.
	#[error("Credential was cleared while the refresh was in flight.")]
	Superseded,
	/// The refresher panicked; the stored credential is left untouched.
	#[error("Refresh call panicked: {message}")]
	Panicked {
		/// Panic payload, when it was a string.
		message: String,
	},
}
impl From<StoreError> for RefreshFailure {
	fn from(e: StoreError) -> Self {
		Self::Storage { message: e.to_string() }
	}
}

/// Observable coordinator phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase {
	/// No refresh is in flight.
	Idle,
	/// A refresh episode is in flight.
	Refreshing,
}

enum RefreshState {
	Idle {
		/// Number of finished episodes; lets callers detect an episode that completed while
		/// they were reading the store.
		generation: u64,
	},
	Refreshing {
		flight: SharedRefresh,
	},
}

/// Owns the single-flight refresh protocol for one credential store.
pub struct AuthRefreshCoordinator {
	store: Arc<dyn CredentialStore>,
	refresher: Arc<dyn TokenRefresher>,
	state: Arc<Mutex<RefreshState>>,
	waiters: Arc<AtomicUsize>,
	metrics: Arc<RefreshMetrics>,
}
impl AuthRefreshCoordinator {
	/// Creates an idle coordinator.
	pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
		Self {
			store,
			refresher,
			state: Arc::new(Mutex::new(RefreshState::Idle { generation: 0 })),
			waiters: Default::default(),
			metrics: Default::default(),
		}
	}

	/// Current phase of the state machine.
	pub fn phase(&self) -> RefreshPhase {
		match &*self.state.lock() {
			RefreshState::Idle { .. } => RefreshPhase::Idle,
			RefreshState::Refreshing { .. } => RefreshPhase::Refreshing,
		}
	}

	/// Callers currently subscribed to an in-flight episode they did not start.
	pub fn pending_waiters(&self) -> usize {
		self.waiters.load(Ordering::Acquire)
	}

	/// Episode counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Refreshes the stored credential, joining an in-flight episode when one exists.
	pub async fn refresh(&self) -> RefreshOutcome {
		self.refresh_after(None).await
	}

	/// Refreshes unless the stored bearer already differs from `stale`.
	///
	/// `stale` is the bearer a request was rejected with. When a newer bearer is stored the
	/// caller receives it without a network call.
	pub async fn refresh_after(&self, stale: Option<&TokenSecret>) -> RefreshOutcome {
		loop {
			let observed = match &*self.state.lock() {
				RefreshState::Refreshing { flight } => Err(flight.clone()),
				RefreshState::Idle { generation } => Ok(*generation),
			};
			let generation = match observed {
				Ok(generation) => generation,
				Err(flight) => return self.join(flight).await,
			};
			let current = self.store.get().await?;

			if let Some(newer) =
				current.as_ref().filter(|c| stale.is_some_and(|stale| c.bearer != *stale))
			{
				self.metrics.record_reused();
				obs::record_refresh(RefreshEvent::Reused);

				return Ok(newer.clone());
			}

			let flight = {
				let mut state = self.state.lock();

				if !matches!(&*state, RefreshState::Idle { generation: now } if *now == generation)
				{
					// Another caller started or finished an episode meanwhile; re-evaluate.
					continue;
				}

				let flight = self.start(generation, current);

				*state = RefreshState::Refreshing { flight: flight.clone() };

				flight
			};

			return flight.await;
		}
	}

	async fn join(&self, flight: SharedRefresh) -> RefreshOutcome {
		self.metrics.record_coalesced();
		obs::record_refresh(RefreshEvent::Coalesced);

		let _waiter = WaiterGuard::enter(&self.waiters);

		flight.await
	}

	fn start(&self, generation: u64, current: Option<Credential>) -> SharedRefresh {
		let store = self.store.clone();
		let refresher = self.refresher.clone();
		let state = self.state.clone();
		let metrics = self.metrics.clone();
		let span = RequestSpan::refresh();

		span.instrument(async move {
			let outcome = AssertUnwindSafe(Self::run(
				store.as_ref(),
				refresher.as_ref(),
				metrics.as_ref(),
				current,
			))
			.catch_unwind()
			.await
			.unwrap_or_else(|payload| {
				let failure =
					RefreshFailure::Panicked { message: panic_message(payload.as_ref()) };

				obs::log_refresh_failure(&failure);
				metrics.record_failure();
				obs::record_refresh(RefreshEvent::Failed);

				Err(failure)
			});

			*state.lock() = RefreshState::Idle { generation: generation + 1 };

			outcome
		})
		.boxed()
		.shared()
	}

	async fn run(
		store: &dyn CredentialStore,
		refresher: &dyn TokenRefresher,
		metrics: &RefreshMetrics,
		current: Option<Credential>,
	) -> RefreshOutcome {
		let Some((credential, refresh_token)) =
			current.and_then(|c| c.refresh.clone().map(|refresh| (c, refresh)))
		else {
			return Self::fail(store, metrics, RefreshFailure::MissingRefreshToken, None).await;
		};

		metrics.record_attempt();
		obs::record_refresh(RefreshEvent::Started);

		let response = match refresher.refresh(&refresh_token).await {
			Ok(response) => response,
			Err(failure) => return Self::fail(store, metrics, failure, Some(refresh_token)).await,
		};
		let rotated = credential.rotate(response.token, response.refresh_token);

		match store.compare_and_swap_refresh(refresh_token.clone(), Some(rotated.clone())).await {
			Ok(CompareAndSwapOutcome::Updated) => {},
			Ok(CompareAndSwapOutcome::RefreshMismatch) => {
				return Self::superseded(store, metrics).await;
			},
			Ok(CompareAndSwapOutcome::Missing) => {
				return Self::drop_result(metrics, RefreshFailure::Superseded);
			},
			Err(e) => return Self::fail(store, metrics, e.into(), Some(refresh_token)).await,
		}

		metrics.record_success();
		obs::record_refresh(RefreshEvent::Succeeded);

		Ok(rotated)
	}

	/// Clears the store and reports `failure`.
	///
	/// With `expected_refresh` set, the store is cleared only while it still holds that secret,
	/// so a credential written by a concurrent login survives.
	async fn fail(
		store: &dyn CredentialStore,
		metrics: &RefreshMetrics,
		failure: RefreshFailure,
		expected_refresh: Option<TokenSecret>,
	) -> RefreshOutcome {
		obs::log_refresh_failure(&failure);

		let cleared = match expected_refresh {
			Some(expected) => store.compare_and_swap_refresh(expected, None).await.map(|_| ()),
			None => store.clear().await,
		};

		if let Err(e) = cleared {
			obs::log_discarded("clear credential after failed refresh", &e);
		}

		metrics.record_failure();
		obs::record_refresh(RefreshEvent::Failed);

		Err(failure)
	}

	/// A newer login replaced the credential mid-flight; waiters retry with it.
	async fn superseded(store: &dyn CredentialStore, metrics: &RefreshMetrics) -> RefreshOutcome {
		match store.get().await {
			Ok(Some(newer)) => {
				metrics.record_reused();
				obs::record_refresh(RefreshEvent::Superseded);

				Ok(newer)
			},
			Ok(None) => Self::drop_result(metrics, RefreshFailure::Superseded),
			Err(e) => Self::drop_result(metrics, e.into()),
		}
	}

	/// Reports `failure` without touching the store.
	fn drop_result(metrics: &RefreshMetrics, failure: RefreshFailure) -> RefreshOutcome {
		obs::log_refresh_failure(&failure);
		metrics.record_failure();
		obs::record_refresh(RefreshEvent::Superseded);

		Err(failure)
	}
}
impl Debug for AuthRefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthRefreshCoordinator")
			.field("phase", &self.phase())
			.field("pending_waiters", &self.pending_waiters())
			.field("metrics", &self.metrics)
			.finish()
	}
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
	payload
		.downcast_ref::<&str>()
		.map(|message| (*message).to_owned())
		.or_else(|| payload.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| "non-string panic payload".into())
}

/// Counts a subscribed waiter until it resolves or is dropped.
struct WaiterGuard<'a>(&'a AtomicUsize);
impl<'a> WaiterGuard<'a> {
	fn enter(counter: &'a AtomicUsize) -> Self {
		counter.fetch_add(1, Ordering::AcqRel);

		Self(counter)
	}
}
impl Drop for WaiterGuard<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::AcqRel);
	}
}
