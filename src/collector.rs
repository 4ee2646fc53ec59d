//! Time-windowed request metrics backing the dashboard's latency and error-rate widgets.

// std
use std::collections::VecDeque;
// crates.io
use http::Method;
// self
use crate::_prelude::*;

/// Outcome of one physical transport attempt. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
	/// Instant the attempt started.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
	/// Wall-clock duration of the attempt.
	pub duration: Duration,
	/// Final HTTP status; `None` when no response was received.
	pub status: Option<u16>,
	/// Target URL.
	pub url: String,
	/// HTTP method.
	#[serde(with = "method_label")]
	pub method: Method,
}
impl MetricRecord {
	/// Creates a record for an attempt started at `timestamp`.
	pub fn new(
		timestamp: OffsetDateTime,
		duration: Duration,
		status: Option<u16>,
		url: impl Into<String>,
		method: Method,
	) -> Self {
		Self { timestamp, duration, status, url: url.into(), method }
	}

	/// Duration in (fractional) milliseconds.
	pub fn duration_ms(&self) -> f64 {
		self.duration.whole_microseconds() as f64 / 1_000.
	}

	/// Returns `true` for statuses of 400 and above or for network failures.
	pub fn is_error(&self) -> bool {
		self.status.is_none_or(|status| status >= 400)
	}
}

/// Aggregates over the retained window, ready to serialize for dashboards.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
	/// Records currently retained.
	pub total: usize,
	/// Records counted as errors.
	pub errors: usize,
	/// Mean attempt duration in milliseconds.
	pub average_duration_ms: f64,
	/// Error percentage in `0..=100`.
	pub error_rate: f64,
}

/// Bounded, queryable record of recent request outcomes.
///
/// Construct one per process (or per test) and share it behind an `Arc`. The window is kept
/// ordered by start time, and records older than the retention window are dropped from the
/// front on every insertion.
#[derive(Debug)]
pub struct MetricsCollector {
	retention: Duration,
	window: Mutex<VecDeque<MetricRecord>>,
}
impl MetricsCollector {
	/// Creates an empty collector that keeps records for `retention`.
	pub fn new(retention: Duration) -> Self {
		Self { retention, window: Mutex::new(VecDeque::new()) }
	}

	/// Retention window.
	pub fn retention(&self) -> Duration {
		self.retention
	}

	/// Appends `metric` and prunes relative to the current clock.
	pub fn record(&self, metric: MetricRecord) {
		self.record_at(metric, OffsetDateTime::now_utc());
	}

	/// Inserts `metric` in start order and prunes every record older than `now - retention`.
	pub fn record_at(&self, metric: MetricRecord, now: OffsetDateTime) {
		let cutoff = now - self.retention;
		let mut window = self.window.lock();
		// Attempts finish out of order; a slow attempt lands behind faster ones that started later.
		let slot = window.partition_point(|record| record.timestamp <= metric.timestamp);

		window.insert(slot, metric);

		while window.front().is_some_and(|oldest| oldest.timestamp < cutoff) {
			window.pop_front();
		}
	}

	/// Mean duration in milliseconds; `0.0` for an empty window.
	pub fn average_duration(&self) -> f64 {
		let window = self.window.lock();

		if window.is_empty() {
			return 0.;
		}

		window.iter().map(MetricRecord::duration_ms).sum::<f64>() / window.len() as f64
	}

	/// Percentage of error records; `0.0` for an empty window.
	pub fn error_rate(&self) -> f64 {
		let window = self.window.lock();

		if window.is_empty() {
			return 0.;
		}

		let errors = window.iter().filter(|record| record.is_error()).count();

		errors as f64 / window.len() as f64 * 100.
	}

	/// Copy of the retained records ordered by start time.
	pub fn snapshot(&self) -> Vec<MetricRecord> {
		self.window.lock().iter().cloned().collect()
	}

	/// Computes every aggregate under a single lock.
	pub fn summary(&self) -> MetricsSummary {
		let window = self.window.lock();
		let total = window.len();

		if total == 0 {
			return MetricsSummary { total, errors: 0, average_duration_ms: 0., error_rate: 0. };
		}

		let errors = window.iter().filter(|record| record.is_error()).count();
		let duration_sum = window.iter().map(MetricRecord::duration_ms).sum::<f64>();

		MetricsSummary {
			total,
			errors,
			average_duration_ms: duration_sum / total as f64,
			error_rate: errors as f64 / total as f64 * 100.,
		}
	}

	/// Number of retained records.
	pub fn len(&self) -> usize {
		self.window.lock().len()
	}

	/// Returns `true` when nothing is retained.
	pub fn is_empty(&self) -> bool {
		self.window.lock().is_empty()
	}
}
impl Default for MetricsCollector {
	fn default() -> Self {
		Self::new(Duration::hours(1))
	}
}

mod method_label {
	// std
	use std::str::FromStr;
	// crates.io
	use http::Method;
	use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

	pub fn serialize<S>(method: &Method, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(method.as_str())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Method, D::Error>
	where
		D: Deserializer<'de>,
	{
		let label = String::deserialize(deserializer)?;

		Method::from_str(&label).map_err(D::Error::custom)
	}
}
