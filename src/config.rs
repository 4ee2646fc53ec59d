//! Client configuration: backend location, auth endpoint paths, timeouts, and metrics retention.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, error::ConfigError};

/// Errors raised while constructing or validating a [`ClientConfig`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigBuildError {
	/// The backend must be reached over HTTP(S).
	#[error("Base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// URL that failed validation.
		url: String,
	},
	/// The base URL cannot carry query strings or fragments.
	#[error("Base URL must not contain a query or fragment: {url}.")]
	BaseUrlHasQuery {
		/// URL that failed validation.
		url: String,
	},
	/// Timeouts and retention windows must be positive.
	#[error("The {setting} setting must be positive.")]
	NonPositiveDuration {
		/// Which setting failed validation.
		setting: &'static str,
	},
	/// Endpoint paths must be present.
	#[error("The {endpoint} endpoint path must not be empty.")]
	EmptyPath {
		/// Which endpoint failed validation.
		endpoint: &'static str,
	},
}

/// Validated configuration shared by the pipeline and the refresh call.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// Backend base URL every request path is resolved against.
	pub base_url: Url,
	/// Timeout applied to each domain request attempt.
	pub request_timeout: Duration,
	/// Timeout applied to the refresh call.
	pub refresh_timeout: Duration,
	/// Maximum age of records kept by the metrics collector.
	pub metrics_retention: Duration,
	/// Paths of the `/auth/*` endpoints.
	pub auth_paths: AuthPaths,
}
impl ClientConfig {
	/// Default per-attempt timeout.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(10);
	/// Default refresh timeout.
	pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::seconds(10);
	/// Default metrics retention window.
	pub const DEFAULT_METRICS_RETENTION: Duration = Duration::hours(1);

	/// Returns a builder for the provided backend base URL.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Resolves `path` against the base URL.
	///
	/// Leading slashes are treated as relative to the base path so a base of
	/// `https://host/api/` and a path of `/routes` resolve to `https://host/api/routes`.
	/// Absolute URLs pointing at another origin are rejected so the bearer never leaves the
	/// configured backend.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		let url = self
			.base_url
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidEndpoint { path: path.to_owned(), source })?;

		if url.origin() != self.base_url.origin() {
			return Err(ConfigError::ForeignEndpoint { path: path.to_owned() });
		}

		Ok(url)
	}

	/// Request timeout as a std duration for transports.
	pub fn request_timeout_std(&self) -> StdDuration {
		to_std(self.request_timeout)
	}

	/// Refresh timeout as a std duration for transports.
	pub fn refresh_timeout_std(&self) -> StdDuration {
		to_std(self.refresh_timeout)
	}
}

/// Paths of the backend's authentication endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPaths {
	/// `POST` endpoint exchanging account credentials for a token pair.
	pub login: String,
	/// `POST` endpoint exchanging a refresh credential for a new bearer.
	pub refresh: String,
	/// Best-effort `POST` endpoint invalidating the session.
	pub logout: String,
	/// `GET` endpoint returning the signed-in user.
	pub current_user: String,
}
impl Default for AuthPaths {
	fn default() -> Self {
		Self {
			login: "/auth/login".into(),
			refresh: "/auth/refresh".into(),
			logout: "/auth/logout".into(),
			current_user: "/auth/me".into(),
		}
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Backend base URL.
	pub base_url: Url,
	/// Per-attempt timeout.
	pub request_timeout: Duration,
	/// Refresh call timeout.
	pub refresh_timeout: Duration,
	/// Metrics retention window.
	pub metrics_retention: Duration,
	/// Auth endpoint paths.
	pub auth_paths: AuthPaths,
}
impl ClientConfigBuilder {
	/// Creates a builder seeded with defaults.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			request_timeout: ClientConfig::DEFAULT_REQUEST_TIMEOUT,
			refresh_timeout: ClientConfig::DEFAULT_REFRESH_TIMEOUT,
			metrics_retention: ClientConfig::DEFAULT_METRICS_RETENTION,
			auth_paths: AuthPaths::default(),
		}
	}

	/// Overrides the per-attempt timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the refresh call timeout.
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Overrides the metrics retention window.
	pub fn metrics_retention(mut self, retention: Duration) -> Self {
		self.metrics_retention = retention;

		self
	}

	/// Replaces every auth endpoint path.
	pub fn auth_paths(mut self, paths: AuthPaths) -> Self {
		self.auth_paths = paths;

		self
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.auth_paths.refresh = path.into();

		self
	}

	/// Validates the inputs and returns a [`ClientConfig`].
	pub fn build(self) -> Result<ClientConfig, ConfigBuildError> {
		self.validate()?;

		let mut base_url = self.base_url;

		// `Url::join` drops the last segment unless the path ends with a slash.
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		Ok(ClientConfig {
			base_url,
			request_timeout: self.request_timeout,
			refresh_timeout: self.refresh_timeout,
			metrics_retention: self.metrics_retention,
			auth_paths: self.auth_paths,
		})
	}

	fn validate(&self) -> Result<(), ConfigBuildError> {
		if !matches!(self.base_url.scheme(), "http" | "https") {
			return Err(ConfigBuildError::UnsupportedScheme { url: self.base_url.to_string() });
		}
		if self.base_url.query().is_some() || self.base_url.fragment().is_some() {
			return Err(ConfigBuildError::BaseUrlHasQuery { url: self.base_url.to_string() });
		}

		for (setting, value) in [
			("request_timeout", self.request_timeout),
			("refresh_timeout", self.refresh_timeout),
			("metrics_retention", self.metrics_retention),
		] {
			if !value.is_positive() {
				return Err(ConfigBuildError::NonPositiveDuration { setting });
			}
		}
		for (endpoint, path) in [
			("login", &self.auth_paths.login),
			("refresh", &self.auth_paths.refresh),
			("logout", &self.auth_paths.logout),
			("current_user", &self.auth_paths.current_user),
		] {
			if path.trim().is_empty() {
				return Err(ConfigBuildError::EmptyPath { endpoint });
			}
		}

		Ok(())
	}
}

pub(crate) fn to_std(duration: Duration) -> StdDuration {
	StdDuration::try_from(duration).unwrap_or(StdDuration::ZERO)
}
