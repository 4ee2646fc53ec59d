//! Session helpers layered on the pipeline: login, logout, and the current user.

// crates.io
use http::Method;
// self
use crate::{
	_prelude::*,
	auth::{LoginRequest, LoginResponse},
	error::ConfigError,
	http::{ApiRequest, Attempt, HttpTransport, RequestDescriptor},
	obs,
	pipeline::RequestPipeline,
};

impl<T> RequestPipeline<T>
where
	T: ?Sized + HttpTransport,
{
	/// Exchanges account credentials for a credential pair and stores it.
	///
	/// A 401 here means bad credentials, so the call never enters refresh recovery.
	pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse> {
		let request = ApiRequest::new(Method::POST, self.config.auth_paths.login.as_str())
			.with_json(credentials)
			.map_err(ConfigError::from)?;
		let url = self.config.endpoint(&request.path)?;
		let descriptor = RequestDescriptor::from_request(request, url, self.config.request_timeout);
		let response = self.execute(&descriptor).await?;
		let login = Self::settle(response, Attempt::Initial)?.json::<LoginResponse>()?;

		self.store.set(login.credential()).await?;

		Ok(login)
	}

	/// Notifies the backend and always drops the local credential.
	///
	/// Backend failures are logged and discarded; only a store failure is returned.
	pub async fn logout(&self) -> Result<()> {
		if let Err(e) = self.notify_logout().await {
			obs::log_discarded("logout", &e);
		}

		self.store.clear().await?;

		Ok(())
	}

	/// Fetches the signed-in user's profile.
	pub async fn current_user<U>(&self) -> Result<U>
	where
		U: for<'de> Deserialize<'de>,
	{
		self.get_json(&self.config.auth_paths.current_user).await
	}

	/// Returns `true` when a credential is stored.
	pub async fn is_authenticated(&self) -> Result<bool> {
		Ok(self.store.get().await?.is_some())
	}

	async fn notify_logout(&self) -> Result<()> {
		let credential = self.store.get().await?;
		let url = self.config.endpoint(&self.config.auth_paths.logout)?;
		let descriptor = RequestDescriptor::new(Method::POST, url, self.config.request_timeout)
			.authorized(credential.as_ref())?;
		let response = self.execute(&descriptor).await?;

		Self::settle(response, Attempt::Initial).map(|_| ())
	}
}
