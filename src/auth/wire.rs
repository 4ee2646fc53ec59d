//! JSON payloads exchanged with the backend's `/auth/*` endpoints.

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
};

/// Body of `POST /auth/login`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
	/// Account email.
	pub email: String,
	/// Account password; never logged.
	pub password: String,
	/// Asks the backend for a longer-lived refresh credential.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub remember_me: Option<bool>,
}
impl LoginRequest {
	/// Creates a login request for the provided account.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into(), remember_me: None }
	}

	/// Sets the `rememberMe` flag.
	pub fn remember_me(mut self, remember: bool) -> Self {
		self.remember_me = Some(remember);

		self
	}
}
impl Debug for LoginRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginRequest")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.field("remember_me", &self.remember_me)
			.finish()
	}
}

/// Response of `POST /auth/login`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
	/// User profile, kept opaque.
	pub user: serde_json::Value,
	/// Bearer credential.
	pub token: TokenSecret,
	/// Refresh credential.
	pub refresh_token: TokenSecret,
	/// Bearer lifetime in seconds as reported by the backend.
	pub expires_in: u64,
}
impl LoginResponse {
	/// Builds the credential pair to persist.
	pub fn credential(&self) -> Credential {
		Credential { bearer: self.token.clone(), refresh: Some(self.refresh_token.clone()) }
	}
}

/// Response of `POST /auth/refresh`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
	/// New bearer credential.
	pub token: TokenSecret,
	/// Rotated refresh credential, when the backend issues one.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
}
