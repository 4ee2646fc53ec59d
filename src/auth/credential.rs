//! Bearer credential pair held by the credential store.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Bearer credential plus the optional refresh credential used to renew it.
///
/// Both values are opaque to the client; expiry is only understood by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Secret presented as `Authorization: Bearer <value>`.
	#[serde(rename = "auth_token")]
	pub bearer: TokenSecret,
	/// Secret exchanged at the refresh endpoint for a new bearer.
	#[serde(rename = "refresh_token", default, skip_serializing_if = "Option::is_none")]
	pub refresh: Option<TokenSecret>,
}
impl Credential {
	/// Creates a credential without a refresh secret.
	pub fn new(bearer: impl Into<String>) -> Self {
		Self { bearer: TokenSecret::new(bearer), refresh: None }
	}

	/// Attaches a refresh secret.
	pub fn with_refresh(mut self, refresh: impl Into<String>) -> Self {
		self.refresh = Some(TokenSecret::new(refresh));

		self
	}

	/// Returns a credential carrying `bearer`, keeping the current refresh secret unless a
	/// replacement is supplied.
	pub fn rotate(&self, bearer: TokenSecret, refresh: Option<TokenSecret>) -> Self {
		Self { bearer, refresh: refresh.or_else(|| self.refresh.clone()) }
	}

	/// Returns `true` when the credential can be renewed.
	pub fn can_refresh(&self) -> bool {
		self.refresh.is_some()
	}
}
