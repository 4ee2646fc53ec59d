//! Credential storage contract and built-in store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
};

/// Persisted key holding the bearer credential.
pub const AUTH_TOKEN_KEY: &str = "auth_token";
/// Persisted key holding the refresh credential.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend for the single bearer/refresh credential pair.
///
/// The refresh coordinator writes through [`CredentialStore::compare_and_swap_refresh`] so a
/// logout or login that lands while a refresh is in flight is never overwritten.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the stored credential, if any.
	fn get(&self) -> StoreFuture<'_, Option<Credential>>;

	/// Persists or replaces the credential.
	fn set(&self, credential: Credential) -> StoreFuture<'_, ()>;

	/// Removes both the bearer and the refresh credential.
	fn clear(&self) -> StoreFuture<'_, ()>;

	/// Replaces the credential only while the stored refresh secret equals `expected_refresh`;
	/// a `None` replacement clears the store under the same condition.
	///
	/// The check and the write must be atomic with respect to `set` and `clear`.
	fn compare_and_swap_refresh(
		&self,
		expected_refresh: TokenSecret,
		replacement: Option<Credential>,
	) -> StoreFuture<'_, CompareAndSwapOutcome>;
}

/// Result of a refresh compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The refresh secret matched and the credential was replaced or cleared.
	Updated,
	/// A credential is stored but its refresh secret differs (a new login happened).
	RefreshMismatch,
	/// Nothing is stored (the session was logged out).
	Missing,
}
impl CompareAndSwapOutcome {
	/// Compares the stored credential with the expected refresh secret.
	pub fn evaluate(current: Option<&Credential>, expected_refresh: &TokenSecret) -> Self {
		match current {
			None => Self::Missing,
			Some(credential) if credential.refresh.as_ref() == Some(expected_refresh) =>
				Self::Updated,
			Some(_) => Self::RefreshMismatch,
		}
	}
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
