//! Thread-safe in-memory [`CredentialStore`] for tests and ephemeral sessions.

// self
use crate::{
	_prelude::*,
	auth::Credential,
	auth::TokenSecret,
	store::{CompareAndSwapOutcome, CredentialStore, StoreFuture},
};

/// Keeps the credential in-process; nothing survives a restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Option<Credential>>>);
impl MemoryStore {
	/// Creates a store seeded with `credential`.
	pub fn with_credential(credential: Credential) -> Self {
		Self(Arc::new(RwLock::new(Some(credential))))
	}

	/// Returns the current credential without going through the async contract.
	pub fn current(&self) -> Option<Credential> {
		self.0.read().clone()
	}
}
impl CredentialStore for MemoryStore {
	fn get(&self) -> StoreFuture<'_, Option<Credential>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(slot.read().clone()) })
	}

	fn set(&self, credential: Credential) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.write() = Some(credential);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			slot.write().take();

			Ok(())
		})
	}

	fn compare_and_swap_refresh(
		&self,
		expected_refresh: TokenSecret,
		replacement: Option<Credential>,
	) -> StoreFuture<'_, CompareAndSwapOutcome> {
		let slot = self.0.clone();

		Box::pin(async move {
			let mut guard = slot.write();
			let outcome = CompareAndSwapOutcome::evaluate(guard.as_ref(), &expected_refresh);

			if outcome == CompareAndSwapOutcome::Updated {
				*guard = replacement;
			}

			Ok(outcome)
		})
	}
}
