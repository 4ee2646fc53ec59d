//! File-backed [`CredentialStore`] that persists into a JSON key-value document.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	store::{
		AUTH_TOKEN_KEY, CompareAndSwapOutcome, CredentialStore, REFRESH_TOKEN_KEY, StoreError,
		StoreFuture,
	},
};

type Entries = BTreeMap<String, String>;

/// Persists the credential under the `auth_token`/`refresh_token` keys of a JSON object.
///
/// Keys written by other components are loaded and written back untouched.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Entries>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let entries = Self::load_entries(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(entries)) })
	}

	/// Location of the backing document.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_entries(path: &Path) -> Result<Entries, StoreError> {
		if !path.exists() {
			return Ok(Entries::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(Entries::new());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, entries: &Entries) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize credential entries: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn write_credential(entries: &mut Entries, credential: Credential) {
		entries.insert(AUTH_TOKEN_KEY.into(), credential.bearer.expose().into());

		match credential.refresh {
			Some(refresh) => entries.insert(REFRESH_TOKEN_KEY.into(), refresh.expose().into()),
			None => entries.remove(REFRESH_TOKEN_KEY),
		};
	}

	fn credential_from(entries: &Entries) -> Option<Credential> {
		let bearer = entries.get(AUTH_TOKEN_KEY)?;

		Some(Credential {
			bearer: TokenSecret::new(bearer.as_str()),
			refresh: entries.get(REFRESH_TOKEN_KEY).map(|value| TokenSecret::new(value.as_str())),
		})
	}
}
impl CredentialStore for FileStore {
	fn get(&self) -> StoreFuture<'_, Option<Credential>> {
		Box::pin(async move { Ok(Self::credential_from(&self.inner.read())) })
	}

	fn set(&self, credential: Credential) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			Self::write_credential(&mut guard, credential);

			self.persist_locked(&guard)
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let had_bearer = guard.remove(AUTH_TOKEN_KEY).is_some();
			let had_refresh = guard.remove(REFRESH_TOKEN_KEY).is_some();

			if had_bearer || had_refresh {
				self.persist_locked(&guard)?;
			}

			Ok(())
		})
	}

	fn compare_and_swap_refresh(
		&self,
		expected_refresh: TokenSecret,
		replacement: Option<Credential>,
	) -> StoreFuture<'_, CompareAndSwapOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let current = Self::credential_from(&guard);
			let outcome = CompareAndSwapOutcome::evaluate(current.as_ref(), &expected_refresh);

			if outcome == CompareAndSwapOutcome::Updated {
				match replacement {
					Some(credential) => Self::write_credential(&mut guard, credential),
					None => {
						guard.remove(AUTH_TOKEN_KEY);
						guard.remove(REFRESH_TOKEN_KEY);
					},
				}

				self.persist_locked(&guard)?;
			}

			Ok(outcome)
		})
	}
}
