//! Token persistence: the platform key-value contract, built-in backends, and the
//! [`TokenStore`] that keeps the credential pair and cached user on top of them.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	obs,
};

/// Boxed future returned by [`KeyValueStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Platform storage contract (browser local storage, secure device storage, files).
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Reads the value stored under `key`, if present.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Writes `value` under `key`, replacing any previous value.
	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

	/// Removes `key`; removing a missing key succeeds.
	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`KeyValueStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend or the user cache.
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

/// Storage keys used for one client profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreKeys {
	/// Key holding the access token.
	pub access_token: String,
	/// Key holding the refresh token.
	pub refresh_token: String,
	/// Key holding the JSON-serialized user profile.
	pub user: String,
}
impl StoreKeys {
	/// Layout used by the admin dashboard's local storage.
	pub fn admin() -> Self {
		Self::with_prefix("ra_admin")
	}

	/// Layout used by the mobile app's secure storage.
	pub fn mobile() -> Self {
		Self::with_prefix("app")
	}

	/// Builds `{prefix}_access_token`, `{prefix}_refresh_token`, and `{prefix}_user`.
	pub fn with_prefix(prefix: &str) -> Self {
		Self {
			access_token: format!("{prefix}_access_token"),
			refresh_token: format!("{prefix}_refresh_token"),
			user: format!("{prefix}_user"),
		}
	}
}

/// Durable home of the credential pair and the cached user profile.
///
/// Reads never fail: backend errors are logged and reported as "absent", so a broken store
/// behaves like a signed-out one. Writes surface [`StoreError`] to the caller.
#[derive(Clone)]
pub struct TokenStore {
	backend: Arc<dyn KeyValueStore>,
	keys: StoreKeys,
}
impl TokenStore {
	/// Wraps `backend` using the provided key layout.
	pub fn new(backend: Arc<dyn KeyValueStore>, keys: StoreKeys) -> Self {
		Self { backend, keys }
	}

	/// Returns the key layout in use.
	pub fn keys(&self) -> &StoreKeys {
		&self.keys
	}

	/// Returns the stored access token, or `None` when absent or unreadable.
	pub async fn access_token(&self) -> Option<TokenSecret> {
		self.read_secret(&self.keys.access_token, "access_token").await
	}

	/// Returns the stored refresh token, or `None` when absent or unreadable.
	pub async fn refresh_token(&self) -> Option<TokenSecret> {
		self.read_secret(&self.keys.refresh_token, "refresh_token").await
	}

	/// Returns both tokens, or `None` when either one is missing.
	pub async fn credentials(&self) -> Option<CredentialPair> {
		let access_token = self.access_token().await?;
		let refresh_token = self.refresh_token().await?;

		Some(CredentialPair { access_token, refresh_token })
	}

	/// Writes both tokens in sequence. A failure on the second write leaves the first in place.
	pub async fn set_tokens(&self, pair: &CredentialPair) -> Result<(), StoreError> {
		self.backend.set(&self.keys.access_token, pair.access_token.expose().to_owned()).await?;
		self.backend.set(&self.keys.refresh_token, pair.refresh_token.expose().to_owned()).await
	}

	/// Removes both tokens. Clearing an empty store succeeds.
	pub async fn clear_tokens(&self) -> Result<(), StoreError> {
		self.backend.remove(&self.keys.access_token).await?;
		self.backend.remove(&self.keys.refresh_token).await
	}

	/// Returns `true` when an access token is present. Expiry is only discovered by the backend.
	pub async fn has_valid_token(&self) -> bool {
		self.access_token().await.is_some()
	}

	/// Returns the cached user, or `None` when absent, unreadable, or malformed.
	pub async fn user<T>(&self) -> Option<T>
	where
		T: DeserializeOwned,
	{
		let raw = match self.backend.get(&self.keys.user).await {
			Ok(raw) => raw?,
			Err(e) => {
				obs::log_store_failure("read_user", &e);

				return None;
			},
		};

		match serde_json::from_str(&raw) {
			Ok(user) => Some(user),
			Err(e) => {
				obs::log_store_failure(
					"parse_user",
					&StoreError::Serialization { message: e.to_string() },
				);

				None
			},
		}
	}

	/// Caches `user` as JSON.
	pub async fn set_user<T>(&self, user: &T) -> Result<(), StoreError>
	where
		T: ?Sized + Serialize,
	{
		let raw = serde_json::to_string(user)
			.map_err(|e| StoreError::Serialization { message: e.to_string() })?;

		self.backend.set(&self.keys.user, raw).await
	}

	/// Drops the cached user.
	pub async fn clear_user(&self) -> Result<(), StoreError> {
		self.backend.remove(&self.keys.user).await
	}

	/// Removes both tokens and the cached user, attempting every removal even if one fails.
	pub async fn clear_all(&self) -> Result<(), StoreError> {
		let tokens = self.clear_tokens().await;
		let user = self.clear_user().await;

		tokens.and(user)
	}

	async fn read_secret(&self, key: &str, op: &'static str) -> Option<TokenSecret> {
		match self.backend.get(key).await {
			Ok(value) => value.and_then(TokenSecret::non_empty),
			Err(e) => {
				obs::log_store_failure(op, &e);

				None
			},
		}
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenStore").field("keys", &self.keys).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::UserProfile;

	struct BrokenStore;
	impl KeyValueStore for BrokenStore {
		fn get<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<String>> {
			Box::pin(async { Err(StoreError::Backend { message: "keychain locked".into() }) })
		}

		fn set<'a>(&'a self, _key: &'a str, _value: String) -> StoreFuture<'a, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "keychain locked".into() }) })
		}

		fn remove<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "keychain locked".into() }) })
		}
	}

	fn memory_store(keys: StoreKeys) -> (TokenStore, Arc<MemoryStore>) {
		let backend = Arc::new(MemoryStore::default());

		(TokenStore::new(backend.clone(), keys), backend)
	}

	#[test]
	fn profile_key_layouts_match_platform_storage() {
		let admin = StoreKeys::admin();
		let mobile = StoreKeys::mobile();

		assert_eq!(admin.access_token, "ra_admin_access_token");
		assert_eq!(admin.refresh_token, "ra_admin_refresh_token");
		assert_eq!(admin.user, "ra_admin_user");
		assert_eq!(mobile.access_token, "app_access_token");
		assert_eq!(mobile.refresh_token, "app_refresh_token");
		assert_eq!(mobile.user, "app_user");
	}

	#[tokio::test]
	async fn set_tokens_writes_both_keys() {
		let (store, backend) = memory_store(StoreKeys::admin());

		store
			.set_tokens(&CredentialPair::new("access-1", "refresh-1"))
			.await
			.expect("Writing tokens into memory storage should succeed.");

		assert_eq!(backend.snapshot().get("ra_admin_access_token"), Some(&"access-1".to_owned()));
		assert_eq!(backend.snapshot().get("ra_admin_refresh_token"), Some(&"refresh-1".to_owned()));
		assert!(store.has_valid_token().await);
		assert_eq!(store.credentials().await, Some(CredentialPair::new("access-1", "refresh-1")));
	}

	#[tokio::test]
	async fn clear_tokens_is_idempotent() {
		let (store, _) = memory_store(StoreKeys::mobile());

		store
			.set_tokens(&CredentialPair::new("access-1", "refresh-1"))
			.await
			.expect("Writing tokens into memory storage should succeed.");

		for _ in 0..2 {
			store.clear_tokens().await.expect("Clearing tokens should never fail.");

			assert!(store.access_token().await.is_none());
			assert!(store.refresh_token().await.is_none());
		}
	}

	#[tokio::test]
	async fn partial_state_is_not_a_credential_pair() {
		let (store, backend) = memory_store(StoreKeys::mobile());

		backend
			.set("app_access_token", "access-only".into())
			.await
			.expect("Seeding memory storage should succeed.");

		assert!(store.has_valid_token().await);
		assert!(store.credentials().await.is_none());
	}

	#[tokio::test]
	async fn broken_backend_reads_as_signed_out() {
		let store = TokenStore::new(Arc::new(BrokenStore), StoreKeys::admin());

		assert!(store.access_token().await.is_none());
		assert!(store.refresh_token().await.is_none());
		assert!(!store.has_valid_token().await);
		assert!(store.user::<UserProfile>().await.is_none());
		assert!(store.clear_tokens().await.is_err());
	}

	#[tokio::test]
	async fn malformed_user_cache_reads_as_absent() {
		let (store, backend) = memory_store(StoreKeys::admin());

		backend.set("ra_admin_user", "{not json".into()).await.expect("Seeding should succeed.");

		assert!(store.user::<UserProfile>().await.is_none());
	}

	#[tokio::test]
	async fn clear_all_drops_tokens_and_user() {
		let (store, backend) = memory_store(StoreKeys::admin());
		let user = UserProfile { email: "superadmin@ra.gov.na".into(), ..Default::default() };

		store
			.set_tokens(&CredentialPair::new("access-1", "refresh-1"))
			.await
			.expect("Writing tokens should succeed.");
		store.set_user(&user).await.expect("Caching the user should succeed.");

		assert_eq!(store.user::<UserProfile>().await, Some(user));

		store.clear_all().await.expect("Clearing the store should succeed.");

		assert!(backend.snapshot().is_empty());
	}
}
