//! Client configuration: profile presets, endpoint layout, and a validating builder.

// self
use crate::{_prelude::*, error::ConfigError, retry::RetryPolicy, store::StoreKeys};

/// Front end a client is composed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientProfile {
	/// Browser admin dashboard: local storage, 30 s timeout, no retries.
	Admin,
	/// Mobile app: secure device storage, 15 s timeout, linear-backoff retries.
	Mobile,
}
impl ClientProfile {
	/// Returns a stable label suitable for span fields and error messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Admin => "admin",
			Self::Mobile => "mobile",
		}
	}

	/// Default per-request timeout.
	pub const fn default_timeout(self) -> Duration {
		match self {
			Self::Admin => Duration::from_secs(30),
			Self::Mobile => Duration::from_secs(15),
		}
	}

	/// Default retry policy.
	pub const fn default_retry(self) -> RetryPolicy {
		match self {
			Self::Admin => RetryPolicy::none(),
			Self::Mobile => RetryPolicy::MOBILE,
		}
	}

	/// Default endpoint layout.
	pub fn default_endpoints(self) -> AuthEndpoints {
		match self {
			Self::Admin => AuthEndpoints {
				login: "/auth/login".into(),
				refresh: "/auth/refresh".into(),
				logout: "/auth/logout".into(),
				register: None,
				profile: None,
				change_password: None,
				verify_email: None,
				resend_verification: None,
			},
			Self::Mobile => AuthEndpoints {
				login: "/app-users/login".into(),
				refresh: "/app-users/refresh".into(),
				logout: "/app-users/logout".into(),
				register: Some("/app-users/register".into()),
				profile: Some("/app-users/me".into()),
				change_password: Some("/app-users/me/password".into()),
				verify_email: Some("/app-users/verify-email".into()),
				resend_verification: Some("/app-users/resend-verification".into()),
			},
		}
	}

	/// Default storage key layout.
	pub fn default_store_keys(self) -> StoreKeys {
		match self {
			Self::Admin => StoreKeys::admin(),
			Self::Mobile => StoreKeys::mobile(),
		}
	}

	/// Route the UI should navigate to once the session expires; `None` means forced logout.
	pub fn default_login_route(self) -> Option<String> {
		match self {
			Self::Admin => Some("/login".into()),
			Self::Mobile => None,
		}
	}
}
impl Display for ClientProfile {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Authentication endpoints, relative to the API prefix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEndpoints {
	/// Credential exchange.
	pub login: String,
	/// Access-token refresh.
	pub refresh: String,
	/// Server-side sign-out.
	pub logout: String,
	/// Self-service registration, when offered.
	pub register: Option<String>,
	/// Current-user profile (read and update), when offered.
	pub profile: Option<String>,
	/// Password change for the signed-in user, when offered.
	#[serde(default)]
	pub change_password: Option<String>,
	/// Email verification by emailed token, when offered.
	#[serde(default)]
	pub verify_email: Option<String>,
	/// Re-sends the verification email, when offered.
	#[serde(default)]
	pub resend_verification: Option<String>,
}

/// Immutable client configuration consumed by [`crate::client::ApiClient`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Profile the configuration was seeded from.
	pub profile: ClientProfile,
	/// Backend origin, e.g. `https://api.ra.org.na`.
	pub base_url: Url,
	/// Path prefix shared by every endpoint, e.g. `/api`.
	pub api_prefix: String,
	/// Default per-request timeout.
	pub timeout: Duration,
	/// Timeout used by login and register calls.
	pub sign_in_timeout: Duration,
	/// Retry policy for transient failures.
	pub retry: RetryPolicy,
	/// Authentication endpoints.
	pub endpoints: AuthEndpoints,
	/// Storage key layout.
	pub store_keys: StoreKeys,
	/// Route reported to the session hook on expiry.
	pub login_route: Option<String>,
}
impl ClientConfig {
	/// Creates a new builder seeded with the profile's defaults.
	pub fn builder(profile: ClientProfile, base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(profile, base_url)
	}

	/// Resolves `path` (relative to the API prefix, optionally with a query) to a full URL.
	pub fn endpoint_url(&self, path: &str) -> Result<Url, ConfigError> {
		let origin = self.base_url.as_str().trim_end_matches('/');
		let separator = if path.starts_with('/') || path.is_empty() { "" } else { "/" };
		let raw = format!("{origin}{}{separator}{path}", self.api_prefix);

		Url::parse(&raw).map_err(|source| ConfigError::InvalidEndpoint { path: path.into(), source })
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Profile supplying defaults.
	pub profile: ClientProfile,
	/// Backend origin.
	pub base_url: Url,
	/// Path prefix shared by every endpoint.
	pub api_prefix: String,
	/// Default per-request timeout.
	pub timeout: Duration,
	/// Timeout used by login and register calls.
	pub sign_in_timeout: Duration,
	/// Retry policy for transient failures.
	pub retry: RetryPolicy,
	/// Authentication endpoints.
	pub endpoints: AuthEndpoints,
	/// Storage key layout.
	pub store_keys: StoreKeys,
	/// Route reported to the session hook on expiry.
	pub login_route: Option<String>,
}
impl ClientConfigBuilder {
	const DEFAULT_API_PREFIX: &'static str = "/api";
	const SIGN_IN_TIMEOUT: Duration = Duration::from_secs(30);

	/// Creates a builder seeded with `profile` defaults.
	pub fn new(profile: ClientProfile, base_url: Url) -> Self {
		Self {
			profile,
			base_url,
			api_prefix: Self::DEFAULT_API_PREFIX.into(),
			timeout: profile.default_timeout(),
			sign_in_timeout: Self::SIGN_IN_TIMEOUT,
			retry: profile.default_retry(),
			endpoints: profile.default_endpoints(),
			store_keys: profile.default_store_keys(),
			login_route: profile.default_login_route(),
		}
	}

	/// Overrides the API prefix (defaults to `/api`).
	pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.api_prefix = prefix.into();

		self
	}

	/// Overrides the default per-request timeout.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the login/register timeout (defaults to 30 seconds).
	pub fn sign_in_timeout(mut self, timeout: Duration) -> Self {
		self.sign_in_timeout = timeout;

		self
	}

	/// Overrides the retry policy.
	pub fn retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides the authentication endpoints.
	pub fn endpoints(mut self, endpoints: AuthEndpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Overrides the storage key layout.
	pub fn store_keys(mut self, keys: StoreKeys) -> Self {
		self.store_keys = keys;

		self
	}

	/// Overrides the login route reported on session expiry.
	pub fn login_route(mut self, route: Option<String>) -> Self {
		self.login_route = route;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let config = ClientConfig {
			profile: self.profile,
			base_url: self.base_url,
			api_prefix: self.api_prefix.trim_end_matches('/').to_owned(),
			timeout: self.timeout,
			sign_in_timeout: self.sign_in_timeout,
			retry: self.retry,
			endpoints: self.endpoints,
			store_keys: self.store_keys,
			login_route: self.login_route,
		};

		config.validate()?;

		Ok(config)
	}
}

impl ClientConfig {
	/// Validates invariants for the configuration.
	fn validate(&self) -> Result<(), ConfigError> {
		if !matches!(self.base_url.scheme(), "http" | "https") || self.base_url.cannot_be_a_base() {
			return Err(ConfigError::InvalidBaseUrl { url: self.base_url.to_string() });
		}
		if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
			return Err(ConfigError::InvalidApiPrefix { prefix: self.api_prefix.clone() });
		}
		if self.timeout.is_zero() || self.sign_in_timeout.is_zero() {
			return Err(ConfigError::ZeroTimeout);
		}

		self.endpoint_url(&self.endpoints.refresh)?;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base() -> Url {
		Url::parse("https://api.ra.org.na").expect("Fixture base URL should parse.")
	}

	#[test]
	fn admin_defaults() {
		let config = ClientConfig::builder(ClientProfile::Admin, base())
			.build()
			.expect("Admin defaults should validate.");

		assert_eq!(config.timeout, Duration::from_secs(30));
		assert!(config.retry.is_disabled());
		assert_eq!(config.store_keys, StoreKeys::admin());
		assert_eq!(config.login_route.as_deref(), Some("/login"));
		assert_eq!(
			config.endpoint_url(&config.endpoints.refresh).expect("Refresh URL should resolve."),
			Url::parse("https://api.ra.org.na/api/auth/refresh").expect("Expected URL parses."),
		);
	}

	#[test]
	fn mobile_defaults() {
		let config = ClientConfig::builder(ClientProfile::Mobile, base())
			.build()
			.expect("Mobile defaults should validate.");

		assert_eq!(config.timeout, Duration::from_secs(15));
		assert_eq!(config.retry, RetryPolicy::MOBILE);
		assert_eq!(config.store_keys, StoreKeys::mobile());
		assert!(config.login_route.is_none());
		assert_eq!(
			config.endpoint_url(&config.endpoints.refresh).expect("Refresh URL should resolve."),
			Url::parse("https://api.ra.org.na/api/app-users/refresh").expect("Expected URL parses."),
		);
	}

	#[test]
	fn endpoint_url_keeps_queries_and_normalizes_slashes() {
		let config = ClientConfig::builder(
			ClientProfile::Admin,
			Url::parse("http://localhost:5000/").expect("Fixture base URL should parse."),
		)
		.api_prefix("/api/")
		.build()
		.expect("Trailing slashes should be tolerated.");
		let url = config.endpoint_url("news?page=2&limit=10").expect("News URL should resolve.");

		assert_eq!(url.as_str(), "http://localhost:5000/api/news?page=2&limit=10");
	}

	#[test]
	fn rejects_invalid_settings() {
		let err = ClientConfig::builder(
			ClientProfile::Admin,
			Url::parse("ftp://files.ra.org.na").expect("Fixture URL should parse."),
		)
		.build()
		.expect_err("Non-HTTP schemes should be rejected.");

		assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));

		let err = ClientConfig::builder(ClientProfile::Mobile, base())
			.api_prefix("api")
			.build()
			.expect_err("Relative prefixes should be rejected.");

		assert!(matches!(err, ConfigError::InvalidApiPrefix { .. }));

		let err = ClientConfig::builder(ClientProfile::Mobile, base())
			.timeout(Duration::ZERO)
			.build()
			.expect_err("Zero timeouts should be rejected.");

		assert!(matches!(err, ConfigError::ZeroTimeout));
	}

	#[test]
	fn config_round_trips_through_json() {
		let config = ClientConfig::builder(ClientProfile::Mobile, base())
			.build()
			.expect("Mobile defaults should validate.");
		let json = serde_json::to_string(&config).expect("Config should serialize.");
		let parsed: ClientConfig = serde_json::from_str(&json).expect("Config should parse.");

		assert_eq!(parsed, config);
	}
}
