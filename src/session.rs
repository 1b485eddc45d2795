//! Session lifecycle: sign-in, sign-out, the refresh call itself, and expiry notification.

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret, UserProfile},
	client::{ApiClient, ApiRequest, RequestContext, envelope},
	config::ClientProfile,
	error::ConfigError,
	http::HttpTransport,
	obs::{self, CallKind, CallOutcome, CallSpan},
	refresh::RefreshOutcome,
};

/// Why a session ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpiryCause {
	/// A 401 arrived but no refresh token was stored.
	MissingRefreshToken,
	/// The refresh endpoint answered with an error or an unusable payload.
	RefreshRejected {
		/// HTTP status, when the backend answered non-2xx.
		status: Option<u16>,
		/// Backend message, when supplied.
		message: Option<String>,
	},
	/// The refresh call never produced a response.
	RefreshUnavailable {
		/// Rendered transport failure.
		message: String,
	},
}
impl ExpiryCause {
	fn from_refresh_error(err: &Error) -> Self {
		match err {
			Error::Http { status, error, .. } => Self::RefreshRejected {
				status: Some(*status),
				message: error.as_ref().map(|e| e.message.clone()),
			},
			Error::Rejected { message, .. } =>
				Self::RefreshRejected { status: None, message: Some(message.clone()) },
			other => Self::RefreshUnavailable { message: other.to_string() },
		}
	}
}
impl Display for ExpiryCause {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::MissingRefreshToken => f.write_str("no refresh token is stored"),
			Self::RefreshRejected { status, message } => {
				f.write_str("token refresh was rejected")?;

				if let Some(status) = status {
					write!(f, " (HTTP {status})")?;
				}
				if let Some(message) = message {
					write!(f, ": {message}")?;
				}

				Ok(())
			},
			Self::RefreshUnavailable { message } => write!(f, "token refresh failed: {message}"),
		}
	}
}

/// Notification delivered when credentials were cleared after a failed refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionExpired {
	/// Why the session ended.
	pub cause: ExpiryCause,
	/// Route the UI should navigate to; `None` means the app handles a forced logout itself.
	pub redirect: Option<String>,
}
impl Display for SessionExpired {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.cause, f)
	}
}

/// Receives session-expiry notifications (navigate to login, reset app state).
pub trait SessionHook
where
	Self: Send + Sync,
{
	/// Called once per failed refresh, after local credentials were cleared.
	fn session_expired(&self, expired: &SessionExpired);
}

/// Email/password sign-in payload.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
	/// Sign-in email; surrounding whitespace is trimmed before sending.
	pub email: String,
	/// Password, sent verbatim.
	pub password: String,
}
impl LoginCredentials {
	/// Creates a sign-in payload.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into() }
	}

	fn to_body(&self) -> Value {
		serde_json::json!({ "email": self.email.trim(), "password": self.password })
	}
}
impl Debug for LoginCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginCredentials").field("email", &self.email).finish_non_exhaustive()
	}
}

/// Self-service registration payload (mobile profile).
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
	/// Sign-in email.
	pub email: String,
	/// Chosen password.
	pub password: String,
	/// Display name.
	pub full_name: Option<String>,
	/// Contact number.
	pub phone_number: Option<String>,
}
impl Registration {
	/// Creates a registration with the required fields.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into(), full_name: None, phone_number: None }
	}

	/// Sets the display name.
	pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
		self.full_name = Some(full_name.into());

		self
	}

	/// Sets the contact number.
	pub fn phone_number(mut self, phone_number: impl Into<String>) -> Self {
		self.phone_number = Some(phone_number.into());

		self
	}

	fn to_body(&self) -> Value {
		let mut body = serde_json::Map::new();

		body.insert("email".into(), self.email.trim().into());
		body.insert("password".into(), self.password.clone().into());

		for (key, value) in [("fullName", &self.full_name), ("phoneNumber", &self.phone_number)] {
			if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
				body.insert(key.into(), value.into());
			}
		}

		Value::Object(body)
	}
}
impl Debug for Registration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Registration")
			.field("email", &self.email)
			.field("full_name", &self.full_name)
			.finish_non_exhaustive()
	}
}

/// Editable profile fields (mobile profile); unset fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
	/// New display name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub full_name: Option<String>,
	/// New contact number.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub phone_number: Option<String>,
}
impl ProfileUpdate {
	/// Sets the display name.
	pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
		self.full_name = Some(full_name.into());

		self
	}

	/// Sets the contact number.
	pub fn phone_number(mut self, phone_number: impl Into<String>) -> Self {
		self.phone_number = Some(phone_number.into());

		self
	}
}

/// Payload returned by the email verification endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailVerified {
	/// Updated user, when the backend sends one; it replaces the cached user.
	#[serde(default)]
	pub user: Option<UserProfile>,
	/// Remaining payload fields.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, Value>,
}

/// Result of a successful login or registration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedIn {
	/// Signed-in user.
	pub user: UserProfile,
	/// Issued tokens, already persisted.
	#[serde(flatten)]
	pub credentials: CredentialPair,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshPayload {
	#[serde(default)]
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct ProfilePayload {
	user: UserProfile,
}

impl<T> ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Exchanges email/password for tokens and caches the user.
	pub async fn login(&self, credentials: &LoginCredentials) -> Result<SignedIn> {
		let request = ApiRequest::post(&self.config().endpoints.login)
			.body(credentials.to_body())
			.skip_auth()
			.timeout(self.config().sign_in_timeout);

		self.sign_in("login", request).await
	}

	/// Registers a new account and signs it in. Only offered by profiles with a register
	/// endpoint.
	pub async fn register(&self, registration: &Registration) -> Result<SignedIn> {
		let path = self.offered(&self.config().endpoints.register, "register")?;
		let request = ApiRequest::post(path)
			.body(registration.to_body())
			.skip_auth()
			.timeout(self.config().sign_in_timeout);

		self.sign_in("register", request).await
	}

	/// Signs out: notifies the backend on a best-effort basis, then always clears local state.
	pub async fn logout(&self) -> Result<()> {
		let span = CallSpan::new(CallKind::SignOut, "logout");

		obs::record_call_outcome(CallKind::SignOut, CallOutcome::Attempt);

		let result = span
			.instrument(async {
				self.notify_logout().await;
				self.store().clear_all().await.map_err(Error::from)
			})
			.await;

		obs::record_call_result(CallKind::SignOut, &result);

		result
	}

	/// Forces a refresh through the shared coordinator and returns the new access token.
	pub async fn refresh_session(&self) -> Result<TokenSecret> {
		let ticket = self.refresh_coordinator().ticket();

		self.refresh_coordinator()
			.refreshed_token(ticket, || self.refresh_access_token())
			.await
			.map_err(Error::SessionExpired)
	}

	/// Loads the current user from the backend and refreshes the cache.
	pub async fn fetch_profile(&self) -> Result<UserProfile> {
		let path = self.offered(&self.config().endpoints.profile, "fetch_profile")?;
		let ProfilePayload { user } = self.fetch_data(ApiRequest::get(path)).await?;

		self.store().set_user(&user).await?;

		Ok(user)
	}

	/// Updates the signed-in user's profile and replaces the cached user with the result.
	pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
		let path = self.offered(&self.config().endpoints.profile, "update_profile")?;
		let ProfilePayload { user } = self.fetch_data(ApiRequest::put(path).json(update)?).await?;

		self.store().set_user(&user).await?;

		Ok(user)
	}

	/// Changes the signed-in user's password.
	pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
		let path = self.offered(&self.config().endpoints.change_password, "change_password")?;
		let request = ApiRequest::put(path).body(serde_json::json!({
			"oldPassword": old_password,
			"newPassword": new_password,
		}));

		self.fetch_data::<Value>(request).await?;

		Ok(())
	}

	/// Confirms an email address with the emailed token; a returned user replaces the cache.
	pub async fn verify_email(&self, token: &str) -> Result<EmailVerified> {
		let path = self.offered(&self.config().endpoints.verify_email, "verify_email")?;
		let request =
			ApiRequest::post(path).body(serde_json::json!({ "token": token })).skip_auth();
		let verified = self.fetch_data::<Option<EmailVerified>>(request).await?.unwrap_or_default();

		if let Some(user) = &verified.user {
			self.store().set_user(user).await?;
		}

		Ok(verified)
	}

	/// Asks the backend to send the verification email to `email` again.
	pub async fn resend_verification(&self, email: &str) -> Result<Value> {
		let path =
			self.offered(&self.config().endpoints.resend_verification, "resend_verification")?;
		let request =
			ApiRequest::post(path).body(serde_json::json!({ "email": email.trim() })).skip_auth();

		self.fetch_data(request).await
	}

	/// Returns `true` when the cached user has a verified email.
	pub async fn is_email_verified(&self) -> bool {
		self.current_user().await.is_some_and(|user| user.is_email_verified())
	}

	/// Returns the cached user, if any.
	pub async fn current_user(&self) -> Option<UserProfile> {
		self.store().user().await
	}

	/// Returns `true` when the client holds a session.
	///
	/// The admin profile also requires a cached user; the mobile profile only needs a token.
	pub async fn is_authenticated(&self) -> bool {
		if !self.store().has_valid_token().await {
			return false;
		}

		match self.config().profile {
			ClientProfile::Admin => self.current_user().await.is_some(),
			ClientProfile::Mobile => true,
		}
	}

	/// Returns `true` when the cached user holds `permission`.
	pub async fn has_permission(&self, permission: &str) -> bool {
		self.current_user().await.is_some_and(|user| user.has_permission(permission))
	}

	/// Calls the refresh endpoint once and persists the result.
	///
	/// Every failure clears local credentials and notifies the session hook. Must only be
	/// invoked through the refresh coordinator.
	pub(crate) async fn refresh_access_token(&self) -> RefreshOutcome {
		let span = CallSpan::new(CallKind::Refresh, "refresh_access_token");

		obs::record_call_outcome(CallKind::Refresh, CallOutcome::Attempt);

		let result = span
			.instrument(async {
				let Some(refresh_token) = self.store().refresh_token().await else {
					return Err(self.expire_session(ExpiryCause::MissingRefreshToken).await);
				};
				self.refresh_coordinator().metrics().record_attempt();

				let payload = match self.call_refresh_endpoint(&refresh_token).await {
					Ok(payload) => payload,
					Err(e) => return Err(self.expire_session(ExpiryCause::from_refresh_error(&e)).await),
				};
				let Some(access_token) = TokenSecret::non_empty(payload.access_token) else {
					let cause = ExpiryCause::RefreshRejected {
						status: None,
						message: Some("response did not contain an access token".into()),
					};

					return Err(self.expire_session(cause).await);
				};
				let rotated = payload.refresh_token.and_then(TokenSecret::non_empty);
				let pair = CredentialPair {
					access_token: access_token.clone(),
					refresh_token: rotated.unwrap_or(refresh_token),
				};

				if let Err(e) = self.store().set_tokens(&pair).await {
					obs::log_store_failure("write_tokens", &e);
				}

				Ok(access_token)
			})
			.await;

		obs::record_call_result(CallKind::Refresh, &result);

		result
	}

	fn offered<'a>(&self, path: &'a Option<String>, operation: &'static str) -> Result<&'a str> {
		path.as_deref().ok_or_else(|| {
			ConfigError::UnsupportedOperation { profile: self.config().profile.as_str(), operation }
				.into()
		})
	}

	async fn call_refresh_endpoint(&self, refresh_token: &TokenSecret) -> Result<RefreshPayload> {
		let request = ApiRequest::post(&self.config().endpoints.refresh)
			.body(serde_json::json!({ "refreshToken": refresh_token.expose() }))
			.skip_auth();
		let response = self.exchange(&request, None, RequestContext::default()).await?;
		let body = envelope::decode_response(&request.path, response)?;

		envelope::unwrap_data(&request.path, body)
	}

	async fn expire_session(&self, cause: ExpiryCause) -> SessionExpired {
		if let Err(e) = self.store().clear_all().await {
			obs::log_store_failure("clear_session", &e);
		}

		let expired = SessionExpired { cause, redirect: self.config().login_route.clone() };

		obs::log_session_expired(&expired);

		if let Some(hook) = self.session_hook() {
			hook.session_expired(&expired);
		}

		expired
	}

	async fn sign_in(&self, stage: &'static str, request: ApiRequest) -> Result<SignedIn> {
		let span = CallSpan::new(CallKind::SignIn, stage);

		obs::record_call_outcome(CallKind::SignIn, CallOutcome::Attempt);

		let result = span
			.instrument(async {
				let signed_in: SignedIn = self.fetch_data(request).await?;

				self.store().set_tokens(&signed_in.credentials).await?;
				self.store().set_user(&signed_in.user).await?;

				Ok(signed_in)
			})
			.await;

		obs::record_call_result(CallKind::SignIn, &result);

		result
	}

	async fn notify_logout(&self) {
		let Some(refresh_token) = self.store().refresh_token().await else {
			return;
		};
		let mut request = ApiRequest::post(&self.config().endpoints.logout)
			.body(serde_json::json!({ "refreshToken": refresh_token.expose() }))
			.skip_auth();

		if let Some(access_token) = self.store().access_token().await {
			request = request.header("Authorization", access_token.bearer());
		}
		if let Err(e) = self.send(request).await {
			obs::log_remote_logout_failure(&e);
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::_preludet::*;

	fn signed_in_body() -> Value {
		json!({
			"success": true,
			"data": {
				"user": { "id": 1, "email": "driver@example.na", "fullName": "Road User" },
				"accessToken": "access-1",
				"refreshToken": "refresh-1",
			},
		})
	}

	#[test]
	fn registration_body_trims_and_omits_blank_fields() {
		let body = Registration::new("  new@example.na ", "s3cret")
			.full_name("  Road User ")
			.phone_number("   ")
			.to_body();

		assert_eq!(
			body,
			json!({ "email": "new@example.na", "password": "s3cret", "fullName": "Road User" })
		);
	}

	#[test]
	fn credentials_debug_hides_password() {
		let rendered = format!("{:?}", LoginCredentials::new("a@b.na", "hunter2"));

		assert!(!rendered.contains("hunter2"));
	}

	#[test]
	fn expiry_causes_render_context() {
		let cause = ExpiryCause::RefreshRejected {
			status: Some(401),
			message: Some("Refresh token revoked".into()),
		};

		assert_eq!(cause.to_string(), "token refresh was rejected (HTTP 401): Refresh token revoked");
		assert_eq!(ExpiryCause::MissingRefreshToken.to_string(), "no refresh token is stored");
	}

	#[tokio::test]
	async fn login_persists_tokens_and_user() {
		let (client, transport, _) =
			build_scripted_client(ClientProfile::Mobile, [Scripted::Respond(200, signed_in_body())]);
		let signed_in = client
			.login(&LoginCredentials::new(" driver@example.na ", "pw"))
			.await
			.expect("Login should succeed.");

		assert_eq!(signed_in.credentials, CredentialPair::new("access-1", "refresh-1"));
		assert_eq!(
			client.store().credentials().await,
			Some(CredentialPair::new("access-1", "refresh-1"))
		);
		assert_eq!(client.current_user().await.map(|u| u.email), Some("driver@example.na".into()));
		assert!(client.is_authenticated().await);

		let request = &transport.requests()[0];

		assert_eq!(request.url.path(), "/api/app-users/login");
		assert_eq!(request.header("authorization"), None);
		assert_eq!(request.json_body(), Some(json!({ "email": "driver@example.na", "password": "pw" })));
	}

	#[tokio::test]
	async fn admin_register_is_unsupported() {
		let (client, transport, _) = build_scripted_client(ClientProfile::Admin, []);
		let err = client
			.register(&Registration::new("a@b.na", "pw"))
			.await
			.expect_err("The admin profile has no register endpoint.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::UnsupportedOperation { operation: "register", .. })
		));
		assert_eq!(transport.calls(), 0);
	}

	#[tokio::test]
	async fn admin_account_operations_are_unsupported() {
		let (client, transport, _) = build_scripted_client(ClientProfile::Admin, []);
		let results = [
			("update_profile", client.update_profile(&ProfileUpdate::default()).await.map(drop)),
			("change_password", client.change_password("old", "new").await),
			("verify_email", client.verify_email("t-1").await.map(drop)),
			("resend_verification", client.resend_verification("a@b.na").await.map(drop)),
		];

		for (name, result) in results {
			assert!(matches!(
				result,
				Err(Error::Config(ConfigError::UnsupportedOperation { operation, .. }))
					if operation == name
			));
		}

		assert_eq!(transport.calls(), 0);
	}

	#[tokio::test]
	async fn verification_without_user_keeps_cache() {
		let (client, _, _) = build_scripted_client(
			ClientProfile::Mobile,
			[Scripted::Respond(200, json!({ "success": true, "message": "Email verified" }))],
		);

		client
			.store()
			.set_user(&UserProfile { email: "driver@example.na".into(), ..Default::default() })
			.await
			.expect("Seeding the user should succeed.");

		let verified = client.verify_email("t-1").await.expect("Verification should succeed.");

		assert_eq!(verified, EmailVerified::default());
		assert_eq!(client.current_user().await.map(|u| u.email), Some("driver@example.na".into()));
	}

	#[tokio::test]
	async fn admin_authentication_requires_cached_user() {
		let (client, _, _) = build_scripted_client(ClientProfile::Admin, []);

		client
			.store()
			.set_tokens(&CredentialPair::new("access-1", "refresh-1"))
			.await
			.expect("Seeding tokens should succeed.");

		assert!(!client.is_authenticated().await);

		client
			.store()
			.set_user(&UserProfile { role: Some("admin".into()), ..Default::default() })
			.await
			.expect("Seeding the user should succeed.");

		assert!(client.is_authenticated().await);
	}

	#[tokio::test]
	async fn logout_clears_local_state_even_when_backend_fails() {
		let (client, transport, backend) = build_scripted_client(
			ClientProfile::Admin,
			[Scripted::Respond(500, json!({ "success": false }))],
		);

		client
			.store()
			.set_tokens(&CredentialPair::new("access-1", "refresh-1"))
			.await
			.expect("Seeding tokens should succeed.");
		client.logout().await.expect("Logout should succeed locally.");

		let request = &transport.requests()[0];

		assert_eq!(request.header("authorization"), Some("Bearer access-1"));
		assert_eq!(request.json_body(), Some(json!({ "refreshToken": "refresh-1" })));
		assert!(backend.snapshot().is_empty());
	}

	#[tokio::test]
	async fn logout_without_refresh_token_skips_the_backend() {
		let (client, transport, _) = build_scripted_client(ClientProfile::Mobile, []);

		client.logout().await.expect("Logout should succeed locally.");

		assert_eq!(transport.calls(), 0);
	}
}
