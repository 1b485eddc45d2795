//! Authenticated request dispatch.
//!
//! [`ApiClient`] owns the transport, the token store, and the refresh coordinator shared by
//! all of its clones. Every call follows the same path: take a refresh ticket, attach the
//! stored bearer token, run the exchange under the profile's retry policy with a hard
//! timeout per attempt, and on a 401 obtain a fresh token from the coordinator and replay the
//! request exactly once.

pub mod envelope;
pub mod request;

pub use envelope::ApiEnvelope;
pub use request::*;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::ClientConfig,
	error::TransportError,
	http::{HttpTransport, TransportRequest, TransportResponse},
	obs::{self, CallKind, CallOutcome, CallSpan},
	refresh::RefreshCoordinator,
	session::SessionHook,
	store::{KeyValueStore, TokenStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

const UNAUTHORIZED: u16 = 401;

/// Bearer-token API client for one front-end profile.
///
/// Clones share the transport, the token store, and the refresh coordinator, so a burst of
/// 401s across clones still produces a single refresh call.
pub struct ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Transport used for every outbound request.
	pub transport: Arc<T>,
	config: Arc<ClientConfig>,
	store: TokenStore,
	refresh: Arc<RefreshCoordinator>,
	session_hook: Option<Arc<dyn SessionHook>>,
}
impl<T> ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client over the caller-provided transport and storage backend.
	pub fn with_transport(
		config: ClientConfig,
		backend: Arc<dyn KeyValueStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let store = TokenStore::new(backend, config.store_keys.clone());

		Self {
			transport: transport.into(),
			config: Arc::new(config),
			store,
			refresh: Default::default(),
			session_hook: None,
		}
	}

	/// Registers the hook notified when the session expires.
	pub fn with_session_hook(mut self, hook: Arc<dyn SessionHook>) -> Self {
		self.session_hook = Some(hook);

		self
	}

	/// Returns the client configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Returns the token store.
	pub fn store(&self) -> &TokenStore {
		&self.store
	}

	/// Returns the refresh coordinator shared by every clone.
	pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
		&self.refresh
	}

	pub(crate) fn session_hook(&self) -> Option<&dyn SessionHook> {
		self.session_hook.as_deref()
	}

	/// Sends `request` and returns the decoded JSON body (`null` for empty 2xx bodies).
	pub async fn send(&self, request: ApiRequest) -> Result<Value> {
		let span = CallSpan::new(CallKind::Request, "send");

		obs::record_call_outcome(CallKind::Request, CallOutcome::Attempt);

		let result = span.instrument(self.dispatch(&request)).await;

		obs::record_call_result(CallKind::Request, &result);

		result
	}

	/// Sends `request` and decodes the envelope's `data` member into `D`.
	///
	/// A 2xx envelope with `success: false` becomes [`Error::Rejected`].
	pub async fn fetch_data<D>(&self, request: ApiRequest) -> Result<D>
	where
		D: DeserializeOwned,
	{
		let path = request.path.clone();
		let body = self.send(request).await?;

		envelope::unwrap_data(&path, body)
	}

	/// Issues a `GET`.
	pub async fn get(&self, path: &str) -> Result<Value> {
		self.send(ApiRequest::get(path)).await
	}

	/// Issues a `POST` with a JSON body.
	pub async fn post<B>(&self, path: &str, body: &B) -> Result<Value>
	where
		B: ?Sized + Serialize,
	{
		self.send(ApiRequest::post(path).json(body)?).await
	}

	/// Issues a `PUT` with a JSON body.
	pub async fn put<B>(&self, path: &str, body: &B) -> Result<Value>
	where
		B: ?Sized + Serialize,
	{
		self.send(ApiRequest::put(path).json(body)?).await
	}

	/// Issues a `PATCH` with a JSON body.
	pub async fn patch<B>(&self, path: &str, body: &B) -> Result<Value>
	where
		B: ?Sized + Serialize,
	{
		self.send(ApiRequest::patch(path).json(body)?).await
	}

	/// Issues a `DELETE`.
	pub async fn delete(&self, path: &str) -> Result<Value> {
		self.send(ApiRequest::delete(path)).await
	}

	async fn dispatch(&self, request: &ApiRequest) -> Result<Value> {
		let ticket = self.refresh.ticket();
		let mut token =
			if request.skip_auth { None } else { self.store.access_token().await };
		let mut context = RequestContext::default();

		loop {
			let response = self.exchange(request, token.as_ref(), context).await?;

			if response.status == UNAUTHORIZED
				&& !request.skip_auth
				&& !context.replayed_after_refresh
			{
				let fresh = self
					.refresh
					.refreshed_token(ticket, || self.refresh_access_token())
					.await
					.map_err(Error::SessionExpired)?;

				token = Some(fresh);
				context = context.after_refresh();

				continue;
			}

			return envelope::decode_response(&request.path, response);
		}
	}

	/// Runs one exchange under the retry policy; never performs 401 recovery.
	pub(crate) async fn exchange(
		&self,
		request: &ApiRequest,
		token: Option<&TokenSecret>,
		context: RequestContext,
	) -> Result<TransportResponse> {
		let url = self.config.endpoint_url(&request.path)?;
		let transport_request = request.to_transport(url, token)?;
		let timeout = request.timeout.unwrap_or(self.config.timeout);

		self.config
			.retry
			.run(&request.path, context, |_| {
				self.attempt(&request.path, transport_request.clone(), timeout)
			})
			.await
	}

	async fn attempt(
		&self,
		path: &str,
		request: TransportRequest,
		timeout: Duration,
	) -> Result<TransportResponse> {
		match tokio::time::timeout(timeout, self.transport.execute(request)).await {
			Ok(Ok(response)) => Ok(response),
			Ok(Err(TransportError::Timeout)) | Err(_) =>
				Err(Error::Timeout { path: path.into(), timeout }),
			Ok(Err(source)) => Err(Error::Network { path: path.into(), source }),
		}
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a client backed by a default reqwest transport.
	pub fn new(config: ClientConfig, backend: Arc<dyn KeyValueStore>) -> Self {
		Self::with_transport(config, backend, ReqwestTransport::default())
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			config: self.config.clone(),
			store: self.store.clone(),
			refresh: self.refresh.clone(),
			session_hook: self.session_hook.clone(),
		}
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("profile", &self.config.profile)
			.field("base_url", &self.config.base_url.as_str())
			.field("refresh_phase", &self.refresh.phase())
			.field("session_hook_set", &self.session_hook.is_some())
			.finish()
	}
}
