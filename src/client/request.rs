//! Request descriptions and the per-call retry context.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	http::{Method, TransportRequest},
};

/// One logical API call: method, path, optional JSON body, and per-call overrides.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the API prefix, optionally with a query string.
	pub path: String,
	/// JSON body.
	pub body: Option<Value>,
	/// Header overrides; replace defaults with the same name.
	pub headers: Vec<(String, String)>,
	/// Skips bearer authentication and 401 recovery.
	pub skip_auth: bool,
	/// Overrides the configured timeout.
	pub timeout: Option<Duration>,
}
impl ApiRequest {
	/// Creates a request with no body and default options.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			body: None,
			headers: Vec::new(),
			skip_auth: false,
			timeout: None,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::Put, path)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::Patch, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Attaches a JSON body that is already a [`Value`].
	pub fn body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Serializes `body` as the JSON request body.
	pub fn json<B>(self, body: &B) -> Result<Self>
	where
		B: ?Sized + Serialize,
	{
		let value = serde_json::to_value(body)
			.map_err(|source| Error::Encode { path: self.path.clone(), source })?;

		Ok(self.body(value))
	}

	/// Adds or replaces a header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		let name = name.into();

		self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(&name));
		self.headers.push((name, value.into()));

		self
	}

	/// Sends the request without a bearer token and without 401 recovery.
	pub fn skip_auth(mut self) -> Self {
		self.skip_auth = true;

		self
	}

	/// Overrides the configured timeout for this request.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Resolves the transport-level request, merging default headers with overrides.
	pub(crate) fn to_transport(&self, url: Url, token: Option<&TokenSecret>) -> Result<TransportRequest> {
		let mut headers = vec![("Accept".to_owned(), "application/json".to_owned())];
		let body = match &self.body {
			Some(value) => {
				headers.push(("Content-Type".into(), "application/json".into()));

				Some(
					serde_json::to_vec(value)
						.map_err(|source| Error::Encode { path: self.path.clone(), source })?,
				)
			},
			None => None,
		};

		if let Some(token) = token.filter(|_| !self.skip_auth) {
			headers.push(("Authorization".into(), token.bearer()));
		}
		for (name, value) in &self.headers {
			headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
			headers.push((name.clone(), value.clone()));
		}

		Ok(TransportRequest { method: self.method, url, headers, body })
	}
}

/// Immutable per-call context threaded through every attempt of one logical request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RequestContext {
	/// Timeout/network retries performed so far.
	pub retries: u32,
	/// Whether the request was already replayed with a refreshed token.
	pub replayed_after_refresh: bool,
}
impl RequestContext {
	/// Context for the next retry of the same exchange.
	pub fn next_retry(self) -> Self {
		Self { retries: self.retries + 1, ..self }
	}

	/// Context for the single replay after a successful refresh; retries start over.
	pub fn after_refresh(self) -> Self {
		Self { retries: 0, replayed_after_refresh: true }
	}
}
