//! Transport primitives for backend exchanges.
//!
//! [`HttpTransport`] is the client's only dependency on an HTTP stack. The dispatcher hands it
//! fully-resolved [`TransportRequest`] values and owns everything else: bearer headers, the
//! timeout budget, status classification, and JSON decoding. Implementations only move bytes
//! and report whether the exchange completed, so alternative stacks (or scripted fakes in
//! tests) can be swapped in without touching refresh or retry behavior.

// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing one request.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by
/// every clone of a client, and the returned future must be `Send` so callers can hop
/// executors. Dropping the future must abandon the exchange; the dispatcher relies on this to
/// enforce timeouts.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request`, resolving once the full response body is available.
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_>;
}

/// HTTP methods used by the backend API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the canonical method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Patch => "PATCH",
			Self::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fully-resolved request handed to a transport.
#[derive(Clone, Debug)]
pub struct TransportRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL.
	pub url: Url,
	/// Header name/value pairs, already merged and de-duplicated.
	pub headers: Vec<(String, String)>,
	/// Serialized request body.
	pub body: Option<Vec<u8>>,
}
impl TransportRequest {
	/// Returns the first header value matching `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	/// Parses the body as JSON, if present.
	pub fn json_body(&self) -> Option<Value> {
		self.body.as_deref().and_then(|bytes| serde_json::from_slice(bytes).ok())
	}
}

/// Raw response returned by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl TransportResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Reqwest-backed [`HttpTransport`] used by default.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let method = match request.method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
				Method::Put => reqwest::Method::PUT,
				Method::Patch => reqwest::Method::PATCH,
				Method::Delete => reqwest::Method::DELETE,
			};
			let mut builder = client.request(method, request.url);

			for (name, value) in request.headers {
				builder = builder.header(name, value);
			}
			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let body = response.bytes().await?.to_vec();

			Ok(TransportResponse { status, body })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn header_lookup_ignores_case() {
		let request = TransportRequest {
			method: Method::Get,
			url: Url::parse("http://backend.test/api/news").expect("Fixture URL should parse."),
			headers: vec![("Authorization".into(), "Bearer abc".into())],
			body: None,
		};

		assert_eq!(request.header("authorization"), Some("Bearer abc"));
		assert_eq!(request.header("content-type"), None);
		assert_eq!(request.json_body(), None);
	}

	#[test]
	fn success_covers_every_2xx_status() {
		assert!(TransportResponse { status: 204, body: Vec::new() }.is_success());
		assert!(!TransportResponse { status: 401, body: Vec::new() }.is_success());
	}
}
