//! Client-level error types shared by the dispatcher, refresh coordinator, and stores.

// self
use crate::{_prelude::*, session::SessionExpired};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The request exceeded its timeout budget and was cancelled.
	#[error("Request to {path} timed out after {}ms.", .timeout.as_millis())]
	Timeout {
		/// Endpoint path relative to the API prefix.
		path: String,
		/// Budget that elapsed.
		timeout: Duration,
	},
	/// The transport could not complete the exchange (connectivity loss, DNS, TLS, I/O).
	#[error("Network failure while calling {path}.")]
	Network {
		/// Endpoint path relative to the API prefix.
		path: String,
		/// Transport-level failure.
		#[source]
		source: TransportError,
	},
	/// Refresh was impossible or failed; local credentials were cleared.
	#[error("Session expired: {0}.")]
	SessionExpired(SessionExpired),
	/// Backend answered with a non-2xx status.
	#[error("Request failed with HTTP {status}{}.", .error.as_ref().map(|e| format!(": {}", e.message)).unwrap_or_default())]
	Http {
		/// HTTP status code.
		status: u16,
		/// Structured `{ code, message }` error object, when the backend supplied one.
		error: Option<ApiErrorBody>,
		/// Full JSON payload returned with the failure, when it parsed.
		details: Option<Value>,
	},
	/// Backend answered 2xx but flagged the envelope as unsuccessful.
	#[error("Backend rejected the request: {message}.")]
	Rejected {
		/// Backend error code, when supplied.
		code: Option<String>,
		/// Backend- or client-supplied message.
		message: String,
	},
	/// Timeout or network failures persisted through every retry.
	#[error("Gave up after {retries} retries ({kind}).")]
	RetriesExhausted {
		/// Number of retries performed after the original attempt.
		retries: u32,
		/// Classification shared by the failed attempts.
		kind: FailureKind,
		/// Error observed on the final attempt.
		#[source]
		source: Box<Error>,
	},
	/// Request body could not be serialized.
	#[error("Request body for {path} could not be encoded.")]
	Encode {
		/// Endpoint path relative to the API prefix.
		path: String,
		/// Serialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// Response body could not be decoded into the expected shape.
	#[error("Response from {path} could not be decoded.")]
	Decode {
		/// Endpoint path relative to the API prefix.
		path: String,
		/// Structured decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Returns the retryable classification of this error, if any.
	///
	/// Only timeouts and network failures are retryable; HTTP and envelope failures never are.
	pub fn failure_kind(&self) -> Option<FailureKind> {
		match self {
			Self::Timeout { .. } => Some(FailureKind::Timeout),
			Self::Network { .. } => Some(FailureKind::Network),
			_ => None,
		}
	}

	/// Returns the HTTP status attached to this error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Http { status, .. } => Some(*status),
			Self::RetriesExhausted { source, .. } => source.status(),
			_ => None,
		}
	}

	/// Returns `true` when the caller must sign in again.
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::SessionExpired(_))
	}
}

/// Classification of transient failures handled by the retry controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
	/// The request was aborted after exceeding its timeout.
	Timeout,
	/// The transport failed before a response arrived.
	Network,
}
impl FailureKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Timeout => "timeout",
			Self::Network => "network",
		}
	}
}
impl Display for FailureKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Error object embedded in backend envelopes (`{ "error": { "code", "message" } }`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
	/// Backend error code such as `AUTH_001`.
	#[serde(default)]
	pub code: Option<String>,
	/// Human-readable message.
	#[serde(default)]
	pub message: String,
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL must be an absolute `http` or `https` URL.
	#[error("Base URL must use http or https: {url}.")]
	InvalidBaseUrl {
		/// Rejected URL.
		url: String,
	},
	/// API prefix must be empty or start with `/`.
	#[error("API prefix must be empty or start with '/': {prefix}.")]
	InvalidApiPrefix {
		/// Rejected prefix.
		prefix: String,
	},
	/// Timeouts must be non-zero.
	#[error("Request timeout must be greater than zero.")]
	ZeroTimeout,
	/// Endpoint path could not be joined onto the base URL.
	#[error("Endpoint `{path}` does not form a valid URL.")]
	InvalidEndpoint {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The configured profile does not expose the requested operation.
	#[error("The {profile} profile does not support {operation}.")]
	UnsupportedOperation {
		/// Profile label.
		profile: &'static str,
		/// Operation label.
		operation: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, transport-enforced timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Transport aborted the exchange because its own deadline elapsed.
	#[error("Transport deadline elapsed.")]
	Timeout,
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the backend.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}
