//! Response classification and the backend's `{ success, data, error }` envelope.

// self
use crate::{_prelude::*, error::ApiErrorBody, http::TransportResponse};

/// Standard response envelope returned by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
	/// Whether the backend accepted the request; absent means accepted.
	#[serde(default = "accepted")]
	pub success: bool,
	/// Payload on success.
	#[serde(default)]
	pub data: Option<T>,
	/// Structured error on rejection.
	#[serde(default)]
	pub error: Option<ApiErrorBody>,
	/// Free-form message some endpoints send beside `data`.
	#[serde(default)]
	pub message: Option<String>,
}
impl<T> ApiEnvelope<T> {
	/// Returns the payload, or [`Error::Rejected`] when `success` is false.
	pub fn into_data(self) -> Result<Option<T>> {
		if self.success {
			return Ok(self.data);
		}

		let (code, message) = match self.error {
			Some(ApiErrorBody { code, message }) => (code, message),
			None => (None, self.message.unwrap_or_else(|| "Request was rejected.".into())),
		};

		Err(Error::Rejected { code, message })
	}
}

fn accepted() -> bool {
	true
}

/// Classifies a raw response: 2xx bodies decode to JSON (empty means `null`), anything else
/// becomes [`Error::Http`] carrying whatever error payload the backend sent.
pub(crate) fn decode_response(path: &str, response: TransportResponse) -> Result<Value> {
	if response.is_success() {
		if response.body.iter().all(u8::is_ascii_whitespace) {
			return Ok(Value::Null);
		}

		let de = &mut serde_json::Deserializer::from_slice(&response.body);

		return serde_path_to_error::deserialize(de)
			.map_err(|source| Error::Decode { path: path.into(), source });
	}

	let details = serde_json::from_slice::<Value>(&response.body).ok();
	let error = details.as_ref().and_then(error_body);

	Err(Error::Http { status: response.status, error, details })
}

/// Unwraps an envelope and decodes its `data` member into `T`.
pub(crate) fn unwrap_data<T>(path: &str, body: Value) -> Result<T>
where
	T: DeserializeOwned,
{
	let envelope = serde_path_to_error::deserialize::<_, ApiEnvelope<Value>>(body)
		.map_err(|source| Error::Decode { path: path.into(), source })?;
	let data = envelope.into_data()?.unwrap_or(Value::Null);

	serde_path_to_error::deserialize(data).map_err(|source| Error::Decode { path: path.into(), source })
}

fn error_body(details: &Value) -> Option<ApiErrorBody> {
	match details.get("error") {
		Some(Value::String(message)) => Some(ApiErrorBody { code: None, message: message.clone() }),
		Some(error) => serde_json::from_value(error.clone()).ok(),
		None => details
			.get("message")
			.and_then(Value::as_str)
			.map(|message| ApiErrorBody { code: None, message: message.into() }),
	}
}
