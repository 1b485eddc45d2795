//! Access/refresh token pair issued by login and refresh calls.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Access and refresh tokens that are only meaningful together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
	/// Short-lived credential attached to each authenticated request.
	pub access_token: TokenSecret,
	/// Longer-lived credential exchanged for a new access token.
	pub refresh_token: TokenSecret,
}
impl CredentialPair {
	/// Pairs the provided tokens.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
		}
	}
}
