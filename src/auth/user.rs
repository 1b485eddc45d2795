//! Signed-in user profile cached next to the credential pair.

// self
use crate::_prelude::*;

/// Role name granted every permission.
pub const SUPER_ADMIN_ROLE: &str = "super-admin";

/// User profile returned by login and profile endpoints.
///
/// Unknown backend fields are preserved in [`UserProfile::extra`] so the cache round-trips
/// whatever the backend sends.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
	/// Backend identifier.
	#[serde(default)]
	pub id: Option<Value>,
	/// Sign-in email address.
	#[serde(default)]
	pub email: String,
	/// Display name.
	#[serde(default)]
	pub full_name: Option<String>,
	/// Role label (admin users only).
	#[serde(default)]
	pub role: Option<String>,
	/// Granted permission identifiers (admin users only).
	#[serde(default)]
	pub permissions: Vec<String>,
	/// Remaining backend fields.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, Value>,
}
impl UserProfile {
	/// Returns `true` for the super-admin role.
	pub fn is_super_admin(&self) -> bool {
		self.role.as_deref() == Some(SUPER_ADMIN_ROLE)
	}

	/// Returns `true` when the user holds `permission`; super-admins hold every permission.
	pub fn has_permission(&self, permission: &str) -> bool {
		self.is_super_admin() || self.permissions.iter().any(|granted| granted == permission)
	}

	/// Returns `true` only when the backend reported `isEmailVerified: true`.
	pub fn is_email_verified(&self) -> bool {
		self.extra.get("isEmailVerified").and_then(Value::as_bool).unwrap_or(false)
	}
}
