//! Credential models: redacted token secrets, the access/refresh pair, and the cached user.

pub mod credentials;
pub mod secret;
pub mod user;

pub use credentials::*;
pub use secret::*;
pub use user::*;
