//! Bearer-token REST client for the Roads Authority backend: pluggable token stores,
//! single-flight access-token refresh, and retry with linear backoff, shared by the admin
//! dashboard and mobile app profiles.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod refresh;
pub mod retry;
pub mod session;
pub mod store;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for unit and integration tests.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// self
	use crate::{
		client::ApiClient,
		config::{ClientConfig, ClientProfile},
		error::TransportError,
		http::{HttpTransport, TransportFuture, TransportRequest, TransportResponse},
		session::{SessionExpired, SessionHook},
		store::{KeyValueStore, MemoryStore},
	};
	#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

	/// Client type alias used by reqwest-backed integration tests.
	#[cfg(feature = "reqwest")]
	pub type ReqwestTestClient = ApiClient<ReqwestTransport>;

	/// Builds a client for `profile` that talks to `base_url` through reqwest, backed by a fresh
	/// in-memory store.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_client(
		profile: ClientProfile,
		base_url: &str,
	) -> (ReqwestTestClient, Arc<MemoryStore>) {
		let config = ClientConfig::builder(
			profile,
			Url::parse(base_url).expect("Test base URL should parse successfully."),
		)
		.build()
		.expect("Test client configuration should be valid.");
		let backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn KeyValueStore> = backend.clone();
		let client = ApiClient::with_transport(config, store, ReqwestTransport::default());

		(client, backend)
	}

	/// One scripted outcome replayed by [`ScriptedTransport`].
	#[derive(Clone, Debug)]
	pub enum Scripted {
		/// Respond with the given status and JSON body.
		Respond(u16, serde_json::Value),
		/// Fail with a transport-level timeout.
		Timeout,
		/// Fail with a transport-level network error.
		Network,
		/// Never resolve, leaving the dispatcher's own timeout to fire.
		Hang,
	}

	/// Deterministic [`HttpTransport`] replaying scripted outcomes in order and recording every
	/// request it receives.
	#[derive(Debug, Default)]
	pub struct ScriptedTransport {
		script: Mutex<VecDeque<Scripted>>,
		requests: Mutex<Vec<TransportRequest>>,
	}
	impl ScriptedTransport {
		/// Creates a transport that replays `script` front to back.
		pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
			Self { script: Mutex::new(script.into_iter().collect()), requests: Default::default() }
		}

		/// Returns a snapshot of every request executed so far.
		pub fn requests(&self) -> Vec<TransportRequest> {
			self.requests.lock().clone()
		}

		/// Returns how many requests were executed.
		pub fn calls(&self) -> usize {
			self.requests.lock().len()
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
			self.requests.lock().push(request);

			let next = self.script.lock().pop_front();

			Box::pin(async move {
				match next {
					Some(Scripted::Respond(status, body)) => Ok(TransportResponse {
						status,
						body: serde_json::to_vec(&body)
							.expect("Scripted JSON body should serialize."),
					}),
					Some(Scripted::Timeout) => Err(TransportError::Timeout),
					Some(Scripted::Network) =>
						Err(TransportError::network(std::io::Error::new(
							std::io::ErrorKind::ConnectionReset,
							"scripted connection reset",
						))),
					Some(Scripted::Hang) => std::future::pending().await,
					None => panic!("ScriptedTransport ran out of scripted responses."),
				}
			})
		}
	}

	/// Builds a client over a [`ScriptedTransport`], returning the transport handle for call
	/// assertions.
	pub fn build_scripted_client(
		profile: ClientProfile,
		script: impl IntoIterator<Item = Scripted>,
	) -> (ApiClient<ScriptedTransport>, Arc<ScriptedTransport>, Arc<MemoryStore>) {
		let config = ClientConfig::builder(
			profile,
			Url::parse("http://backend.test").expect("Scripted base URL should parse."),
		)
		.build()
		.expect("Scripted client configuration should be valid.");
		let transport = Arc::new(ScriptedTransport::new(script));
		let backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn KeyValueStore> = backend.clone();
		let client = ApiClient::with_transport(config, store, transport.clone());

		(client, transport, backend)
	}

	/// [`SessionHook`] that counts expirations and keeps the last notification.
	#[derive(Debug, Default)]
	pub struct RecordingSessionHook {
		count: AtomicUsize,
		last: Mutex<Option<SessionExpired>>,
	}
	impl RecordingSessionHook {
		/// Returns how many times the hook fired.
		pub fn count(&self) -> usize {
			self.count.load(Ordering::SeqCst)
		}

		/// Returns the most recent notification, if any.
		pub fn last(&self) -> Option<SessionExpired> {
			self.last.lock().clone()
		}
	}
	impl SessionHook for RecordingSessionHook {
		fn session_expired(&self, expired: &SessionExpired) {
			self.count.fetch_add(1, Ordering::SeqCst);
			*self.last.lock() = Some(expired.clone());
		}
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
