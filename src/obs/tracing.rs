// self
use crate::{_prelude::*, error::FailureKind, obs::CallKind, store::StoreError};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// A span builder used by client calls.
#[derive(Clone, Debug)]
pub struct CallSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Creates a new span tagged with the provided call kind + stage.
	pub fn new(kind: CallKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("ra_client.call", call = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a storage failure that was swallowed so reads could report "absent".
pub fn log_store_failure(op: &'static str, error: &StoreError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(op, %error, "token store operation failed");
	#[cfg(not(feature = "tracing"))]
	let _ = (op, error);
}

/// Logs a scheduled retry.
pub fn log_retry(path: &str, retry: u32, delay: Duration, kind: FailureKind) {
	#[cfg(feature = "tracing")]
	tracing::debug!(
		path,
		retry,
		delay_ms = delay.as_millis() as u64,
		kind = kind.as_str(),
		"retrying request"
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (path, retry, delay, kind);
}

/// Logs a 401 that was satisfied by a refresh another caller already performed.
pub fn log_refresh_coalesced(epoch: u64) {
	#[cfg(feature = "tracing")]
	tracing::debug!(epoch, "reusing settled token refresh");
	#[cfg(not(feature = "tracing"))]
	let _ = epoch;
}

/// Logs the end of a session.
pub fn log_session_expired(cause: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::info!(%cause, "session expired; local credentials cleared");
	#[cfg(not(feature = "tracing"))]
	let _ = cause;
}

/// Logs a best-effort remote sign-out that failed; local state is cleared regardless.
pub fn log_remote_logout_failure(error: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::debug!(%error, "remote logout failed");
	#[cfg(not(feature = "tracing"))]
	let _ = error;
}
