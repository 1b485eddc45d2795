//! Retry controller for transient timeout and network failures.
//!
//! Only [`Error::Timeout`] and [`Error::Network`] are retried. HTTP failures, envelope
//! rejections, and session expiry pass through on the first attempt. The delay before retry
//! `n` is `base_delay * n`, so the mobile preset waits 1 s and then 2 s.

// self
use crate::{_prelude::*, client::RequestContext, obs};

/// Bounded linear-backoff retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
	/// Retries allowed after the original attempt.
	pub max_retries: u32,
	/// Delay unit multiplied by the retry number.
	pub base_delay: Duration,
}
impl RetryPolicy {
	/// Policy used by the mobile profile: two retries, 1 s then 2 s.
	pub const MOBILE: Self = Self { max_retries: 2, base_delay: Duration::from_millis(1_000) };

	/// Creates a policy with the provided bound and delay unit.
	pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
		Self { max_retries, base_delay }
	}

	/// Policy that surfaces every failure immediately.
	pub const fn none() -> Self {
		Self { max_retries: 0, base_delay: Duration::ZERO }
	}

	/// Returns `true` when the policy never retries.
	pub const fn is_disabled(&self) -> bool {
		self.max_retries == 0
	}

	/// Delay inserted before retry number `retry` (1-based).
	pub fn delay_before(&self, retry: u32) -> Duration {
		self.base_delay.saturating_mul(retry)
	}

	/// Runs `op` until it succeeds, fails with a non-retryable error, or the bound is reached.
	///
	/// `op` receives the [`RequestContext`] for each attempt; the retry counter is advanced on
	/// a copy, never mutated in place. When at least one retry happened and the last attempt
	/// still failed transiently, the failure is wrapped in [`Error::RetriesExhausted`].
	pub async fn run<T, F, Fut>(&self, path: &str, context: RequestContext, mut op: F) -> Result<T>
	where
		F: FnMut(RequestContext) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut context = context;

		loop {
			let err = match op(context).await {
				Ok(value) => return Ok(value),
				Err(err) => err,
			};
			let Some(kind) = err.failure_kind() else {
				return Err(err);
			};

			if context.retries >= self.max_retries {
				if context.retries == 0 {
					return Err(err);
				}

				return Err(Error::RetriesExhausted {
					retries: context.retries,
					kind,
					source: Box::new(err),
				});
			}

			context = context.next_retry();

			let delay = self.delay_before(context.retries);

			obs::log_retry(path, context.retries, delay, kind);
			tokio::time::sleep(delay).await;
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::none()
	}
}
