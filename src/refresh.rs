//! Single-flight access-token refresh.
//!
//! [`RefreshCoordinator`] is the explicit owner of the "refresh in progress" state shared by
//! every clone of a client. Requests take a [`RefreshTicket`] before they are dispatched; when
//! one of them receives a 401 it asks the coordinator for a fresh token. The first caller runs
//! the refresh while holding an async mutex, everyone who arrives while it is running is
//! parked on that mutex, and once the refresh settles each parked caller adopts its outcome
//! instead of starting another one. A request whose ticket predates a settled refresh also
//! adopts that outcome, so a burst of concurrent 401s produces exactly one backend call.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{_prelude::*, auth::TokenSecret, obs, session::SessionExpired};

/// Outcome shared with every caller waiting on the same refresh.
pub type RefreshOutcome = Result<TokenSecret, SessionExpired>;

/// Phase of the coordinator's two-state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshPhase {
	/// No refresh call is in flight.
	Idle,
	/// A refresh call is in flight; new 401s queue behind it.
	Refreshing,
}

/// Refresh epoch observed before a request was dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefreshTicket(u64);
impl RefreshTicket {
	/// Returns the observed epoch.
	pub fn epoch(self) -> u64 {
		self.0
	}
}

#[derive(Debug)]
struct RefreshState {
	phase: RefreshPhase,
	epoch: u64,
	pending: usize,
	last: Option<RefreshOutcome>,
}
impl RefreshState {
	fn settled_since(&self, ticket: RefreshTicket) -> Option<RefreshOutcome> {
		if self.epoch > ticket.0 { self.last.clone() } else { None }
	}
}

/// Owner of the refresh-in-progress flag, the waiter count, and the last settled outcome.
#[derive(Debug)]
pub struct RefreshCoordinator {
	guard: AsyncMutex<()>,
	state: Mutex<RefreshState>,
	metrics: RefreshMetrics,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator.
	pub fn new() -> Self {
		Self {
			guard: AsyncMutex::new(()),
			state: Mutex::new(RefreshState {
				phase: RefreshPhase::Idle,
				epoch: 0,
				pending: 0,
				last: None,
			}),
			metrics: RefreshMetrics::default(),
		}
	}

	/// Captures the current epoch; take one before reading the access token for a request.
	pub fn ticket(&self) -> RefreshTicket {
		RefreshTicket(self.state.lock().epoch)
	}

	/// Returns the current phase.
	pub fn phase(&self) -> RefreshPhase {
		self.state.lock().phase
	}

	/// Returns how many callers are parked behind an in-flight refresh.
	pub fn pending(&self) -> usize {
		self.state.lock().pending
	}

	/// Returns the refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Resolves a fresh access token for a request that was rejected with 401.
	///
	/// `refresh` runs at most once per settled epoch across all callers. When a refresh has
	/// already settled after `ticket` was taken, its outcome is returned without calling
	/// `refresh` at all.
	pub async fn refreshed_token<F, Fut>(&self, ticket: RefreshTicket, refresh: F) -> RefreshOutcome
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = RefreshOutcome>,
	{
		let queued = {
			let mut state = self.state.lock();

			if let Some(outcome) = state.settled_since(ticket) {
				self.metrics.record_coalesced();
				obs::log_refresh_coalesced(state.epoch);

				return outcome;
			}
			if state.phase == RefreshPhase::Refreshing {
				state.pending += 1;

				Some(PendingSlot(&self.state))
			} else {
				None
			}
		};
		let _singleflight = self.guard.lock().await;

		drop(queued);

		let phase = {
			let mut state = self.state.lock();

			if let Some(outcome) = state.settled_since(ticket) {
				self.metrics.record_coalesced();
				obs::log_refresh_coalesced(state.epoch);

				return outcome;
			}

			state.phase = RefreshPhase::Refreshing;

			PhaseReset(&self.state)
		};

		let outcome = refresh().await;

		match &outcome {
			Ok(_) => self.metrics.record_success(),
			Err(_) => self.metrics.record_failure(),
		}

		{
			let mut state = self.state.lock();

			state.epoch += 1;
			state.last = Some(outcome.clone());
		}

		drop(phase);

		outcome
	}
}
impl Default for RefreshCoordinator {
	fn default() -> Self {
		Self::new()
	}
}

/// Releases a parked caller's waiter slot, including when its future is dropped while parked.
struct PendingSlot<'a>(&'a Mutex<RefreshState>);
impl Drop for PendingSlot<'_> {
	fn drop(&mut self) {
		let mut state = self.0.lock();

		state.pending = state.pending.saturating_sub(1);
	}
}

/// Returns the coordinator to [`RefreshPhase::Idle`] even if the refreshing future is dropped.
struct PhaseReset<'a>(&'a Mutex<RefreshState>);
impl Drop for PhaseReset<'_> {
	fn drop(&mut self) {
		self.0.lock().phase = RefreshPhase::Idle;
	}
}
