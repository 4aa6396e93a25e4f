//! Single-flight refresh state machine shared by every request of one client.
//!
//! The coordinator is either `Idle` or `Refreshing` with a FIFO queue of waiting requests.
//! [`RefreshCoordinator::admit`] performs the check-and-set in one critical section: the first
//! request to observe `Idle` receives a [`RefreshEpisode`] and performs the refresh call, every
//! later arrival receives a [`PendingRequest`] that resolves when the episode finishes. The lock
//! is never held across an `.await`.
//!
//! A credential generation counter advances whenever an episode finishes and whenever the
//! credentials are replaced by a login or logout. A 401 for a request sent under an older
//! generation is answered with [`Admission::Replay`] instead of a new episode, so a late 401
//! from an already-repaired episode never causes a second refresh call.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use tokio::sync::oneshot;
// self
use crate::{_prelude::*, auth::TokenSecret, error::RefreshError};

/// Result delivered to every request waiting on an episode.
pub type RefreshOutcome = Result<TokenSecret, RefreshError>;

/// Decision returned by [`RefreshCoordinator::admit`] for a request that received a 401.
#[derive(Debug)]
pub enum Admission<'a> {
	/// The caller owns the new episode and must call the refresh endpoint.
	Refresh(RefreshEpisode<'a>),
	/// A refresh is already in flight; wait for its outcome.
	Wait(PendingRequest),
	/// The credentials changed after the request was sent; replay it with the stored token.
	Replay,
}

/// Owner handle for an in-flight refresh episode.
///
/// [`RefreshEpisode::finish`] resolves the queue and returns the coordinator to `Idle`. Dropping
/// the handle without finishing resolves waiters with [`RefreshError::Abandoned`].
#[derive(Debug)]
pub struct RefreshEpisode<'a> {
	coordinator: &'a RefreshCoordinator,
	finished: bool,
}
impl RefreshEpisode<'_> {
	/// Publishes `outcome` to every queued request in enqueue order and returns the coordinator
	/// to `Idle`. Returns the labels of the released requests, in release order.
	pub fn finish(mut self, outcome: RefreshOutcome) -> Vec<String> {
		self.finished = true;

		self.coordinator.complete(outcome)
	}
}
impl Drop for RefreshEpisode<'_> {
	fn drop(&mut self) {
		if !self.finished {
			self.coordinator.complete(Err(RefreshError::Abandoned));
		}
	}
}

/// Completion handle of a request queued behind an in-flight refresh.
#[derive(Debug)]
pub struct PendingRequest {
	receiver: oneshot::Receiver<RefreshOutcome>,
}
impl PendingRequest {
	/// Waits for the episode outcome.
	pub async fn wait(self) -> RefreshOutcome {
		self.receiver.await.unwrap_or(Err(RefreshError::Abandoned))
	}
}

#[derive(Debug)]
struct Waiter {
	label: String,
	sender: oneshot::Sender<RefreshOutcome>,
}

#[derive(Debug, Default)]
enum Phase {
	#[default]
	Idle,
	Refreshing {
		queue: VecDeque<Waiter>,
	},
}

#[derive(Debug, Default)]
struct RefreshState {
	phase: Phase,
	generation: u64,
}

/// Refresh state owned by one client instance.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
	state: Mutex<RefreshState>,
}
impl RefreshCoordinator {
	/// Current credential generation; record it before sending a request.
	pub fn generation(&self) -> u64 {
		self.state.lock().generation
	}

	/// Returns `true` while an episode is in flight.
	pub fn is_refreshing(&self) -> bool {
		matches!(self.state.lock().phase, Phase::Refreshing { .. })
	}

	/// Number of requests waiting on the in-flight episode.
	pub fn pending_requests(&self) -> usize {
		match &self.state.lock().phase {
			Phase::Idle => 0,
			Phase::Refreshing { queue } => queue.len(),
		}
	}

	/// Marks the stored credentials as replaced outside of a refresh (login, logout).
	pub fn advance(&self) {
		self.state.lock().generation += 1;
	}

	/// Admits a request that received a 401 after being sent under `sent_generation`.
	///
	/// `label` identifies the request in logs and in [`RefreshEpisode::finish`]'s return value.
	pub fn admit(&self, sent_generation: u64, label: impl Into<String>) -> Admission<'_> {
		let mut guard = self.state.lock();
		let state = &mut *guard;

		if let Phase::Refreshing { queue } = &mut state.phase {
			let (sender, receiver) = oneshot::channel();

			queue.push_back(Waiter { label: label.into(), sender });

			return Admission::Wait(PendingRequest { receiver });
		}
		if state.generation != sent_generation {
			return Admission::Replay;
		}

		state.phase = Phase::Refreshing { queue: VecDeque::new() };

		Admission::Refresh(RefreshEpisode { coordinator: self, finished: false })
	}

	fn complete(&self, outcome: RefreshOutcome) -> Vec<String> {
		let queue = {
			let mut state = self.state.lock();

			state.generation += 1;

			match std::mem::take(&mut state.phase) {
				Phase::Refreshing { queue } => queue,
				Phase::Idle => VecDeque::new(),
			}
		};

		queue
			.into_iter()
			.map(|waiter| {
				// A receiver that gave up is not an error for the episode.
				let _ = waiter.sender.send(outcome.clone());

				waiter.label
			})
			.collect()
	}
}
