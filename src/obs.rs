//! Observability helpers for client flows.
//!
//! Every flow runs inside a `tracing` span named `afrinet_client.flow` carrying the `flow` and
//! `stage` fields. Enable the `metrics` feature to increment the `afrinet_client_flow_total`
//! counter for every attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Credential login.
	Login,
	/// Account registration.
	Register,
	/// Server-side logout plus local credential removal.
	Logout,
	/// Single-flight access-token refresh.
	Refresh,
	/// Session restoration from the credential store.
	Restore,
	/// Password reset link, code, and confirmation calls.
	PasswordReset,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Login => "login",
			FlowKind::Register => "register",
			FlowKind::Logout => "logout",
			FlowKind::Refresh => "refresh",
			FlowKind::Restore => "restore",
			FlowKind::PasswordReset => "password_reset",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a client flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a flow span, recording attempt and success/failure outcomes.
pub(crate) async fn observe<T, Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(e) => {
			record_flow_outcome(kind, FlowOutcome::Failure);
			::tracing::debug!(flow = kind.as_str(), stage, error = %e, "Flow failed.");
		},
	}

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn labels_are_stable() {
		assert_eq!(FlowKind::PasswordReset.to_string(), "password_reset");
		assert_eq!(FlowKind::Refresh.as_str(), "refresh");
		assert_eq!(FlowOutcome::Failure.to_string(), "failure");
	}

	#[tokio::test]
	async fn observe_passes_results_through() {
		let ok = observe(FlowKind::Login, "observe_ok", async { Ok(7) }).await;

		assert_eq!(ok.expect("Successful flow should pass its value through."), 7);

		let err = observe::<(), _>(FlowKind::Logout, "observe_err", async {
			Err(Error::invalid_input("nope"))
		})
		.await;

		assert!(matches!(err, Err(Error::InvalidInput { .. })));
	}
}
