//! Optional observability helpers for the broker and the sweeper.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `ssh_account_broker.op` with the `op` and `stage`
//!   fields, plus warn/error events for failed grants, failed notifications, and failed sweeps.
//! - Enable `metrics` to increment the `ssh_account_broker_op_total` counter for every
//!   attempt/success/denial/failure, labeled by `op` + `outcome`, and the
//!   `ssh_account_broker_upstream_failures_total` counter labeled by failure `kind`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// A credential request passing through the broker.
	Grant,
	/// One sweeper tick.
	Sweep,
	/// One "you may request again" notification.
	Notify,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Grant => "grant",
			OpKind::Sweep => "sweep",
			OpKind::Notify => "notify",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Request turned away by an active cooldown.
	Denied,
	/// Failure reported back to the caller or swallowed by the sweeper.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Denied => "denied",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
