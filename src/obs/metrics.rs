// self
use crate::obs::{OpKind, OpOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"ssh_account_broker_op_total",
			"op" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a failed upstream call, labeled by failure kind.
pub fn record_upstream_failure(kind: &'static str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("ssh_account_broker_upstream_failures_total", "kind" => kind)
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = kind;
	}
}

/// Publishes the number of upstream calls currently holding a gateway slot.
pub fn record_in_flight(in_flight: usize) {
	#[cfg(feature = "metrics")]
	{
		metrics::gauge!("ssh_account_broker_upstream_in_flight").set(in_flight as f64);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = in_flight;
	}
}
