// self
use crate::{_prelude::*, auth::UserId, obs::OpKind, store::StoreError};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span builder used by the broker and the sweeper.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"ssh_account_broker.op",
				op = kind.as_str(),
				stage,
				identity = tracing::field::Empty
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Attaches the requesting identity to the span.
	pub fn with_identity(self, identity: UserId) -> Self {
		#[cfg(feature = "tracing")]
		{
			self.span.record("identity", identity.get());
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = identity;
		}

		self
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
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

/// Logs a grant that failed upstream or in the store. Status codes and bodies go here, never
/// to the requester.
pub fn log_grant_failure(identity: UserId, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		match error {
			Error::Upstream(crate::error::UpstreamError::Rejected { status, body }) => {
				tracing::warn!(%identity, status, body = %body, "Upstream rejected credential request.")
			},
			other => tracing::warn!(
				%identity,
				kind = other.kind(),
				error = %other,
				"Credential request failed."
			),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (identity, error);
	}
}

/// Logs a command that could not be answered.
pub fn log_command_failure(identity: UserId, command: &'static str, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(%identity, command, kind = error.kind(), error = %error, "Command failed.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (identity, command, error);
	}
}

/// Logs a notification that could not be delivered.
pub fn log_notify_failure(identity: UserId, error: &(dyn StdError + Send + Sync)) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(%identity, error = %error, "Failed to notify user about cooldown expiry.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (identity, error);
	}
}

/// Logs a sweeper `clear` that failed after the identity was already drained.
pub fn log_clear_failure(identity: UserId, error: &StoreError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(%identity, error = %error, "Failed to clear expired cooldown entry.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (identity, error);
	}
}

/// Logs a sweeper tick that failed as a whole.
pub fn log_sweep_failure(error: &Error, backoff: Duration) {
	#[cfg(feature = "tracing")]
	{
		tracing::error!(error = %error, backoff = %backoff, "Cooldown sweep failed; backing off.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (error, backoff);
	}
}

/// Logs a sweeper lifecycle transition.
pub fn log_sweeper_state(message: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!("{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = message;
	}
}
