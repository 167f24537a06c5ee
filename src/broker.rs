//! Grant broker: the cooldown state machine in front of the upstream gateway.
//!
//! [`Broker::grant`] checks the requester's cooldown, calls the gateway only when none is
//! active, and starts a new cooldown after a successful call. A per-identity singleflight
//! guard serializes concurrent grants for the same identity so the check and the cooldown
//! write cannot interleave; grants for different identities never wait on each other.

// self
use crate::{
	_prelude::*,
	auth::{Credential, DisplayName, UserId},
	gateway::Gateway,
	http::UpstreamTransport,
	obs::{self, OpKind, OpOutcome, OpSpan},
	stats::Stats,
	store::CooldownStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport.
pub type ReqwestBroker = Broker<ReqwestTransport>;

/// One credential request, built per command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantRequest {
	/// Stable identity the cooldown is keyed by.
	pub identity: UserId,
	/// Human-readable label forwarded to the upstream.
	pub display_name: DisplayName,
}
impl GrantRequest {
	/// Creates a request for `identity`.
	pub fn new(identity: UserId, display_name: DisplayName) -> Self {
		Self { identity, display_name }
	}
}

/// Result of [`Broker::grant`].
#[derive(Debug)]
pub enum GrantOutcome {
	/// A fresh credential; the identity's cooldown has been restarted.
	Granted(Credential),
	/// A cooldown is active; nothing was sent upstream.
	Denied {
		/// Time left before the identity may ask again.
		remaining: Duration,
	},
	/// The upstream or the store failed; the cooldown is unchanged.
	Failed(GrantFailure),
}
impl GrantOutcome {
	/// Returns the credential when the grant succeeded.
	pub fn credential(&self) -> Option<&Credential> {
		match self {
			Self::Granted(credential) => Some(credential),
			_ => None,
		}
	}

	/// Returns `true` for [`GrantOutcome::Granted`].
	pub fn is_granted(&self) -> bool {
		matches!(self, Self::Granted(_))
	}

	/// Returns `true` for [`GrantOutcome::Denied`].
	pub fn is_denied(&self) -> bool {
		matches!(self, Self::Denied { .. })
	}
}

/// Failure detail carried by [`GrantOutcome::Failed`]. Meant for logs, not for requesters.
#[derive(Debug, ThisError)]
#[error("Credential grant failed: {source}")]
pub struct GrantFailure {
	/// Underlying error.
	#[source]
	pub source: Error,
}
impl GrantFailure {
	/// Returns the failure kind used for the `errors:<kind>` counter.
	pub fn kind(&self) -> &'static str {
		self.source.kind()
	}
}
impl From<Error> for GrantFailure {
	fn from(source: Error) -> Self {
		Self { source }
	}
}

/// Coordinates cooldown checks, upstream calls, and counters for every identity.
pub struct Broker<T>
where
	T: ?Sized + UpstreamTransport,
{
	/// Cooldown store shared with the sweeper.
	pub store: Arc<dyn CooldownStore>,
	/// Bounded gateway to the upstream credential endpoint.
	pub gateway: Arc<Gateway<T>>,
	/// Cooldown started after every successful grant.
	pub cooldown: Duration,
	/// Usage counters updated by each grant.
	pub stats: Arc<Stats>,
	grant_guards: Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>,
}
impl<T> Broker<T>
where
	T: ?Sized + UpstreamTransport,
{
	/// Creates a broker around `store` and `gateway` with its own counters.
	pub fn new(
		store: Arc<dyn CooldownStore>,
		gateway: impl Into<Arc<Gateway<T>>>,
		cooldown: Duration,
	) -> Self {
		Self {
			store,
			gateway: gateway.into(),
			cooldown,
			stats: Default::default(),
			grant_guards: Default::default(),
		}
	}

	/// Replaces the counters so they can be shared with the command surface.
	pub fn with_stats(mut self, stats: Arc<Stats>) -> Self {
		self.stats = stats;

		self
	}

	/// Hands out a credential unless `request.identity` is still cooling down.
	///
	/// A denial touches neither the gateway nor the success/error counters. A failure leaves
	/// the stored cooldown exactly as it was.
	pub async fn grant(&self, request: GrantRequest) -> GrantOutcome {
		const KIND: OpKind = OpKind::Grant;

		let identity = request.identity;
		let span = OpSpan::new(KIND, "grant").with_identity(identity);

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let outcome = span
			.instrument(async {
				let guard = self.grant_guard(identity);
				let outcome = {
					let _singleflight = guard.lock().await;

					self.grant_locked(&request).await
				};

				drop(guard);
				self.release_grant_guard(identity);

				outcome
			})
			.await;

		match &outcome {
			GrantOutcome::Granted(_) => {
				self.stats.log_success();
				obs::record_op_outcome(KIND, OpOutcome::Success);
			},
			GrantOutcome::Denied { .. } => obs::record_op_outcome(KIND, OpOutcome::Denied),
			GrantOutcome::Failed(failure) => {
				self.stats.log_error(failure.kind());
				obs::log_grant_failure(identity, &failure.source);
				obs::record_op_outcome(KIND, OpOutcome::Failure);
			},
		}

		outcome
	}

	/// Returns the cooldown still running for `identity`, or zero.
	pub async fn status(&self, identity: UserId) -> Result<Duration> {
		Ok(self.store.remaining(identity).await?)
	}

	/// Number of identities with a grant currently in progress.
	pub fn grants_in_progress(&self) -> usize {
		self.grant_guards.lock().len()
	}

	async fn grant_locked(&self, request: &GrantRequest) -> GrantOutcome {
		let remaining = match self.store.remaining(request.identity).await {
			Ok(remaining) => remaining,
			Err(e) => return GrantOutcome::Failed(Error::from(e).into()),
		};

		if remaining.is_positive() {
			return GrantOutcome::Denied { remaining };
		}

		let credential = match self.gateway.request_credential(request).await {
			Ok(credential) => credential,
			Err(e) => return GrantOutcome::Failed(Error::from(e).into()),
		};

		// Losing the cooldown write must not hand out a credential without a cooldown.
		if let Err(e) = self.store.set_cooldown(request.identity, self.cooldown).await {
			return GrantOutcome::Failed(Error::from(e).into());
		}

		GrantOutcome::Granted(credential)
	}

	fn grant_guard(&self, identity: UserId) -> Arc<AsyncMutex<()>> {
		let mut guards = self.grant_guards.lock();

		guards.entry(identity).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	fn release_grant_guard(&self, identity: UserId) {
		let mut guards = self.grant_guards.lock();

		if guards.get(&identity).is_some_and(|guard| Arc::strong_count(guard) == 1) {
			guards.remove(&identity);
		}
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestTransport> {
	/// Creates a broker that provisions its own reqwest-backed gateway from `config`.
	pub fn from_config(
		store: Arc<dyn CooldownStore>,
		config: &crate::config::BrokerConfig,
	) -> Result<Self> {
		let gateway = Gateway::new(config)?;

		Ok(Self::new(store, gateway, config.cooldown))
	}
}
impl<T> Clone for Broker<T>
where
	T: ?Sized + UpstreamTransport,
{
	fn clone(&self) -> Self {
		Self {
			store: self.store.clone(),
			gateway: self.gateway.clone(),
			cooldown: self.cooldown,
			stats: self.stats.clone(),
			grant_guards: self.grant_guards.clone(),
		}
	}
}
impl<T> Debug for Broker<T>
where
	T: ?Sized + UpstreamTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("gateway", &self.gateway)
			.field("cooldown", &self.cooldown)
			.finish()
	}
}
