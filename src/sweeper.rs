//! Periodic expiry sweeper that tells users when they may request again.
//!
//! Each tick drains every cooldown that ended by "now" from the store and fires one
//! [`Notifier::notify_ready`] per identity. A failing notification is logged and skipped;
//! a failing store aborts the tick, which the run loop answers with a short backoff.
//! Shutdown is observed between ticks, never in the middle of one.

// crates.io
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::UserId,
	clock::{Clock, SystemClock},
	config::BrokerConfig,
	obs::{self, OpKind, OpOutcome, OpSpan},
	store::CooldownStore,
};

/// Error returned by a [`Notifier`].
pub type NotifyError = Box<dyn StdError + Send + Sync>;

/// Boxed future returned by [`Notifier::notify_ready`].
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), NotifyError>> + 'a + Send>>;

/// Delivery seam for "your cooldown is over" messages.
pub trait Notifier
where
	Self: Send + Sync,
{
	/// Tells `identity` it may request a new credential.
	fn notify_ready(&self, identity: UserId) -> NotifyFuture<'_>;
}

/// Lifecycle state of a [`Sweeper`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweeperState {
	/// Waiting for the next tick.
	Idle,
	/// Draining expired cooldowns.
	Sweeping,
}

/// Counts gathered during one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
	/// Identities whose cooldown was drained.
	pub expired: usize,
	/// Notifications delivered.
	pub notified: usize,
	/// Notifications that failed.
	pub failed: usize,
	/// Housekeeping `clear` calls that failed; the notification was still attempted.
	pub clear_failed: usize,
}

/// Background task draining expired cooldowns.
#[derive(Clone)]
pub struct Sweeper {
	store: Arc<dyn CooldownStore>,
	notifier: Arc<dyn Notifier>,
	clock: Arc<dyn Clock>,
	interval: Duration,
	backoff: Duration,
	state: Arc<Mutex<SweeperState>>,
}
impl Sweeper {
	/// Creates a sweeper that ticks every `interval` against the system clock.
	pub fn new(
		store: Arc<dyn CooldownStore>,
		notifier: Arc<dyn Notifier>,
		interval: Duration,
	) -> Self {
		Self {
			store,
			notifier,
			clock: Arc::new(SystemClock),
			interval,
			backoff: BrokerConfig::DEFAULT_SWEEP_BACKOFF,
			state: Arc::new(Mutex::new(SweeperState::Idle)),
		}
	}

	/// Creates a sweeper using the interval and backoff from `config`.
	pub fn from_config(
		store: Arc<dyn CooldownStore>,
		notifier: Arc<dyn Notifier>,
		config: &BrokerConfig,
	) -> Self {
		Self::new(store, notifier, config.sweep_interval).with_backoff(config.sweep_backoff)
	}

	/// Overrides the pause taken after a failed tick.
	pub fn with_backoff(mut self, backoff: Duration) -> Self {
		self.backoff = backoff;

		self
	}

	/// Overrides the time source used to decide what has expired.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Current lifecycle state.
	pub fn state(&self) -> SweeperState {
		*self.state.lock()
	}

	/// Runs exactly one sweep.
	///
	/// Returns an error only when the store cannot be drained; individual notification
	/// failures are reported in [`SweepReport::failed`]. Every drained identity gets a
	/// notification attempt, even when its `clear` fails.
	pub async fn tick(&self) -> Result<SweepReport> {
		const KIND: OpKind = OpKind::Sweep;

		let span = OpSpan::new(KIND, "tick");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				let _sweeping = StateGuard::enter(&self.state);
				let expired = self.store.pop_expired(self.clock.now()).await?;
				let mut report = SweepReport { expired: expired.len(), ..Default::default() };

				for identity in expired {
					if let Err(e) = self.store.clear(identity).await {
						obs::log_clear_failure(identity, &e);

						report.clear_failed += 1;
					}

					if self.notify(identity).await {
						report.notified += 1;
					} else {
						report.failed += 1;
					}
				}

				Ok::<_, Error>(report)
			})
			.await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	/// Ticks every interval until `shutdown` is cancelled.
	pub async fn run(self, shutdown: CancellationToken) {
		let mut interval = tokio::time::interval(self.interval.unsigned_abs());

		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
		obs::log_sweeper_state("Cooldown sweeper started.");

		loop {
			tokio::select! {
				_ = interval.tick() => {
					if let Err(e) = self.tick().await {
						obs::log_sweep_failure(&e, self.backoff);

						tokio::select! {
							_ = tokio::time::sleep(self.backoff.unsigned_abs()) => {},
							_ = shutdown.cancelled() => break,
						}
					}
				}
				_ = shutdown.cancelled() => break,
			}
		}

		obs::log_sweeper_state("Cooldown sweeper shutting down.");
	}

	/// Starts [`Sweeper::run`] on the current tokio runtime.
	pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
		tokio::spawn(self.run(shutdown))
	}

	async fn notify(&self, identity: UserId) -> bool {
		const KIND: OpKind = OpKind::Notify;

		match self.notifier.notify_ready(identity).await {
			Ok(()) => {
				obs::record_op_outcome(KIND, OpOutcome::Success);

				true
			},
			Err(e) => {
				obs::log_notify_failure(identity, &*e);
				obs::record_op_outcome(KIND, OpOutcome::Failure);

				false
			},
		}
	}
}
impl Debug for Sweeper {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Sweeper")
			.field("interval", &self.interval)
			.field("backoff", &self.backoff)
			.field("state", &self.state())
			.finish()
	}
}

struct StateGuard<'a>(&'a Mutex<SweeperState>);
impl<'a> StateGuard<'a> {
	fn enter(state: &'a Mutex<SweeperState>) -> Self {
		*state.lock() = SweeperState::Sweeping;

		Self(state)
	}
}
impl Drop for StateGuard<'_> {
	fn drop(&mut self) {
		*self.0.lock() = SweeperState::Idle;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		clock::ManualClock,
		store::{MemoryStore, StoreError, StoreFuture},
	};

	#[derive(Default)]
	struct Recorder {
		seen: Mutex<Vec<UserId>>,
		refuse: Option<UserId>,
	}
	impl Notifier for Recorder {
		fn notify_ready(&self, identity: UserId) -> NotifyFuture<'_> {
			Box::pin(async move {
				if self.refuse == Some(identity) {
					return Err("chat blocked".into());
				}

				self.seen.lock().push(identity);

				Ok(())
			})
		}
	}

	/// Memory store whose `clear` always fails.
	struct ClearRefused(MemoryStore);
	impl CooldownStore for ClearRefused {
		fn set_cooldown(
			&self,
			identity: UserId,
			duration: Duration,
		) -> StoreFuture<'_, OffsetDateTime> {
			self.0.set_cooldown(identity, duration)
		}

		fn remaining(&self, identity: UserId) -> StoreFuture<'_, Duration> {
			self.0.remaining(identity)
		}

		fn clear(&self, _: UserId) -> StoreFuture<'_, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "read-only replica".into() }) })
		}

		fn pop_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, Vec<UserId>> {
			self.0.pop_expired(now)
		}

		fn ping(&self) -> StoreFuture<'_, ()> {
			self.0.ping()
		}
	}

	fn fixture(notifier: Arc<Recorder>) -> (Sweeper, Arc<MemoryStore>, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::new(OffsetDateTime::now_utc()));
		let shared_clock: Arc<dyn Clock> = clock.clone();
		let store = Arc::new(MemoryStore::with_clock(shared_clock.clone()));
		let sweeper =
			Sweeper::new(store.clone(), notifier, Duration::seconds(30)).with_clock(shared_clock);

		(sweeper, store, clock)
	}

	#[tokio::test]
	async fn tick_notifies_each_expired_identity_once() {
		let notifier = Arc::new(Recorder::default());
		let (sweeper, store, clock) = fixture(notifier.clone());

		store.set_cooldown(UserId::new(1), Duration::seconds(1)).await.expect("Set should work.");
		store.set_cooldown(UserId::new(2), Duration::hours(3)).await.expect("Set should work.");
		clock.advance(Duration::seconds(2));

		let report = sweeper.tick().await.expect("Tick should succeed.");

		assert_eq!(report, SweepReport { expired: 1, notified: 1, ..Default::default() });
		assert_eq!(*notifier.seen.lock(), vec![UserId::new(1)]);
		assert_eq!(sweeper.tick().await.expect("Second tick should succeed.").expired, 0);
		assert_eq!(store.len(), 1);
		assert_eq!(sweeper.state(), SweeperState::Idle);
	}

	#[tokio::test]
	async fn failed_notification_does_not_stop_the_tick() {
		let notifier = Arc::new(Recorder { refuse: Some(UserId::new(1)), ..Default::default() });
		let (sweeper, store, clock) = fixture(notifier.clone());

		for id in 1..=3 {
			store
				.set_cooldown(UserId::new(id), Duration::seconds(1))
				.await
				.expect("Set should work.");
		}

		clock.advance(Duration::minutes(1));

		let report = sweeper.tick().await.expect("Tick should succeed.");

		assert_eq!(report, SweepReport { expired: 3, notified: 2, failed: 1, clear_failed: 0 });
		assert_eq!(*notifier.seen.lock(), vec![UserId::new(2), UserId::new(3)]);
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn expired_lookup_before_the_tick_still_notifies() {
		let notifier = Arc::new(Recorder::default());
		let (sweeper, store, clock) = fixture(notifier.clone());
		let identity = UserId::new(7);

		store.set_cooldown(identity, Duration::seconds(1)).await.expect("Set should work.");
		clock.advance(Duration::seconds(2));

		assert_eq!(store.remaining(identity).await.expect("Lookup should work."), Duration::ZERO);

		let report = sweeper.tick().await.expect("Tick should succeed.");

		assert_eq!(report, SweepReport { expired: 1, notified: 1, ..Default::default() });
		assert_eq!(*notifier.seen.lock(), vec![identity]);
	}

	#[tokio::test]
	async fn failed_clear_still_notifies() {
		let clock = Arc::new(ManualClock::new(OffsetDateTime::now_utc()));
		let shared_clock: Arc<dyn Clock> = clock.clone();
		let store = Arc::new(ClearRefused(MemoryStore::with_clock(shared_clock.clone())));
		let notifier = Arc::new(Recorder::default());
		let sweeper = Sweeper::new(store.clone(), notifier.clone(), Duration::seconds(30))
			.with_clock(shared_clock);

		for id in [1, 2] {
			store
				.set_cooldown(UserId::new(id), Duration::seconds(1))
				.await
				.expect("Set should work.");
		}

		clock.advance(Duration::seconds(2));

		let report = sweeper.tick().await.expect("Tick should succeed.");

		assert_eq!(report, SweepReport { expired: 2, notified: 2, failed: 0, clear_failed: 2 });
		assert_eq!(*notifier.seen.lock(), vec![UserId::new(1), UserId::new(2)]);
	}

	#[tokio::test]
	async fn run_stops_on_cancellation() {
		let notifier = Arc::new(Recorder::default());
		let (sweeper, _store, _clock) = fixture(notifier);
		let shutdown = CancellationToken::new();
		let handle = sweeper.clone().spawn(shutdown.clone());

		shutdown.cancel();

		tokio::time::timeout(std::time::Duration::from_secs(5), handle)
			.await
			.expect("Sweeper should stop promptly after cancellation.")
			.expect("Sweeper task should not panic.");

		assert_eq!(sweeper.state(), SweeperState::Idle);
	}
}
