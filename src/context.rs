//! Explicitly constructed runtime context shared by request handlers and the sweeper.

// crates.io
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	broker::Broker,
	clock::{Clock, SystemClock},
	command::Dispatcher,
	config::BrokerConfig,
	gateway::Gateway,
	http::UpstreamTransport,
	stats::{LivenessReport, Stats},
	store::CooldownStore,
	sweeper::{Notifier, Sweeper},
};
#[cfg(feature = "reqwest")] use crate::{error::ConfigError, http::ReqwestTransport};

/// Everything a running broker needs, wired together once at startup.
pub struct BrokerContext<T>
where
	T: ?Sized + UpstreamTransport,
{
	/// Startup configuration.
	pub config: Arc<BrokerConfig>,
	/// Cooldown store shared by the broker and the sweeper.
	pub store: Arc<dyn CooldownStore>,
	/// Usage counters.
	pub stats: Arc<Stats>,
	/// Grant broker.
	pub broker: Broker<T>,
	/// Command router.
	pub dispatcher: Dispatcher<T>,
	notifier: Arc<dyn Notifier>,
	transport: Arc<T>,
	clock: Arc<dyn Clock>,
}
impl<T> BrokerContext<T>
where
	T: ?Sized + UpstreamTransport,
{
	/// Builds the context around a caller-supplied transport.
	///
	/// The store is probed first; an unreachable store refuses startup with
	/// [`Error::StoreUnavailable`].
	pub async fn connect_with_transport(
		config: BrokerConfig,
		store: Arc<dyn CooldownStore>,
		notifier: Arc<dyn Notifier>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self> {
		store.ping().await?;

		Ok(Self::wire(
			Arc::new(config),
			store,
			Arc::new(Stats::default()),
			notifier,
			transport.into(),
			Arc::new(SystemClock),
		))
	}

	/// Rewires the context around `clock`, which then drives the sweeper, the upstream
	/// request timestamps, and the liveness report.
	///
	/// The broker and dispatcher are rebuilt, so call this before cloning either of them.
	pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
		Self::wire(self.config, self.store, self.stats, self.notifier, self.transport, clock)
	}

	fn wire(
		config: Arc<BrokerConfig>,
		store: Arc<dyn CooldownStore>,
		stats: Arc<Stats>,
		notifier: Arc<dyn Notifier>,
		transport: Arc<T>,
		clock: Arc<dyn Clock>,
	) -> Self {
		let gateway =
			Gateway::<T>::with_transport(&config, transport.clone()).with_clock(clock.clone());
		let broker = Broker::new(store.clone(), gateway, config.cooldown).with_stats(stats.clone());
		let dispatcher = Dispatcher::new(broker.clone(), config.admin_ids.iter().copied());

		Self { config, store, stats, broker, dispatcher, notifier, transport, clock }
	}

	/// Builds a sweeper wired to this context's store, notifier, and clock.
	pub fn sweeper(&self) -> Sweeper {
		Sweeper::from_config(self.store.clone(), self.notifier.clone(), &self.config)
			.with_clock(self.clock.clone())
	}

	/// Starts the sweeper on the current tokio runtime.
	pub fn spawn_sweeper(&self, shutdown: CancellationToken) -> JoinHandle<()> {
		self.sweeper().spawn(shutdown)
	}

	/// Payload for a liveness endpoint.
	pub fn liveness(&self) -> LivenessReport {
		LivenessReport::new(&self.stats, self.clock.now())
	}
}
#[cfg(feature = "reqwest")]
impl BrokerContext<ReqwestTransport> {
	/// Builds the context with a reqwest transport.
	pub async fn connect(
		config: BrokerConfig,
		store: Arc<dyn CooldownStore>,
		notifier: Arc<dyn Notifier>,
	) -> Result<Self> {
		let client = ReqwestClient::builder().build().map_err(ConfigError::from)?;

		Self::connect_with_transport(config, store, notifier, ReqwestTransport::with_client(client))
			.await
	}
}
impl<T> Debug for BrokerContext<T>
where
	T: ?Sized + UpstreamTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BrokerContext")
			.field("config", &self.config)
			.field("broker", &self.broker)
			.finish()
	}
}
