//! Per-identity cooldown broker for temporary SSH accounts: a bounded upstream gateway,
//! an expiry sweeper that tells users when they may ask again, and flat usage counters.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod broker;
pub mod clock;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod http;
pub mod obs;
pub mod stats;
pub mod store;
pub mod sweeper;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		broker::Broker,
		clock::{Clock, ManualClock},
		config::BrokerConfig,
		gateway::Gateway,
		http::ReqwestTransport,
		stats::Stats,
		store::{CooldownStore, MemoryStore},
	};

	/// Broker type alias used by reqwest-backed integration tests.
	pub type ReqwestTestBroker = Broker<ReqwestTransport>;

	/// Everything a broker integration test needs to drive and inspect a broker.
	pub struct TestHarness {
		/// Broker under test.
		pub broker: ReqwestTestBroker,
		/// Backing store, shared with the broker.
		pub store: Arc<MemoryStore>,
		/// Clock shared by the store and the broker.
		pub clock: Arc<ManualClock>,
		/// Counters shared with the broker.
		pub stats: Arc<Stats>,
	}

	/// Builds a config pointing at `upstream` with a short timeout suitable for tests.
	pub fn test_config(upstream: &str) -> BrokerConfig {
		BrokerConfig::builder()
			.upstream_url(Url::parse(upstream).expect("Test upstream URL should parse."))
			.request_timeout(Duration::seconds(2))
			.build()
			.expect("Test broker config should build successfully.")
	}

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs a [`Broker`] backed by an in-memory store and a manual clock pinned to
	/// the current instant.
	pub fn build_reqwest_test_broker(config: &BrokerConfig) -> TestHarness {
		let clock = Arc::new(ManualClock::new(OffsetDateTime::now_utc()));
		let shared_clock: Arc<dyn Clock> = clock.clone();
		let store = Arc::new(MemoryStore::with_clock(shared_clock.clone()));
		let dyn_store: Arc<dyn CooldownStore> = store.clone();
		let stats = Arc::new(Stats::default());
		let gateway = Gateway::<ReqwestTransport>::with_transport(config, test_reqwest_transport())
			.with_clock(shared_clock);
		let broker = Broker::new(dyn_store, gateway, config.cooldown).with_stats(stats.clone());

		TestHarness { broker, store, clock, stats }
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet, HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::{Mutex as AsyncMutex, Semaphore};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {axum as _, color_eyre as _, httpmock as _};
