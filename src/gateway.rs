//! Bounded-concurrency gateway to the upstream credential endpoint.
//!
//! The gateway owns the only admission control protecting the upstream: a fixed-size FIFO
//! slot pool. A call waits for a slot, then gets one POST bounded by the configured timeout.
//! Status 200/201 with a JSON object body becomes a [`Credential`]; everything else becomes
//! an [`UpstreamError`]. Nothing is retried here.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	broker::GrantRequest,
	clock::{Clock, SystemClock},
	config::{BrokerConfig, RequestTemplate},
	error::UpstreamError,
	http::{UpstreamResponse, UpstreamTransport},
	obs,
};
#[cfg(feature = "reqwest")] use crate::{error::ConfigError, http::ReqwestTransport};

/// Gateway specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestGateway = Gateway<ReqwestTransport>;

/// Bounded-concurrency client for the upstream credential endpoint.
pub struct Gateway<T>
where
	T: ?Sized + UpstreamTransport,
{
	transport: Arc<T>,
	upstream_url: Url,
	template: RequestTemplate,
	timeout: Duration,
	slots: Arc<Semaphore>,
	capacity: usize,
	in_flight: Arc<AtomicUsize>,
	clock: Arc<dyn Clock>,
}
impl<T> Gateway<T>
where
	T: ?Sized + UpstreamTransport,
{
	/// Creates a gateway that sends every call through `transport`.
	pub fn with_transport(config: &BrokerConfig, transport: impl Into<Arc<T>>) -> Self {
		Self {
			transport: transport.into(),
			upstream_url: config.upstream_url.clone(),
			template: config.request_template.clone(),
			timeout: config.request_timeout,
			slots: Arc::new(Semaphore::new(config.max_concurrent_requests)),
			capacity: config.max_concurrent_requests,
			in_flight: Default::default(),
			clock: Arc::new(SystemClock),
		}
	}

	/// Overrides the time source used for the `timestamp` body field.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Maximum number of calls allowed in flight.
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Number of calls currently holding a slot.
	pub fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::Acquire)
	}

	/// Requests a fresh credential for `request`.
	///
	/// Suspends until a slot is free, then performs exactly one POST bounded by the configured
	/// timeout. The slot is released when the call resolves, whatever the outcome.
	pub async fn request_credential(
		&self,
		request: &GrantRequest,
	) -> Result<Credential, UpstreamError> {
		let _slot = self.slots.acquire().await;
		let _in_flight = InFlight::enter(&self.in_flight);
		let body = self.request_body(request, self.clock.now());
		let call = self.transport.post_json(&self.upstream_url, &body);
		let outcome = match tokio::time::timeout(self.timeout.unsigned_abs(), call).await {
			Ok(Ok(response)) => classify(response),
			Ok(Err(e)) => Err(e),
			Err(_) => Err(UpstreamError::Timeout { timeout: self.timeout }),
		};

		if let Err(e) = &outcome {
			obs::record_upstream_failure(e.kind());
		}

		outcome
	}

	/// Builds the JSON body for one call: the configured template plus, when decoration is
	/// enabled, `user_id`, `username`, and `timestamp`.
	pub fn request_body(&self, request: &GrantRequest, now: OffsetDateTime) -> Value {
		let mut fields: Map<String, Value> = self.template.fields.clone();

		if self.template.decorate {
			fields.insert("user_id".into(), Value::from(request.identity.get()));
			fields.insert("username".into(), Value::from(request.display_name.to_string()));
			fields.insert("timestamp".into(), Value::from(now.unix_timestamp()));
		}

		Value::Object(fields)
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestTransport> {
	/// Creates a gateway backed by a freshly built reqwest client.
	pub fn new(config: &BrokerConfig) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().build()?;

		Ok(Self::with_transport(config, ReqwestTransport::with_client(client)))
	}
}
impl<T> Debug for Gateway<T>
where
	T: ?Sized + UpstreamTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("upstream_url", &self.upstream_url.as_str())
			.field("timeout", &self.timeout)
			.field("capacity", &self.capacity)
			.field("in_flight", &self.in_flight())
			.finish()
	}
}

struct InFlight<'a>(&'a AtomicUsize);
impl<'a> InFlight<'a> {
	fn enter(counter: &'a AtomicUsize) -> Self {
		let now = counter.fetch_add(1, Ordering::AcqRel) + 1;

		obs::record_in_flight(now);

		Self(counter)
	}
}
impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		let now = self.0.fetch_sub(1, Ordering::AcqRel) - 1;

		obs::record_in_flight(now);
	}
}

fn classify(response: UpstreamResponse) -> Result<Credential, UpstreamError> {
	if !response.is_success() {
		return Err(UpstreamError::Rejected {
			status: response.status,
			body: response.body_text(),
		});
	}

	let mut de = serde_json::Deserializer::from_slice(&response.body);

	serde_path_to_error::deserialize(&mut de)
		.map_err(|source| UpstreamError::Malformed { source, status: response.status })
}
