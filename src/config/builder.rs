// self
use crate::{
	_prelude::*,
	auth::UserId,
	config::{BrokerConfig, RequestTemplate},
	error::ConfigError,
};

/// Builder for [`BrokerConfig`] values.
#[derive(Debug)]
pub struct BrokerConfigBuilder {
	/// Upstream endpoint; required.
	pub upstream_url: Option<Url>,
	/// Per-call upstream timeout.
	pub request_timeout: Duration,
	/// Upstream concurrency bound.
	pub max_concurrent_requests: usize,
	/// Cooldown applied after each grant.
	pub cooldown: Duration,
	/// Sweeper interval.
	pub sweep_interval: Duration,
	/// Pause after a failed sweep.
	pub sweep_backoff: Duration,
	/// Upstream request body template.
	pub request_template: RequestTemplate,
	/// Admin allowlist.
	pub admin_ids: HashSet<UserId>,
}
impl BrokerConfigBuilder {
	/// Creates a new builder seeded with the defaults.
	pub fn new() -> Self {
		Self {
			upstream_url: None,
			request_timeout: BrokerConfig::DEFAULT_REQUEST_TIMEOUT,
			max_concurrent_requests: BrokerConfig::DEFAULT_MAX_CONCURRENT_REQUESTS,
			cooldown: BrokerConfig::DEFAULT_COOLDOWN,
			sweep_interval: BrokerConfig::DEFAULT_SWEEP_INTERVAL,
			sweep_backoff: BrokerConfig::DEFAULT_SWEEP_BACKOFF,
			request_template: RequestTemplate::default(),
			admin_ids: HashSet::new(),
		}
	}

	/// Sets the upstream endpoint.
	pub fn upstream_url(mut self, url: Url) -> Self {
		self.upstream_url = Some(url);

		self
	}

	/// Overrides the per-call upstream timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the upstream concurrency bound.
	pub fn max_concurrent_requests(mut self, bound: usize) -> Self {
		self.max_concurrent_requests = bound;

		self
	}

	/// Overrides the cooldown window.
	pub fn cooldown(mut self, cooldown: Duration) -> Self {
		self.cooldown = cooldown;

		self
	}

	/// Overrides the sweeper interval.
	pub fn sweep_interval(mut self, interval: Duration) -> Self {
		self.sweep_interval = interval;

		self
	}

	/// Overrides the pause taken after a failed sweep.
	pub fn sweep_backoff(mut self, backoff: Duration) -> Self {
		self.sweep_backoff = backoff;

		self
	}

	/// Overrides the upstream request body template.
	pub fn request_template(mut self, template: RequestTemplate) -> Self {
		self.request_template = template;

		self
	}

	/// Adds a single admin identity.
	pub fn admin(mut self, identity: UserId) -> Self {
		self.admin_ids.insert(identity);

		self
	}

	/// Adds multiple admin identities.
	pub fn admins<I>(mut self, identities: I) -> Self
	where
		I: IntoIterator<Item = UserId>,
	{
		self.admin_ids.extend(identities);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<BrokerConfig, ConfigError> {
		let upstream_url = self.upstream_url.ok_or(ConfigError::MissingUpstreamUrl)?;
		let config = BrokerConfig {
			upstream_url,
			request_timeout: self.request_timeout,
			max_concurrent_requests: self.max_concurrent_requests,
			cooldown: self.cooldown,
			sweep_interval: self.sweep_interval,
			sweep_backoff: self.sweep_backoff,
			request_template: self.request_template,
			admin_ids: self.admin_ids,
		};

		config.validate()?;

		Ok(config)
	}
}
impl Default for BrokerConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl BrokerConfig {
	fn validate(&self) -> Result<(), ConfigError> {
		if !matches!(self.upstream_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { url: self.upstream_url.to_string() });
		}
		if self.max_concurrent_requests == 0 {
			return Err(ConfigError::ZeroConcurrency);
		}

		validate_positive("request_timeout", self.request_timeout)?;
		validate_positive("cooldown", self.cooldown)?;
		validate_positive("sweep_interval", self.sweep_interval)?;
		validate_positive("sweep_backoff", self.sweep_backoff)?;

		Ok(())
	}
}

fn validate_positive(setting: &'static str, value: Duration) -> Result<(), ConfigError> {
	if value.is_positive() { Ok(()) } else { Err(ConfigError::NonPositiveDuration { setting }) }
}
