// self
use crate::{
	_prelude::*,
	auth::UserId,
	config::{BrokerConfig, BrokerConfigBuilder, RequestTemplate},
	error::ConfigError,
};

/// Upstream endpoint (required).
pub const ENV_API_URL: &str = "API_URL";
/// Upstream timeout in seconds.
pub const ENV_REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT";
/// Upstream concurrency bound.
pub const ENV_MAX_CONCURRENT_REQUESTS: &str = "MAX_CONCURRENT_REQUESTS";
/// Cooldown in seconds.
pub const ENV_COOLDOWN_SECONDS: &str = "COOLDOWN_SECONDS";
/// Sweeper interval in seconds.
pub const ENV_SWEEP_INTERVAL: &str = "SWEEP_INTERVAL";
/// Comma-separated admin user IDs.
pub const ENV_ADMIN_USERS: &str = "ADMIN_USERS";
/// JSON object used as the upstream request body.
pub const ENV_REQUEST_TEMPLATE: &str = "UPSTREAM_REQUEST_TEMPLATE";

impl BrokerConfig {
	/// Loads configuration from the process environment, falling back to the defaults for
	/// every variable except [`ENV_API_URL`].
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Loads configuration through an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
		let raw_url = read(ENV_API_URL).ok_or(ConfigError::MissingUpstreamUrl)?;
		let upstream_url = Url::parse(raw_url.trim())
			.map_err(|source| ConfigError::InvalidUpstreamUrl { source })?;
		let mut builder = BrokerConfigBuilder::new().upstream_url(upstream_url);

		if let Some(raw) = read(ENV_REQUEST_TIMEOUT) {
			builder = builder.request_timeout(parse_seconds(ENV_REQUEST_TIMEOUT, &raw)?);
		}
		if let Some(raw) = read(ENV_MAX_CONCURRENT_REQUESTS) {
			builder = builder
				.max_concurrent_requests(parse_number(ENV_MAX_CONCURRENT_REQUESTS, &raw)?);
		}
		if let Some(raw) = read(ENV_COOLDOWN_SECONDS) {
			builder = builder.cooldown(parse_seconds(ENV_COOLDOWN_SECONDS, &raw)?);
		}
		if let Some(raw) = read(ENV_SWEEP_INTERVAL) {
			builder = builder.sweep_interval(parse_seconds(ENV_SWEEP_INTERVAL, &raw)?);
		}
		if let Some(raw) = read(ENV_ADMIN_USERS) {
			builder = builder.admins(parse_admins(&raw)?);
		}
		if let Some(raw) = read(ENV_REQUEST_TEMPLATE) {
			let value = serde_json::from_str(&raw).map_err(|_| ConfigError::InvalidEnv {
				name: ENV_REQUEST_TEMPLATE,
				value: raw.clone(),
			})?;

			builder = builder.request_template(RequestTemplate::from_value(value)?);
		}

		builder.build()
	}
}

fn parse_number<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
	T: FromStr,
{
	raw.trim().parse().map_err(|_| ConfigError::InvalidEnv { name, value: raw.to_owned() })
}

fn parse_seconds(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
	parse_number::<i64>(name, raw).map(Duration::seconds)
}

fn parse_admins(raw: &str) -> Result<Vec<UserId>, ConfigError> {
	raw.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(|s| {
			s.parse::<UserId>().map_err(|_| ConfigError::InvalidEnv {
				name: ENV_ADMIN_USERS,
				value: raw.to_owned(),
			})
		})
		.collect()
}
