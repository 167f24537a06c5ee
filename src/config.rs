//! Startup configuration consumed by the gateway, broker, sweeper, and command surface.
//!
//! Settings are supplied once at startup and treated as immutable for the lifetime of the
//! process. Build them in code with [`BrokerConfig::builder`] or load them from the
//! environment with [`BrokerConfig::from_env`].

/// Builder API for assembling broker configuration.
pub mod builder;
/// Environment variable loader.
pub mod env;

pub use builder::*;
pub use env::*;

// crates.io
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, auth::UserId};

/// Immutable broker configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerConfig {
	/// Upstream endpoint that provisions accounts.
	pub upstream_url: Url,
	/// Per-call timeout for the upstream request.
	pub request_timeout: Duration,
	/// Maximum number of upstream calls in flight at once.
	pub max_concurrent_requests: usize,
	/// Window after a successful grant during which the same identity is denied.
	pub cooldown: Duration,
	/// Delay between two sweeper ticks.
	pub sweep_interval: Duration,
	/// Pause after a failed sweeper tick before ticking resumes.
	pub sweep_backoff: Duration,
	/// Upstream request body; identity fields are added on top when decoration is enabled.
	pub request_template: RequestTemplate,
	/// Identities allowed to read global stats.
	pub admin_ids: HashSet<UserId>,
}
impl BrokerConfig {
	/// Default cooldown: one account per three hours.
	pub const DEFAULT_COOLDOWN: Duration = Duration::hours(3);
	/// Default upstream concurrency bound.
	pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 25;
	/// Default upstream timeout.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(15);
	/// Default pause after a failed sweep.
	pub const DEFAULT_SWEEP_BACKOFF: Duration = Duration::seconds(5);
	/// Default sweeper interval.
	pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::seconds(30);

	/// Creates a new builder seeded with the defaults.
	pub fn builder() -> BrokerConfigBuilder {
		BrokerConfigBuilder::new()
	}

	/// Returns `true` when `identity` may run admin commands.
	pub fn is_admin(&self, identity: UserId) -> bool {
		self.admin_ids.contains(&identity)
	}
}

/// JSON object sent to the upstream on every call.
///
/// The upstream defines which fields it requires; observed deployments only need a fixed
/// owner discriminator, so the body is configuration rather than code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTemplate {
	/// Fields copied verbatim into every request body.
	pub fields: Map<String, Value>,
	/// Adds `user_id`, `username`, and `timestamp` to the body when true.
	pub decorate: bool,
}
impl RequestTemplate {
	/// Builds a template from a JSON value, which must be an object.
	pub fn from_value(value: Value) -> Result<Self, crate::error::ConfigError> {
		match value {
			Value::Object(fields) => Ok(Self { fields, decorate: true }),
			_ => Err(crate::error::ConfigError::InvalidRequestTemplate),
		}
	}

	/// Disables or enables identity decoration.
	pub fn with_decoration(mut self, decorate: bool) -> Self {
		self.decorate = decorate;

		self
	}
}
impl Default for RequestTemplate {
	fn default() -> Self {
		let mut fields = Map::new();

		fields.insert("store_owner_id".into(), Value::from(1));

		Self { fields, decorate: true }
	}
}
