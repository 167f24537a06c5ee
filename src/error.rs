//! Broker-level error types shared across the store, gateway, and configuration layers.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The shared state backend is unreachable or returned garbage.
	#[error("Cooldown store is unavailable: {0}")]
	StoreUnavailable(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The upstream credential API failed the call.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
}
impl Error {
	/// Returns a stable label suitable for counters and log fields.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::StoreUnavailable(_) => "store",
			Self::Config(_) => "config",
			Self::Upstream(e) => e.kind(),
		}
	}
}

/// Configuration and validation failures raised while assembling the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// No upstream URL was supplied.
	#[error("Missing upstream credential endpoint.")]
	MissingUpstreamUrl,
	/// The upstream URL cannot be parsed.
	#[error("Upstream URL is invalid.")]
	InvalidUpstreamUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The upstream URL uses a scheme other than HTTP(S).
	#[error("The upstream endpoint must use http or https: {url}.")]
	UnsupportedScheme {
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// A duration setting is zero or negative.
	#[error("The {setting} setting must be positive.")]
	NonPositiveDuration {
		/// Name of the offending setting.
		setting: &'static str,
	},
	/// The gateway would never admit a call.
	#[error("The gateway concurrency bound must be at least 1.")]
	ZeroConcurrency,
	/// The request body template is not a JSON object.
	#[error("The upstream request template must be a JSON object.")]
	InvalidRequestTemplate,
	/// An environment variable holds a value that cannot be parsed.
	#[error("Environment variable {name} has an invalid value: {value}.")]
	InvalidEnv {
		/// Variable name.
		name: &'static str,
		/// Raw value that failed to parse.
		value: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures surfaced by a single upstream credential call.
///
/// None of these are retried by the gateway; the caller decides whether to try again.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// The call did not complete within the configured timeout.
	#[error("Upstream credential call timed out after {timeout}.")]
	Timeout {
		/// Timeout that elapsed.
		timeout: Duration,
	},
	/// The upstream answered with a status other than 200/201.
	#[error("Upstream rejected the request with status {status}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Raw response body, kept for logs only.
		body: String,
	},
	/// The upstream answered 200/201 but the body is not a JSON object.
	#[error("Upstream returned a malformed credential payload.")]
	Malformed {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
	/// Underlying HTTP client reported a network failure (DNS, TCP, TLS).
	#[error("Network error occurred while calling the upstream credential endpoint.")]
	Transport {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl UpstreamError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Box::new(src) }
	}

	/// Returns a stable label suitable for counters and log fields.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Timeout { .. } => "timeout",
			Self::Rejected { .. } => "rejected",
			Self::Malformed { .. } => "malformed",
			Self::Transport { .. } => "transport",
		}
	}
}
