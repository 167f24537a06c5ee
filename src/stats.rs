//! Flat, increment-only usage counters and the liveness payload built from them.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use time::format_description::well_known::Rfc3339;
// self
use crate::{_prelude::*, auth::UserId};

/// Thread-safe usage counters shared by the command surface and the broker.
#[derive(Debug, Default)]
pub struct Stats {
	total_requests: AtomicU64,
	success: AtomicU64,
	errors: AtomicU64,
	user_requests: RwLock<HashMap<UserId, u64>>,
	commands: RwLock<BTreeMap<String, u64>>,
	error_kinds: RwLock<BTreeMap<String, u64>>,
	unique_users: RwLock<HashSet<UserId>>,
}
impl Stats {
	/// Records one incoming command from `identity`.
	pub fn log_request(&self, identity: UserId, command: &str) {
		self.total_requests.fetch_add(1, Ordering::Relaxed);

		*self.user_requests.write().entry(identity).or_default() += 1;
		*self.commands.write().entry(command.to_owned()).or_default() += 1;

		self.unique_users.write().insert(identity);
	}

	/// Records one credential handed out.
	pub fn log_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	/// Records one failed credential request, tagged by failure kind.
	pub fn log_error(&self, kind: &str) {
		self.errors.fetch_add(1, Ordering::Relaxed);

		*self.error_kinds.write().entry(kind.to_owned()).or_default() += 1;
	}

	/// Returns the total number of logged commands.
	pub fn total_requests(&self) -> u64 {
		self.total_requests.load(Ordering::Relaxed)
	}

	/// Returns the number of credentials handed out.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed credential requests.
	pub fn errors(&self) -> u64 {
		self.errors.load(Ordering::Relaxed)
	}

	/// Returns how many commands `identity` has sent.
	pub fn user_requests(&self, identity: UserId) -> u64 {
		self.user_requests.read().get(&identity).copied().unwrap_or(0)
	}

	/// Returns how often `command` was invoked.
	pub fn command_count(&self, command: &str) -> u64 {
		self.commands.read().get(command).copied().unwrap_or(0)
	}

	/// Returns how often a failure of `kind` was recorded.
	pub fn error_count(&self, kind: &str) -> u64 {
		self.error_kinds.read().get(kind).copied().unwrap_or(0)
	}

	/// Returns the number of distinct identities seen.
	pub fn unique_users(&self) -> u64 {
		self.unique_users.read().len() as u64
	}

	/// Captures the global counters shown to admins and on the liveness endpoint.
	pub fn snapshot(&self) -> StatsSnapshot {
		StatsSnapshot {
			total_requests: self.total_requests(),
			success_count: self.successes(),
			error_count: self.errors(),
			unique_users: self.unique_users(),
		}
	}
}

/// Point-in-time view of the global counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
	/// Commands received.
	pub total_requests: u64,
	/// Credentials handed out.
	pub success_count: u64,
	/// Failed credential requests.
	pub error_count: u64,
	/// Distinct identities seen.
	pub unique_users: u64,
}

/// JSON body served by a liveness endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LivenessReport {
	/// Always `"ok"` while the process is serving.
	pub status: &'static str,
	/// Global counters.
	pub stats: StatsSnapshot,
	/// RFC 3339 timestamp of the report.
	pub ts: String,
}
impl LivenessReport {
	/// Builds a report from the current counters at `now`.
	pub fn new(stats: &Stats, now: OffsetDateTime) -> Self {
		let ts = now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp().to_string());

		Self { status: "ok", stats: stats.snapshot(), ts }
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn counters_track_requests_per_user_and_command() {
		let stats = Stats::default();
		let alice = UserId::new(1);
		let bob = UserId::new(2);

		stats.log_request(alice, "get");
		stats.log_request(alice, "mystats");
		stats.log_request(bob, "get");
		stats.log_success();
		stats.log_error("timeout");
		stats.log_error("timeout");

		assert_eq!(stats.user_requests(alice), 2);
		assert_eq!(stats.user_requests(UserId::new(3)), 0);
		assert_eq!(stats.command_count("get"), 2);
		assert_eq!(stats.error_count("timeout"), 2);
		assert_eq!(
			stats.snapshot(),
			StatsSnapshot { total_requests: 3, success_count: 1, error_count: 2, unique_users: 2 }
		);
	}

	#[test]
	fn liveness_report_serializes_with_status_and_timestamp() {
		let stats = Stats::default();

		stats.log_request(UserId::new(5), "start");

		let report = LivenessReport::new(&stats, macros::datetime!(2025-11-10 12:00 UTC));
		let payload = serde_json::to_value(&report).expect("Liveness report should serialize.");

		assert_eq!(payload["status"], "ok");
		assert_eq!(payload["stats"]["total_requests"], 1);
		assert_eq!(payload["ts"], "2025-11-10T12:00:00Z");
	}
}
