//! Command surface: normalized requests in, typed replies out.
//!
//! A chat transport turns whatever it receives into an [`IncomingUpdate`], normalizes it
//! once, and hands the [`IncomingRequest`] to [`Dispatcher::handle`]. Rendering the
//! [`Reply`] (language, keyboards) stays with the transport.

mod reply;
mod update;

pub use reply::*;
pub use update::*;

// self
use crate::{
	_prelude::*,
	auth::UserId,
	broker::{Broker, GrantOutcome, GrantRequest},
	http::UpstreamTransport,
	obs,
	stats::Stats,
};

/// Routes requests to the broker and the counters.
pub struct Dispatcher<T>
where
	T: ?Sized + UpstreamTransport,
{
	broker: Broker<T>,
	stats: Arc<Stats>,
	admins: Arc<HashSet<UserId>>,
}
impl<T> Dispatcher<T>
where
	T: ?Sized + UpstreamTransport,
{
	/// Creates a dispatcher sharing the broker's counters.
	pub fn new(broker: Broker<T>, admins: impl IntoIterator<Item = UserId>) -> Self {
		let stats = broker.stats.clone();

		Self { broker, stats, admins: Arc::new(admins.into_iter().collect()) }
	}

	/// Broker used for credential requests.
	pub fn broker(&self) -> &Broker<T> {
		&self.broker
	}

	/// Returns `true` when `identity` is on the admin allowlist.
	pub fn is_admin(&self, identity: UserId) -> bool {
		self.admins.contains(&identity)
	}

	/// Normalizes `update` and handles it; unknown input yields `None`.
	pub async fn handle_update(&self, update: IncomingUpdate) -> Option<Outgoing> {
		let request = update.normalize()?;
		let chat_id = request.chat_id;
		let reply = self.handle(request).await;

		Some(Outgoing { chat_id, reply })
	}

	/// Handles one normalized request.
	pub async fn handle(&self, request: IncomingRequest) -> Reply {
		let IncomingRequest { identity, display_name, action, .. } = request;

		if action != Action::AdminStats {
			self.stats.log_request(identity, action.as_str());
		}

		match action {
			Action::Start => match self.broker.status(identity).await {
				Ok(remaining) => Reply::Welcome { remaining },
				Err(e) => {
					obs::log_command_failure(identity, action.as_str(), &e);

					Reply::TryLater
				},
			},
			Action::RequestCredential => {
				match self.broker.grant(GrantRequest::new(identity, display_name)).await {
					GrantOutcome::Granted(credential) => Reply::Credential(credential),
					GrantOutcome::Denied { remaining } => Reply::CooldownActive { remaining },
					GrantOutcome::Failed(_) => Reply::TryLater,
				}
			},
			Action::MyStats => match self.broker.status(identity).await {
				Ok(remaining) =>
					Reply::UserStats { requests: self.stats.user_requests(identity), remaining },
				Err(e) => {
					obs::log_command_failure(identity, action.as_str(), &e);

					Reply::TryLater
				},
			},
			Action::AdminStats if self.is_admin(identity) =>
				Reply::GlobalStats(self.stats.snapshot()),
			Action::AdminStats => Reply::Forbidden,
		}
	}
}
impl<T> Clone for Dispatcher<T>
where
	T: ?Sized + UpstreamTransport,
{
	fn clone(&self) -> Self {
		Self { broker: self.broker.clone(), stats: self.stats.clone(), admins: self.admins.clone() }
	}
}
impl<T> Debug for Dispatcher<T>
where
	T: ?Sized + UpstreamTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("broker", &self.broker)
			.field("admins", &self.admins.len())
			.finish()
	}
}

/// Renders a cooldown as `1d 2h 3m`.
///
/// Seconds only appear when the duration is under a minute; zero or negative durations
/// render as `0s`.
pub fn format_remaining(remaining: Duration) -> String {
	let total = remaining.whole_seconds().max(0);
	let (days, rest) = (total / 86_400, total % 86_400);
	let (hours, rest) = (rest / 3_600, rest % 3_600);
	let (minutes, seconds) = (rest / 60, rest % 60);
	let mut parts = Vec::with_capacity(3);

	if days > 0 {
		parts.push(format!("{days}d"));
	}
	if hours > 0 {
		parts.push(format!("{hours}h"));
	}
	if minutes > 0 {
		parts.push(format!("{minutes}m"));
	}
	if seconds > 0 && parts.is_empty() {
		parts.push(format!("{seconds}s"));
	}

	if parts.is_empty() { "0s".into() } else { parts.join(" ") }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn remaining_renders_compactly() {
		assert_eq!(format_remaining(Duration::ZERO), "0s");
		assert_eq!(format_remaining(Duration::seconds(-5)), "0s");
		assert_eq!(format_remaining(Duration::milliseconds(900)), "0s");
		assert_eq!(format_remaining(Duration::seconds(45)), "45s");
		assert_eq!(format_remaining(Duration::seconds(61)), "1m");
		assert_eq!(format_remaining(Duration::hours(3)), "3h");
		assert_eq!(
			format_remaining(Duration::days(1) + Duration::hours(2) + Duration::minutes(3)),
			"1d 2h 3m"
		);
		assert_eq!(format_remaining(Duration::hours(2) + Duration::seconds(59)), "2h");
	}
}
