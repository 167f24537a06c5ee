// self
use crate::{_prelude::*, auth::Credential, command::ChatId, stats::StatsSnapshot};

/// Typed answer to one request; the chat transport decides how to render it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
	/// Greeting plus the requester's current cooldown (zero when ready).
	Welcome {
		/// Cooldown left.
		remaining: Duration,
	},
	/// A freshly issued credential.
	Credential(Credential),
	/// The requester must wait before asking again.
	CooldownActive {
		/// Cooldown left.
		remaining: Duration,
	},
	/// Something failed on our side; details are in the log only.
	TryLater,
	/// The requester's own counters.
	UserStats {
		/// Commands sent by the requester.
		requests: u64,
		/// Cooldown left.
		remaining: Duration,
	},
	/// Global counters for admins.
	GlobalStats(StatsSnapshot),
	/// The requester is not on the admin allowlist.
	Forbidden,
}

/// A reply addressed to the chat it answers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outgoing {
	/// Destination chat.
	pub chat_id: ChatId,
	/// Reply body.
	pub reply: Reply,
}
