// self
use crate::{
	_prelude::*,
	auth::{DisplayName, UserId},
};

/// Chat the reply should be sent to.
pub type ChatId = i64;

/// Raw input from the chat transport: a typed command or a pressed inline button.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncomingUpdate {
	/// A slash command such as `/get` or `/start@broker_bot`.
	Command {
		/// Chat the command came from.
		chat_id: ChatId,
		/// Sender.
		identity: UserId,
		/// Sender label.
		display_name: DisplayName,
		/// Command text as typed.
		command: String,
	},
	/// An inline keyboard button carrying callback data.
	ButtonPress {
		/// Chat the button lives in.
		chat_id: ChatId,
		/// User who pressed it.
		identity: UserId,
		/// User label.
		display_name: DisplayName,
		/// Callback payload attached to the button.
		data: String,
	},
}
impl IncomingUpdate {
	/// Collapses commands and button presses into one request shape.
	///
	/// Returns `None` for commands or payloads the broker does not handle.
	pub fn normalize(self) -> Option<IncomingRequest> {
		match self {
			Self::Command { chat_id, identity, display_name, command } =>
				Action::from_command(&command)
					.map(|action| IncomingRequest { chat_id, identity, display_name, action }),
			Self::ButtonPress { chat_id, identity, display_name, data } => Action::from_button(&data)
				.map(|action| IncomingRequest { chat_id, identity, display_name, action }),
		}
	}
}

/// Canonical request handed to the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingRequest {
	/// Chat to answer in.
	pub chat_id: ChatId,
	/// Requester.
	pub identity: UserId,
	/// Requester label forwarded upstream.
	pub display_name: DisplayName,
	/// What the requester asked for.
	pub action: Action,
}

/// Everything a user can ask the broker for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
	/// Greeting with the current cooldown.
	Start,
	/// A fresh SSH credential.
	RequestCredential,
	/// The requester's own counters.
	MyStats,
	/// Global counters, admins only.
	AdminStats,
}
impl Action {
	/// Callback payload of the "get account" button.
	pub const REQUEST_BUTTON: &'static str = "get_account";
	/// Callback payload of the "my stats" button.
	pub const MY_STATS_BUTTON: &'static str = "mystats";

	/// Parses a slash command, ignoring a `@bot` suffix, arguments, and case.
	pub fn from_command(text: &str) -> Option<Self> {
		let word = text.split_whitespace().next()?.strip_prefix('/')?;
		let name = word.split('@').next().unwrap_or(word);

		match name.to_ascii_lowercase().as_str() {
			"start" => Some(Self::Start),
			"get" => Some(Self::RequestCredential),
			"mystats" => Some(Self::MyStats),
			"admin" => Some(Self::AdminStats),
			_ => None,
		}
	}

	/// Parses inline button callback data.
	pub fn from_button(data: &str) -> Option<Self> {
		match data.trim() {
			Self::REQUEST_BUTTON => Some(Self::RequestCredential),
			Self::MY_STATS_BUTTON => Some(Self::MyStats),
			_ => None,
		}
	}

	/// Label used for the per-command counter.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Start => "start",
			Self::RequestCredential => "get",
			Self::MyStats => "mystats",
			Self::AdminStats => "admin",
		}
	}
}
impl Display for Action {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn name() -> DisplayName {
		DisplayName::new("dave").expect("Display name should be valid.")
	}

	#[test]
	fn commands_parse_with_suffixes_and_arguments() {
		assert_eq!(Action::from_command("/start"), Some(Action::Start));
		assert_eq!(Action::from_command("/GET@ssh_broker_bot now"), Some(Action::RequestCredential));
		assert_eq!(Action::from_command("  /mystats"), Some(Action::MyStats));
		assert_eq!(Action::from_command("/admin"), Some(Action::AdminStats));
		assert_eq!(Action::from_command("get"), None);
		assert_eq!(Action::from_command("/help"), None);
		assert_eq!(Action::from_command(""), None);
	}

	#[test]
	fn command_and_button_normalize_to_the_same_request() {
		let identity = UserId::new(12);
		let command = IncomingUpdate::Command {
			chat_id: 500,
			identity,
			display_name: name(),
			command: "/get".into(),
		};
		let button = IncomingUpdate::ButtonPress {
			chat_id: 500,
			identity,
			display_name: name(),
			data: Action::REQUEST_BUTTON.into(),
		};

		assert_eq!(command.normalize(), button.normalize());
	}

	#[test]
	fn unknown_button_is_ignored() {
		let update = IncomingUpdate::ButtonPress {
			chat_id: 1,
			identity: UserId::new(1),
			display_name: name(),
			data: "delete_everything".into(),
		};

		assert!(update.normalize().is_none());
	}
}
