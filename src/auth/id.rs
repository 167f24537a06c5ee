//! Strongly typed requester identifiers.

// std
use std::{num::ParseIntError, ops::Deref};
// self
use crate::_prelude::*;

const DISPLAY_NAME_MAX_LEN: usize = 64;

/// Stable key identifying a requester (the chat platform's numeric account ID).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);
impl UserId {
	/// Wraps a raw numeric account ID.
	pub const fn new(raw: i64) -> Self {
		Self(raw)
	}

	/// Returns the raw numeric account ID.
	pub const fn get(self) -> i64 {
		self.0
	}
}
impl From<i64> for UserId {
	fn from(raw: i64) -> Self {
		Self(raw)
	}
}
impl Debug for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "User({})", self.0)
	}
}
impl Display for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}
impl FromStr for UserId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let view = s.trim();

		if view.is_empty() {
			return Err(IdentifierError::Empty);
		}

		view.parse::<i64>()
			.map(Self)
			.map_err(|source| IdentifierError::NotNumeric { value: view.to_owned(), source })
	}
}

/// Human-facing name forwarded to the upstream as request decoration.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);
impl DisplayName {
	/// Creates a display name after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref().trim();

		if view.is_empty() {
			return Err(IdentifierError::Empty);
		}
		if view.chars().count() > DISPLAY_NAME_MAX_LEN {
			return Err(IdentifierError::TooLong { max: DISPLAY_NAME_MAX_LEN });
		}

		Ok(Self(view.to_owned()))
	}

	/// Uses the platform username when present, otherwise the numeric ID rendered as text.
	pub fn or_user_id(username: Option<&str>, identity: UserId) -> Self {
		username
			.and_then(|name| Self::new(name).ok())
			.unwrap_or_else(|| Self(identity.to_string()))
	}
}
impl Deref for DisplayName {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for DisplayName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl TryFrom<String> for DisplayName {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<DisplayName> for String {
	fn from(value: DisplayName) -> Self {
		value.0
	}
}
impl Debug for DisplayName {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "DisplayName({})", self.0)
	}
}
impl Display for DisplayName {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty or whitespace.
	#[error("Identifier cannot be empty.")]
	Empty,
	/// The user ID is not a base-10 integer.
	#[error("User identifier `{value}` is not numeric.")]
	NotNumeric {
		/// Raw input.
		value: String,
		/// Underlying parse failure.
		#[source]
		source: ParseIntError,
	},
	/// The display name exceeded the allowed character count.
	#[error("Display name exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}
