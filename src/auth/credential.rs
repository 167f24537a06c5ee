//! Opaque credential payloads returned by the upstream provisioning API.

// crates.io
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

/// Field carrying the SSH username in the upstream payload.
pub const USERNAME_FIELD: &str = "Usuario";
/// Field carrying the SSH password in the upstream payload.
pub const SECRET_FIELD: &str = "Senha";
/// Field carrying the human-readable validity window in the upstream payload.
pub const VALIDITY_FIELD: &str = "Expiracao";
/// Optional field carrying the server address in the upstream payload.
pub const SERVER_FIELD: &str = "Servidor";

const REDACTED_FIELDS: [&str; 4] = [SECRET_FIELD, "password", "secret", "senha"];

/// Credential issued by the upstream; field names are passed through verbatim.
///
/// The payload shape belongs to the upstream, so the broker only insists on it being a JSON
/// object. Formatters never print secret fields.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(Map<String, Value>);
impl Credential {
	/// Wraps an already-parsed JSON object.
	pub fn from_map(fields: Map<String, Value>) -> Self {
		Self(fields)
	}

	/// Returns the raw field value, if present.
	pub fn field(&self, name: &str) -> Option<&Value> {
		self.0.get(name)
	}

	/// Returns a field rendered as text; strings are returned unquoted, numbers and booleans
	/// through their JSON form, and `null`/absent fields as `None`.
	pub fn text(&self, name: &str) -> Option<String> {
		match self.0.get(name)? {
			Value::Null => None,
			Value::String(s) => Some(s.clone()),
			other => Some(other.to_string()),
		}
	}

	/// SSH username.
	pub fn username(&self) -> Option<String> {
		self.text(USERNAME_FIELD)
	}

	/// SSH password. Callers must avoid logging this string.
	pub fn expose_secret(&self) -> Option<String> {
		self.text(SECRET_FIELD)
	}

	/// Validity description, e.g. `"3h"`.
	pub fn validity(&self) -> Option<String> {
		self.text(VALIDITY_FIELD)
	}

	/// Server address, when the upstream includes one.
	pub fn server(&self) -> Option<String> {
		self.text(SERVER_FIELD)
	}

	/// Returns `true` when the upstream supplied both a username and a secret.
	pub fn is_complete(&self) -> bool {
		self.username().is_some() && self.expose_secret().is_some()
	}

	/// Borrows the full payload.
	pub fn as_map(&self) -> &Map<String, Value> {
		&self.0
	}

	fn is_redacted(name: &str) -> bool {
		REDACTED_FIELDS.iter().any(|field| field.eq_ignore_ascii_case(name))
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut map = f.debug_map();

		for (name, value) in &self.0 {
			if Self::is_redacted(name) {
				map.entry(name, &"<redacted>");
			} else {
				map.entry(name, value);
			}
		}

		map.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn fixture() -> Credential {
		serde_json::from_str(r#"{"Usuario":"u1","Senha":"p1","Expiracao":"3h","limite":1}"#)
			.expect("Credential fixture should deserialize.")
	}

	#[test]
	fn accessors_pass_fields_through() {
		let credential = fixture();

		assert_eq!(credential.username().as_deref(), Some("u1"));
		assert_eq!(credential.expose_secret().as_deref(), Some("p1"));
		assert_eq!(credential.validity().as_deref(), Some("3h"));
		assert_eq!(credential.text("limite").as_deref(), Some("1"));
		assert_eq!(credential.server(), None);
		assert!(credential.is_complete());
	}

	#[test]
	fn debug_redacts_secret() {
		let rendered = format!("{:?}", fixture());

		assert!(rendered.contains("u1"));
		assert!(!rendered.contains("p1"), "Secret leaked into Debug output: {rendered}");
		assert!(rendered.contains("<redacted>"));
	}

	#[test]
	fn non_objects_are_rejected() {
		assert!(serde_json::from_str::<Credential>("[1,2]").is_err());
		assert!(serde_json::from_str::<Credential>("\"error\"").is_err());
	}
}
