//! Storage contracts and built-in store implementations for per-identity cooldowns.
//!
//! A cooldown is a single expiry instant per identity; no history is kept. Stores pair the
//! direct entry with an expiry-ordered index so the sweeper can ask for "everything due by
//! now" without scanning every identity.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::UserId};

/// Boxed future returned by [`CooldownStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by cooldown stores.
///
/// Every method must be atomic with respect to the others: the broker and the sweeper call
/// into the same store concurrently.
pub trait CooldownStore
where
	Self: Send + Sync,
{
	/// Overwrites any existing cooldown for `identity` so it ends `duration` from now and
	/// returns the new expiry instant.
	fn set_cooldown(&self, identity: UserId, duration: Duration) -> StoreFuture<'_, OffsetDateTime>;

	/// Returns how long the cooldown for `identity` still runs, or [`Duration::ZERO`] when
	/// none is active. Read-only: an expired entry stays indexed until
	/// [`CooldownStore::pop_expired`] drains it.
	fn remaining(&self, identity: UserId) -> StoreFuture<'_, Duration>;

	/// Removes the entry and its index record; succeeds when nothing is stored.
	fn clear(&self, identity: UserId) -> StoreFuture<'_, ()>;

	/// Removes and returns every identity whose cooldown ended at or before `now`.
	fn pop_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, Vec<UserId>>;

	/// Confirms the backend is reachable.
	fn ping(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CooldownStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Direct entry plus expiry-ordered index shared by the built-in stores.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct CooldownTable {
	entries: HashMap<UserId, OffsetDateTime>,
	index: BTreeSet<(OffsetDateTime, UserId)>,
}
impl CooldownTable {
	pub(crate) fn from_entries(entries: impl IntoIterator<Item = (UserId, OffsetDateTime)>) -> Self {
		let mut table = Self::default();

		for (identity, expires_at) in entries {
			table.set(identity, expires_at);
		}

		table
	}

	pub(crate) fn entries(&self) -> &HashMap<UserId, OffsetDateTime> {
		&self.entries
	}

	pub(crate) fn set(&mut self, identity: UserId, expires_at: OffsetDateTime) {
		if let Some(previous) = self.entries.insert(identity, expires_at) {
			self.index.remove(&(previous, identity));
		}

		self.index.insert((expires_at, identity));
	}

	pub(crate) fn remaining(&self, identity: UserId, now: OffsetDateTime) -> Duration {
		match self.entries.get(&identity) {
			Some(&expires_at) if expires_at > now => expires_at - now,
			_ => Duration::ZERO,
		}
	}

	pub(crate) fn clear(&mut self, identity: UserId) -> bool {
		match self.entries.remove(&identity) {
			Some(expires_at) => self.index.remove(&(expires_at, identity)),
			None => false,
		}
	}

	pub(crate) fn pop_expired(&mut self, now: OffsetDateTime) -> Vec<UserId> {
		let mut expired = Vec::new();

		while let Some(&(expires_at, identity)) = self.index.first() {
			if expires_at > now {
				break;
			}

			self.index.pop_first();
			self.entries.remove(&identity);
			expired.push(identity);
		}

		expired
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn table_overwrite_keeps_a_single_index_record() {
		let now = macros::datetime!(2025-11-10 12:00 UTC);
		let identity = UserId::new(7);
		let mut table = CooldownTable::default();

		table.set(identity, now + Duration::seconds(10));
		table.set(identity, now + Duration::hours(3));

		assert_eq!(table.index.len(), 1);
		assert!(table.pop_expired(now + Duration::seconds(10)).is_empty());
		assert_eq!(table.pop_expired(now + Duration::hours(3)), vec![identity]);
		assert!(table.entries.is_empty());
	}

	#[test]
	fn expired_lookup_leaves_the_index_for_the_sweeper() {
		let now = macros::datetime!(2025-11-10 12:00 UTC);
		let identity = UserId::new(8);
		let mut table = CooldownTable::default();

		table.set(identity, now + Duration::seconds(5));

		assert_eq!(table.remaining(identity, now), Duration::seconds(5));
		assert_eq!(table.remaining(identity, now + Duration::seconds(9)), Duration::ZERO);
		assert_eq!(table.index.len(), 1);
		assert_eq!(table.pop_expired(now + Duration::seconds(9)), vec![identity]);
		assert_eq!(table.remaining(identity, now), Duration::ZERO);
	}

	#[test]
	fn store_error_can_be_serialized() {
		let payload = serde_json::to_string(&StoreError::Backend { message: "down".into() })
			.expect("StoreError should serialize to JSON.");

		assert_eq!(payload, "{\"Backend\":{\"message\":\"down\"}}");
	}
}
