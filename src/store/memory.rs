//! Thread-safe in-memory [`CooldownStore`] implementation for single-process deployments
//! and tests.

// self
use crate::{
	_prelude::*,
	auth::UserId,
	clock::{Clock, SystemClock},
	store::{CooldownStore, CooldownTable, StoreFuture},
};

type StoreMap = Arc<RwLock<CooldownTable>>;

/// Thread-safe storage backend that keeps cooldowns in-process.
#[derive(Clone)]
pub struct MemoryStore {
	table: StoreMap,
	clock: Arc<dyn Clock>,
}
impl MemoryStore {
	/// Creates an empty store that reads time from `clock`.
	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		Self { table: Default::default(), clock }
	}

	/// Returns the number of identities currently holding a cooldown entry.
	pub fn len(&self) -> usize {
		self.table.read().entries().len()
	}

	/// Returns `true` when no cooldown entries are stored.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns the stored expiry for `identity` without lazily expiring it.
	pub fn expires_at(&self, identity: UserId) -> Option<OffsetDateTime> {
		self.table.read().entries().get(&identity).copied()
	}
}
impl Default for MemoryStore {
	fn default() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}
}
impl Debug for MemoryStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryStore").field("entries", &self.len()).finish()
	}
}
impl CooldownStore for MemoryStore {
	fn set_cooldown(&self, identity: UserId, duration: Duration) -> StoreFuture<'_, OffsetDateTime> {
		let table = self.table.clone();
		let expires_at = self.clock.now() + duration;

		Box::pin(async move {
			table.write().set(identity, expires_at);

			Ok(expires_at)
		})
	}

	fn remaining(&self, identity: UserId) -> StoreFuture<'_, Duration> {
		let table = self.table.clone();
		let now = self.clock.now();

		Box::pin(async move { Ok(table.read().remaining(identity, now)) })
	}

	fn clear(&self, identity: UserId) -> StoreFuture<'_, ()> {
		let table = self.table.clone();

		Box::pin(async move {
			table.write().clear(identity);

			Ok(())
		})
	}

	fn pop_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, Vec<UserId>> {
		let table = self.table.clone();

		Box::pin(async move { Ok(table.write().pop_expired(now)) })
	}

	fn ping(&self) -> StoreFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}
}
