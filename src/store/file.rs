//! File-backed [`CooldownStore`] for bots that must survive restarts without an external
//! key-value service.
//!
//! The whole table is rewritten on every mutation. A mutation is staged on a copy and only
//! replaces the live table once the copy is on disk, so a failed write changes nothing.

// std
use std::{
	fs::{self, File},
	io::{self, ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::UserId,
	clock::{Clock, SystemClock},
	store::{CooldownStore, CooldownTable, StoreError, StoreFuture},
};

/// One persisted cooldown; `expires_at` is in unix seconds.
#[derive(Serialize, Deserialize)]
struct Row {
	identity: UserId,
	expires_at: i64,
}

/// Persists cooldown entries to a JSON file after each mutation.
#[derive(Clone)]
pub struct FileStore {
	path: PathBuf,
	table: Arc<RwLock<CooldownTable>>,
	clock: Arc<dyn Clock>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		Self::open_with_clock(path, Arc::new(SystemClock))
	}

	/// Same as [`FileStore::open`] but reads time from `clock`.
	pub fn open_with_clock(
		path: impl Into<PathBuf>,
		clock: Arc<dyn Clock>,
	) -> Result<Self, StoreError> {
		let path = path.into();

		prepare_dir(&path)?;

		let table = read_snapshot(&path)?;

		Ok(Self { path, table: Arc::new(RwLock::new(table)), clock })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Applies `stage` to a copy of the table and swaps the copy in once it is persisted.
	fn commit<R>(&self, stage: impl FnOnce(&mut CooldownTable) -> R) -> Result<R, StoreError> {
		let mut live = self.table.write();
		let mut staged = live.clone();
		let output = stage(&mut staged);

		if staged != *live {
			write_snapshot(&self.path, &staged)?;

			*live = staged;
		}

		Ok(output)
	}
}
impl Debug for FileStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FileStore").field("path", &self.path).finish()
	}
}
impl CooldownStore for FileStore {
	fn set_cooldown(&self, identity: UserId, duration: Duration) -> StoreFuture<'_, OffsetDateTime> {
		Box::pin(async move {
			let expires_at = self.clock.now() + duration;

			self.commit(|table| table.set(identity, expires_at))?;

			Ok(expires_at)
		})
	}

	fn remaining(&self, identity: UserId) -> StoreFuture<'_, Duration> {
		Box::pin(async move { Ok(self.table.read().remaining(identity, self.clock.now())) })
	}

	fn clear(&self, identity: UserId) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.commit(|table| table.clear(identity))?;

			Ok(())
		})
	}

	fn pop_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, Vec<UserId>> {
		Box::pin(async move { self.commit(|table| table.pop_expired(now)) })
	}

	fn ping(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move { prepare_dir(&self.path) })
	}
}

fn backend(action: &str, path: &Path, e: io::Error) -> StoreError {
	StoreError::Backend { message: format!("Could not {action} {}: {e}", path.display()) }
}

fn prepare_dir(path: &Path) -> Result<(), StoreError> {
	match path.parent() {
		Some(dir) if !dir.as_os_str().is_empty() =>
			fs::create_dir_all(dir).map_err(|e| backend("create directory", dir, e)),
		_ => Ok(()),
	}
}

fn read_snapshot(path: &Path) -> Result<CooldownTable, StoreError> {
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CooldownTable::default()),
		Err(e) => return Err(backend("read", path, e)),
	};

	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(CooldownTable::default());
	}

	let rows: Vec<Row> = serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
		message: format!("Snapshot {} is not a cooldown list: {e}", path.display()),
	})?;
	let entries = rows
		.into_iter()
		.map(|row| {
			OffsetDateTime::from_unix_timestamp(row.expires_at)
				.map(|expires_at| (row.identity, expires_at))
				.map_err(|e| StoreError::Serialization {
					message: format!(
						"Snapshot {} holds a bad expiry for {}: {e}",
						path.display(),
						row.identity
					),
				})
		})
		.collect::<Result<Vec<_>, _>>()?;

	Ok(CooldownTable::from_entries(entries))
}

/// Writes `table` next to `path` and renames it into place.
fn write_snapshot(path: &Path, table: &CooldownTable) -> Result<(), StoreError> {
	let mut rows: Vec<Row> = table
		.entries()
		.iter()
		.map(|(&identity, expires_at)| Row { identity, expires_at: expires_at.unix_timestamp() })
		.collect();

	rows.sort_unstable_by_key(|row| row.identity);

	let bytes = serde_json::to_vec(&rows).map_err(|e| StoreError::Serialization {
		message: format!("Could not encode cooldown snapshot: {e}"),
	})?;
	let partial = path.with_extension("partial");

	prepare_dir(path)?;

	let mut file = File::create(&partial).map_err(|e| backend("create", &partial, e))?;

	file.write_all(&bytes)
		.and_then(|()| file.sync_all())
		.map_err(|e| backend("write", &partial, e))?;
	fs::rename(&partial, path).map_err(|e| backend("replace", path, e))
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::clock::ManualClock;

	/// Scratch directory holding a `state/` subdirectory for the snapshot.
	struct Scratch(PathBuf);
	impl Scratch {
		fn new() -> Self {
			Self(env::temp_dir().join(format!(
				"ssh-account-broker-file-{}-{}",
				process::id(),
				OffsetDateTime::now_utc().unix_timestamp_nanos(),
			)))
		}

		fn state_dir(&self) -> PathBuf {
			self.0.join("state")
		}

		fn snapshot(&self) -> PathBuf {
			self.state_dir().join("cooldowns.json")
		}

		/// Puts a plain file where the state directory belongs so every write fails.
		fn block_writes(&self) {
			fs::remove_dir_all(self.state_dir()).expect("State directory should be removable.");
			fs::write(self.state_dir(), b"").expect("Blocking file should be writable.");
		}

		fn unblock_writes(&self) {
			fs::remove_file(self.state_dir()).expect("Blocking file should be removable.");
			fs::create_dir_all(self.state_dir()).expect("State directory should be recreated.");
		}
	}
	impl Drop for Scratch {
		fn drop(&mut self) {
			let _ = fs::remove_dir_all(&self.0);
		}
	}

	fn open(scratch: &Scratch) -> (FileStore, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::new(macros::datetime!(2025-11-10 12:00 UTC)));
		let store = FileStore::open_with_clock(scratch.snapshot(), clock.clone())
			.expect("File store should open in a scratch directory.");

		(store, clock)
	}

	#[tokio::test]
	async fn cooldowns_survive_reopen() {
		let scratch = Scratch::new();
		let (store, clock) = open(&scratch);
		let identity = UserId::new(1001);
		let expires_at = store
			.set_cooldown(identity, Duration::hours(3))
			.await
			.expect("Setting a cooldown should persist.");

		assert_eq!(expires_at, macros::datetime!(2025-11-10 15:00 UTC));

		drop(store);

		let reopened = FileStore::open_with_clock(scratch.snapshot(), clock.clone())
			.expect("Reopening the snapshot should succeed.");

		assert_eq!(
			reopened.remaining(identity).await.expect("Lookup should succeed."),
			Duration::hours(3)
		);

		clock.advance(Duration::hours(3));

		assert_eq!(
			reopened.pop_expired(clock.now()).await.expect("Sweep should succeed."),
			vec![identity]
		);
		assert!(
			FileStore::open_with_clock(scratch.snapshot(), clock)
				.expect("Reloading should succeed.")
				.table
				.read()
				.entries()
				.is_empty()
		);
	}

	#[tokio::test]
	async fn expired_lookup_keeps_the_entry_for_the_sweep() {
		let scratch = Scratch::new();
		let (store, clock) = open(&scratch);
		let identity = UserId::new(7);

		store.set_cooldown(identity, Duration::seconds(1)).await.expect("Set should persist.");
		clock.advance(Duration::seconds(2));

		assert_eq!(store.remaining(identity).await.expect("Lookup should succeed."), Duration::ZERO);

		let reopened = FileStore::open_with_clock(scratch.snapshot(), clock.clone())
			.expect("Reopening the snapshot should succeed.");

		assert_eq!(
			reopened.pop_expired(clock.now()).await.expect("Sweep should succeed."),
			vec![identity]
		);
	}

	#[tokio::test]
	async fn failed_pop_keeps_identities_for_the_next_sweep() {
		let scratch = Scratch::new();
		let (store, clock) = open(&scratch);
		let identity = UserId::new(9);

		store.set_cooldown(identity, Duration::seconds(1)).await.expect("Set should persist.");
		clock.advance(Duration::seconds(2));
		scratch.block_writes();

		assert!(matches!(
			store.pop_expired(clock.now()).await,
			Err(StoreError::Backend { .. })
		));

		scratch.unblock_writes();

		assert_eq!(
			store.pop_expired(clock.now()).await.expect("Sweep after recovery should succeed."),
			vec![identity]
		);
	}

	#[tokio::test]
	async fn failed_set_leaves_no_cooldown_behind() {
		let scratch = Scratch::new();
		let (store, _clock) = open(&scratch);
		let identity = UserId::new(10);

		scratch.block_writes();

		assert!(store.set_cooldown(identity, Duration::hours(3)).await.is_err());
		assert_eq!(store.remaining(identity).await.expect("Lookup should succeed."), Duration::ZERO);

		scratch.unblock_writes();
		store.set_cooldown(identity, Duration::hours(3)).await.expect("Set should persist.");

		assert_eq!(
			store.remaining(identity).await.expect("Lookup should succeed."),
			Duration::hours(3)
		);
	}

	#[test]
	fn corrupt_snapshot_is_a_serialization_error() {
		let scratch = Scratch::new();

		fs::create_dir_all(scratch.state_dir()).expect("State directory should be creatable.");
		fs::write(scratch.snapshot(), b"not json").expect("Corrupt fixture should be writable.");

		let err =
			FileStore::open(scratch.snapshot()).expect_err("Corrupt snapshots must be rejected.");

		assert!(matches!(err, StoreError::Serialization { .. }));
	}
}
