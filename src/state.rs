//! Persisted per-workspace run state
//!
//! The paused/running flag survives restarts in a redb database. Keys are
//! prefixed with the canonical workspace root, so several workspaces can
//! share one state directory.

use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::StateError;
use crate::logging::*;

/// Key: `<workspace root>::<name>`
/// Value: JSON encoded value (bytes)
const WORKSPACE_STATE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("workspace_state");

/// Fixed key of the paused flag
pub const PAUSED_KEY: &str = "davsync.paused";

pub const STATE_DB_NAME: &str = "state.redb";

pub struct RunStateStore {
	db: redb::Database,
	db_path: PathBuf,
	scope: String,
	#[cfg(test)]
	read_only: std::sync::atomic::AtomicBool,
}

impl RunStateStore {
	/// Open or create the database at `db_path`, scoped to `scope`
	pub fn open(db_path: &Path, scope: &str) -> Result<Self, StateError> {
		let open_err = |e: redb::Error| StateError::OpenFailed { path: db_path.to_path_buf(), source: Box::new(e) };

		let db = redb::Database::create(db_path).map_err(|e| open_err(e.into()))?;
		{
			let write_txn = db.begin_write().map_err(|e| open_err(e.into()))?;
			let _ = write_txn.open_table(WORKSPACE_STATE_TABLE).map_err(|e| open_err(e.into()))?;
			write_txn.commit().map_err(|e| open_err(e.into()))?;
		}
		debug!("Opened state database {} for {}", db_path.display(), scope);

		Ok(RunStateStore {
			db,
			db_path: db_path.to_path_buf(),
			scope: scope.to_string(),
			#[cfg(test)]
			read_only: Default::default(),
		})
	}

	/// Open `<state_dir>/state.redb` scoped to `workspace_root`, creating the
	/// directory when needed
	pub fn open_in(state_dir: &Path, workspace_root: &Path) -> Result<Self, StateError> {
		std::fs::create_dir_all(state_dir)
			.map_err(|e| StateError::OpenFailed { path: state_dir.to_path_buf(), source: Box::new(e) })?;
		let scope = workspace_root
			.canonicalize()
			.unwrap_or_else(|_| workspace_root.to_path_buf())
			.to_string_lossy()
			.into_owned();
		Self::open(&state_dir.join(STATE_DB_NAME), &scope)
	}

	pub fn db_path(&self) -> &Path {
		&self.db_path
	}

	pub fn scope(&self) -> &str {
		&self.scope
	}

	fn scoped_key(&self, name: &str) -> String {
		format!("{}::{}", self.scope, name)
	}

	pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StateError> {
		let key = self.scoped_key(name);
		let load_err = |e: redb::Error| StateError::LoadFailed { source: Box::new(e) };

		let read_txn = self.db.begin_read().map_err(|e| load_err(e.into()))?;
		let table = read_txn.open_table(WORKSPACE_STATE_TABLE).map_err(|e| load_err(e.into()))?;

		match table.get(key.as_str()).map_err(|e| load_err(e.into()))? {
			Some(entry) => {
				let value = serde_json::from_slice(entry.value()).map_err(|e| StateError::Corrupted {
					message: format!("cannot decode '{}': {}", key, e),
				})?;
				Ok(Some(value))
			}
			None => Ok(None),
		}
	}

	pub fn set<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StateError> {
		let key = self.scoped_key(name);
		let save_err = |e: redb::Error| StateError::SaveFailed { source: Box::new(e) };
		let bytes = serde_json::to_vec(value).map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;
		#[cfg(test)]
		if self.read_only.load(std::sync::atomic::Ordering::SeqCst) {
			return Err(StateError::SaveFailed { source: "database is read-only".into() });
		}

		let write_txn = self.db.begin_write().map_err(|e| save_err(e.into()))?;
		{
			let mut table = write_txn.open_table(WORKSPACE_STATE_TABLE).map_err(|e| save_err(e.into()))?;
			table.insert(key.as_str(), bytes.as_slice()).map_err(|e| save_err(e.into()))?;
		}
		write_txn.commit().map_err(|e| save_err(e.into()))?;
		Ok(())
	}

	/// Stored paused flag; paused when nothing was stored yet
	pub fn load_paused(&self) -> Result<bool, StateError> {
		Ok(self.get::<bool>(PAUSED_KEY)?.unwrap_or(true))
	}

	pub fn save_paused(&self, paused: bool) -> Result<(), StateError> {
		self.set(PAUSED_KEY, &paused)
	}

	/// Make every write fail
	#[cfg(test)]
	pub(crate) fn set_read_only(&self, read_only: bool) {
		self.read_only.store(read_only, std::sync::atomic::Ordering::SeqCst);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_first_run_is_paused() {
		let dir = TempDir::new().unwrap();
		let store = RunStateStore::open(&dir.path().join("s.redb"), "/w").unwrap();
		assert!(store.load_paused().unwrap());
	}

	#[test]
	fn test_paused_survives_reopen() {
		let dir = TempDir::new().unwrap();
		let db = dir.path().join("s.redb");
		{
			let store = RunStateStore::open(&db, "/w").unwrap();
			store.save_paused(false).unwrap();
		}
		let store = RunStateStore::open(&db, "/w").unwrap();
		assert!(!store.load_paused().unwrap());
	}

	#[test]
	fn test_scopes_are_independent() {
		let dir = TempDir::new().unwrap();
		let db = dir.path().join("s.redb");
		{
			let a = RunStateStore::open(&db, "/a").unwrap();
			a.save_paused(false).unwrap();
		}
		let b = RunStateStore::open(&db, "/b").unwrap();
		assert!(b.load_paused().unwrap());
	}

	#[test]
	fn test_corrupted_value() {
		let dir = TempDir::new().unwrap();
		let store = RunStateStore::open(&dir.path().join("s.redb"), "/w").unwrap();
		store.set("davsync.paused", &"not a bool").unwrap();
		assert!(matches!(store.load_paused(), Err(StateError::Corrupted { .. })));
	}

	#[test]
	fn test_open_in_creates_dir() {
		let dir = TempDir::new().unwrap();
		let state_dir = dir.path().join("nested/state");
		let store = RunStateStore::open_in(&state_dir, dir.path()).unwrap();
		assert!(store.db_path().ends_with(STATE_DB_NAME));
		assert!(state_dir.exists());
	}
}

// vim: ts=4
