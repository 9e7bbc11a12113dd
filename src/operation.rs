//! Single-file sync operation
//!
//! A [`SyncOperation`] realizes one local create/modify/delete against the
//! remote store. Failures never escape it: they are logged, optionally shown
//! to the user, and returned as [`OperationOutcome::Failed`], so one file's
//! failure cannot abort its siblings in a batch.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::callbacks::{notice, NoticeLevel, SyncCallback, SyncEvent};
use crate::error::SyncError;
use crate::logging::*;
use crate::paths::{remote_parent, PathConfig};
use crate::remote::{ensure_directory, PutOptions, StoreHandle};

/// Local change to mirror. A rename arrives as Delete + Create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
	Create,
	Modify,
	Delete,
}

impl fmt::Display for SyncAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncAction::Create => write!(f, "create"),
			SyncAction::Modify => write!(f, "modify"),
			SyncAction::Delete => write!(f, "delete"),
		}
	}
}

/// What an operation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
	Uploaded { remote: String, bytes: u64 },
	DirectoryEnsured { remote: String },
	Deleted { remote: String },
	Failed { remote: String, message: String },
}

impl OperationOutcome {
	pub fn is_success(&self) -> bool {
		!matches!(self, OperationOutcome::Failed { .. })
	}

	pub fn remote_path(&self) -> &str {
		match self {
			OperationOutcome::Uploaded { remote, .. }
			| OperationOutcome::DirectoryEnsured { remote }
			| OperationOutcome::Deleted { remote }
			| OperationOutcome::Failed { remote, .. } => remote,
		}
	}
}

pub struct SyncOperation {
	handle: StoreHandle,
	config: Arc<PathConfig>,
	callbacks: Arc<dyn SyncCallback>,
}

impl SyncOperation {
	pub fn new(handle: StoreHandle, config: Arc<PathConfig>, callbacks: Arc<dyn SyncCallback>) -> Self {
		SyncOperation { handle, config, callbacks }
	}

	/// Apply `action` for `local_path`. With `notify`, the result is also
	/// shown to the user; otherwise it only reaches the log.
	pub async fn execute(&self, local_path: &Path, action: SyncAction, notify: bool) -> OperationOutcome {
		let remote = self.config.remote_path(local_path);
		let relative = local_path
			.strip_prefix(&self.config.local_base_path)
			.unwrap_or(local_path)
			.display()
			.to_string();

		info!("Syncing {} -> {} ({})", local_path.display(), remote, action);

		match self.run(local_path, &remote, action).await {
			Ok(outcome) => {
				if notify {
					let message = match action {
						SyncAction::Delete => format!("File deleted: {}", relative),
						_ => format!("File synced: {}", relative),
					};
					notice(&*self.callbacks, NoticeLevel::Info, message);
				}
				self.callbacks.on_event(SyncEvent::FileSynced {
					local: local_path.to_path_buf(),
					remote,
					action,
				});
				outcome
			}
			Err(e) => {
				error!("Sync failed for {}: {}", local_path.display(), e);
				if notify {
					notice(&*self.callbacks, NoticeLevel::Error, format!("Sync failed: {}", e));
				}
				OperationOutcome::Failed { remote, message: e.to_string() }
			}
		}
	}

	async fn run(&self, local_path: &Path, remote: &str, action: SyncAction) -> Result<OperationOutcome, SyncError> {
		match action {
			SyncAction::Create | SyncAction::Modify => {
				let metadata = tokio::fs::metadata(local_path)
					.await
					.map_err(|e| SyncError::Io { path: local_path.to_path_buf(), source: e })?;
				if metadata.is_dir() {
					ensure_directory(&*self.handle, remote).await?;
					return Ok(OperationOutcome::DirectoryEnsured { remote: remote.to_string() });
				}

				ensure_directory(&*self.handle, &remote_parent(remote)).await?;

				let data = tokio::fs::read(local_path)
					.await
					.map_err(|e| SyncError::Io { path: local_path.to_path_buf(), source: e })?;
				let bytes = data.len() as u64;

				let callbacks = self.callbacks.clone();
				let target = remote.to_string();
				let options = PutOptions::overwrite().with_progress(Arc::new(move |transferred, total| {
					debug!("Upload progress {}: {}/{}", target, transferred, total);
					callbacks.on_event(SyncEvent::UploadProgress {
						remote: target.clone(),
						transferred,
						total,
					});
				}));

				self.handle.put_file_contents(remote, data, options).await?;
				Ok(OperationOutcome::Uploaded { remote: remote.to_string(), bytes })
			}
			SyncAction::Delete => {
				self.handle.delete_file(remote).await?;
				Ok(OperationOutcome::Deleted { remote: remote.to_string() })
			}
		}
	}
}

/// Per-remote-path single-flight queue.
///
/// Work submitted for the same key runs one at a time, in the order the
/// waiters reached the lock. Different keys never wait on each other.
#[derive(Default)]
pub struct PathQueue {
	slots: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PathQueue {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of keys with work queued or in flight
	pub fn active_keys(&self) -> usize {
		self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
	}

	pub async fn run<F, T>(&self, key: &str, work: F) -> T
	where
		F: Future<Output = T>,
	{
		let slot = {
			let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
			slots.entry(key.to_string()).or_default().clone()
		};

		// Released on completion and on cancellation alike
		let release = SlotRelease { queue: self, key, slot };
		let _guard = release.slot.lock().await;
		work.await
	}
}

struct SlotRelease<'a> {
	queue: &'a PathQueue,
	key: &'a str,
	slot: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for SlotRelease<'_> {
	fn drop(&mut self) {
		let mut slots = self.queue.slots.lock().unwrap_or_else(|e| e.into_inner());
		// Map entry plus ours: nobody else is waiting
		if Arc::strong_count(&self.slot) == 2 {
			slots.remove(self.key);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::callbacks::NoCallback;
	use crate::remote::memory::RemoteCall;
	use crate::remote::MemoryStore;
	use tempfile::TempDir;

	fn operation(store: Arc<MemoryStore>, root: &Path) -> SyncOperation {
		let config = PathConfig::new(root.to_string_lossy(), "/dav/sync");
		SyncOperation::new(store, Arc::new(config), Arc::new(NoCallback))
	}

	#[tokio::test]
	async fn test_upload_creates_parent() {
		let dir = TempDir::new().unwrap();
		std::fs::create_dir_all(dir.path().join("src")).unwrap();
		std::fs::write(dir.path().join("src/a.txt"), b"hello").unwrap();

		let store = Arc::new(MemoryStore::new());
		let outcome =
			operation(store.clone(), dir.path()).execute(&dir.path().join("src/a.txt"), SyncAction::Create, false).await;

		assert_eq!(outcome, OperationOutcome::Uploaded { remote: "/dav/sync/src/a.txt".to_string(), bytes: 5 });
		assert!(store.has_directory("/dav/sync/src"));
		assert_eq!(store.file("/dav/sync/src/a.txt"), Some(b"hello".to_vec()));
	}

	#[tokio::test]
	async fn test_modify_overwrites() {
		let dir = TempDir::new().unwrap();
		let file = dir.path().join("a.txt");
		std::fs::write(&file, b"one").unwrap();
		let store = Arc::new(MemoryStore::new());
		let op = operation(store.clone(), dir.path());

		op.execute(&file, SyncAction::Create, false).await;
		std::fs::write(&file, b"two").unwrap();
		assert!(op.execute(&file, SyncAction::Modify, false).await.is_success());
		assert_eq!(store.file("/dav/sync/a.txt"), Some(b"two".to_vec()));
	}

	#[tokio::test]
	async fn test_directory_is_ensured_not_read() {
		let dir = TempDir::new().unwrap();
		std::fs::create_dir(dir.path().join("docs")).unwrap();
		let store = Arc::new(MemoryStore::new());

		let outcome = operation(store.clone(), dir.path()).execute(&dir.path().join("docs"), SyncAction::Create, false).await;
		assert_eq!(outcome, OperationOutcome::DirectoryEnsured { remote: "/dav/sync/docs".to_string() });
		assert!(store.has_directory("/dav/sync/docs"));
		assert_eq!(store.count_calls(|c| matches!(c, RemoteCall::Put(_))), 0);
	}

	#[tokio::test]
	async fn test_delete_missing_remote_is_failure() {
		let dir = TempDir::new().unwrap();
		let store = Arc::new(MemoryStore::new());
		let outcome = operation(store, dir.path()).execute(&dir.path().join("gone.txt"), SyncAction::Delete, true).await;
		assert!(!outcome.is_success());
		assert_eq!(outcome.remote_path(), "/dav/sync/gone.txt");
	}

	#[tokio::test]
	async fn test_missing_local_file_is_failure() {
		let dir = TempDir::new().unwrap();
		let store = Arc::new(MemoryStore::new());
		let outcome = operation(store.clone(), dir.path()).execute(&dir.path().join("nope.txt"), SyncAction::Modify, false).await;
		assert!(matches!(outcome, OperationOutcome::Failed { .. }));
		assert_eq!(store.count_calls(|c| matches!(c, RemoteCall::Put(_))), 0);
	}

	#[tokio::test]
	async fn test_path_queue_releases_keys() {
		let queue = PathQueue::new();
		let value = queue.run("/a", async { 7 }).await;
		assert_eq!(value, 7);
		assert_eq!(queue.active_keys(), 0);
	}

	#[tokio::test]
	async fn test_path_queue_releases_aborted_work() {
		let queue = Arc::new(PathQueue::new());
		let spawn_stuck = |queue: Arc<PathQueue>| {
			tokio::spawn(async move { queue.run("/a", std::future::pending::<()>()).await })
		};

		let running = spawn_stuck(queue.clone());
		tokio::task::yield_now().await;
		let waiting = spawn_stuck(queue.clone());
		tokio::task::yield_now().await;
		assert_eq!(queue.active_keys(), 1);

		waiting.abort();
		assert!(waiting.await.unwrap_err().is_cancelled());
		assert_eq!(queue.active_keys(), 1);

		running.abort();
		assert!(running.await.unwrap_err().is_cancelled());
		assert_eq!(queue.active_keys(), 0);
		assert_eq!(queue.run("/a", async { 1 }).await, 1);
	}
}

// vim: ts=4
