//! Remote store interface
//!
//! The sync engine talks to the remote file store only through the
//! [`RemoteStore`] trait. All paths exchanged through it use forward-slash
//! separators regardless of the local platform.

pub mod memory;
pub mod webdav;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::RemoteError;
use crate::logging::*;

pub use memory::MemoryStore;
pub use webdav::WebDavStore;

/// Result type for remote store operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Upload progress sink, called with `(transferred, total)` byte counts
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Kind of a remote entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKind {
	File,
	Directory,
}

/// Result of a remote `stat`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStat {
	pub path: String,
	pub kind: RemoteKind,
	pub size: u64,
}

/// Options for [`RemoteStore::put_file_contents`]
#[derive(Clone, Default)]
pub struct PutOptions {
	/// Replace an existing remote file
	pub overwrite: bool,

	/// Incremental progress reporting
	pub on_progress: Option<ProgressFn>,
}

impl PutOptions {
	pub fn overwrite() -> Self {
		PutOptions { overwrite: true, on_progress: None }
	}

	pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
		self.on_progress = Some(on_progress);
		self
	}

	pub(crate) fn report(&self, transferred: u64, total: u64) {
		if let Some(ref on_progress) = self.on_progress {
			on_progress(transferred, total);
		}
	}
}

impl fmt::Debug for PutOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PutOptions")
			.field("overwrite", &self.overwrite)
			.field("on_progress", &self.on_progress.is_some())
			.finish()
	}
}

/// Operations of a network file store (WebDAV-like semantics)
#[async_trait]
pub trait RemoteStore: Send + Sync {
	/// Describe the entry at `path`
	async fn stat(&self, path: &str) -> RemoteResult<RemoteStat>;

	/// Whether an entry exists at `path`
	async fn exists(&self, path: &str) -> RemoteResult<bool>;

	/// Create a collection. With `recursive`, missing ancestors are created too.
	/// Creating a collection that already exists succeeds.
	async fn create_directory(&self, path: &str, recursive: bool) -> RemoteResult<()>;

	/// Upload the full contents of a file
	async fn put_file_contents(
		&self,
		path: &str,
		data: Vec<u8>,
		options: PutOptions,
	) -> RemoteResult<()>;

	/// Remove the entry at `path`
	async fn delete_file(&self, path: &str) -> RemoteResult<()>;
}

/// Shared handle to an open remote store session
pub type StoreHandle = Arc<dyn RemoteStore>;

/// Create `dir` on the remote store unless it already exists.
///
/// The existence check and the creation are separate calls, so two callers
/// may both see the directory missing and both create it. The store's
/// directory creation tolerates that.
pub async fn ensure_directory(store: &dyn RemoteStore, dir: &str) -> RemoteResult<()> {
	let exists = store.exists(dir).await.map_err(|e| {
		warn!("Failed to check remote directory {}: {}", dir, e);
		e
	})?;
	if !exists {
		debug!("Creating remote directory {}", dir);
		store.create_directory(dir, true).await.map_err(|e| {
			warn!("Failed to create remote directory {}: {}", dir, e);
			e
		})?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_ensure_directory_twice() {
		let store = MemoryStore::new();
		ensure_directory(&store, "/dav/a/b").await.unwrap();
		ensure_directory(&store, "/dav/a/b").await.unwrap();

		assert!(store.has_directory("/dav/a/b"));
		assert_eq!(store.count_calls(|c| matches!(c, memory::RemoteCall::CreateDirectory(_))), 1);
	}

	#[tokio::test]
	async fn test_ensure_directory_propagates_failure() {
		let store = MemoryStore::new();
		store.set_offline(true);
		let result = ensure_directory(&store, "/dav/a").await;
		assert!(matches!(result, Err(RemoteError::Transport { .. })));
	}

	#[test]
	fn test_put_options_report() {
		use std::sync::atomic::{AtomicU64, Ordering};
		let seen = Arc::new(AtomicU64::new(0));
		let seen_clone = seen.clone();
		let options = PutOptions::overwrite()
			.with_progress(Arc::new(move |done, _| seen_clone.store(done, Ordering::SeqCst)));
		options.report(42, 100);
		assert_eq!(seen.load(Ordering::SeqCst), 42);
		assert!(format!("{:?}", options).contains("overwrite: true"));
	}
}

// vim: ts=4
