//! Bulk synchronization of a local subtree
//!
//! Two passes: the tree is enumerated completely (hidden entries pruned)
//! so the total is known, then each file is uploaded in enumeration order.
//! Cancellation and loss of connection are checked before every file and
//! stop the batch at a file boundary, never mid-upload.

use futures::StreamExt;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::callbacks::{notice, NoticeLevel, SyncCallback, SyncEvent};
use crate::context::SyncContext;
use crate::error::{ConfigError, SyncError};
use crate::logging::*;
use crate::operation::{SyncAction, SyncOperation};
use crate::paths::PathConfig;
use crate::walk::walk;

/// Why a batch ended before its last file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
	Cancelled,
	Disconnected,
}

/// Outcome of one bulk run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
	pub root: PathBuf,
	/// Files uploaded successfully
	pub processed: usize,
	/// Files attempted whose upload failed
	pub failed: usize,
	/// Files found by enumeration
	pub total: usize,
	pub stopped: Option<StopReason>,
}

impl BatchSummary {
	fn empty(root: &Path) -> Self {
		BatchSummary { root: root.to_path_buf(), processed: 0, failed: 0, total: 0, stopped: None }
	}

	pub fn is_complete(&self) -> bool {
		self.stopped.is_none()
	}
}

impl fmt::Display for BatchSummary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Synced {} of {} files", self.processed, self.total)?;
		if self.failed > 0 {
			write!(f, " ({} failed)", self.failed)?;
		}
		match self.stopped {
			Some(StopReason::Cancelled) => write!(f, ", cancelled"),
			Some(StopReason::Disconnected) => write!(f, ", connection lost"),
			None => Ok(()),
		}
	}
}

pub struct BulkSyncCoordinator {
	ctx: Arc<SyncContext>,
	callbacks: Arc<dyn SyncCallback>,
}

impl BulkSyncCoordinator {
	pub fn new(ctx: Arc<SyncContext>, callbacks: Arc<dyn SyncCallback>) -> Self {
		BulkSyncCoordinator { ctx, callbacks }
	}

	/// Sync the whole local root
	pub async fn sync_all(&self, cancel: &CancellationToken) -> Result<BatchSummary, SyncError> {
		let root = PathBuf::from(&self.ctx.paths().local_base_path);
		self.sync_subtree(&root, cancel).await
	}

	/// First pass: every non-hidden file under `root`. Unreadable directories
	/// are logged and skipped.
	pub async fn collect_files(&self, root: &Path, config: Arc<PathConfig>) -> Vec<PathBuf> {
		let mut files = Vec::new();
		let mut entries = std::pin::pin!(walk(root, move |entry| !config.is_hidden(&entry.path)));
		while let Some(item) = entries.next().await {
			match item {
				Ok(entry) if entry.is_file() => files.push(entry.path),
				Ok(_) => {}
				Err(e) => warn!("Skipping unreadable entry: {}", e),
			}
		}
		files
	}

	/// Sync everything under `root` (a directory or a single file).
	///
	/// Per-file failures are counted, never returned. An `Err` means the
	/// batch could not start at all.
	pub async fn sync_subtree(&self, root: &Path, cancel: &CancellationToken) -> Result<BatchSummary, SyncError> {
		let handle = self.ctx.handle().ok_or_else(|| {
			notice(&*self.callbacks, NoticeLevel::Error, "Not connected to WebDAV server");
			SyncError::NotConnected
		})?;
		let config = self.ctx.paths();
		if !config.is_complete() {
			return Err(ConfigError::Missing {
				key: if config.local_base_path.is_empty() { "localPath" } else { "remotePath" },
			}
			.into());
		}

		if config.is_hidden(root) {
			warn!("Not syncing hidden path {}", root.display());
			return Ok(self.finish(BatchSummary::empty(root)));
		}

		let metadata = tokio::fs::metadata(root)
			.await
			.map_err(|e| SyncError::Io { path: root.to_path_buf(), source: e })?;
		if !metadata.is_dir() {
			let operation = SyncOperation::new(handle, config, self.callbacks.clone());
			let outcome = operation.execute(root, SyncAction::Modify, true).await;
			let success = outcome.is_success();
			return Ok(self.finish(BatchSummary {
				processed: usize::from(success),
				failed: usize::from(!success),
				total: 1,
				..BatchSummary::empty(root)
			}));
		}

		let files = self.collect_files(root, config.clone()).await;
		let total = files.len();
		info!("Syncing {} files under {}", total, root.display());
		self.callbacks.on_event(SyncEvent::BatchStarted { root: root.to_path_buf(), total });

		let mut summary = BatchSummary { total, ..BatchSummary::empty(root) };
		for file in &files {
			if cancel.is_cancelled() {
				summary.stopped = Some(StopReason::Cancelled);
				break;
			}
			// The handle may have been swapped or dropped by a reconnect
			let Some(handle) = self.ctx.handle() else {
				summary.stopped = Some(StopReason::Disconnected);
				break;
			};

			let operation = SyncOperation::new(handle, self.ctx.paths(), self.callbacks.clone());
			if operation.execute(file, SyncAction::Modify, false).await.is_success() {
				summary.processed += 1;
				self.callbacks.on_event(SyncEvent::BatchProgress { processed: summary.processed, total });
			} else {
				summary.failed += 1;
			}
		}

		Ok(self.finish(summary))
	}

	/// Terminal report, once per batch
	fn finish(&self, summary: BatchSummary) -> BatchSummary {
		match summary.stopped {
			Some(reason) => warn!("Batch under {} stopped early ({:?}): {}", summary.root.display(), reason, summary),
			None => info!("{}", summary),
		}
		notice(&*self.callbacks, NoticeLevel::Info, summary.to_string());
		self.callbacks.on_event(SyncEvent::BatchFinished(summary.clone()));
		summary
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_summary_display() {
		let mut summary =
			BatchSummary { root: PathBuf::from("/w"), processed: 3, failed: 1, total: 5, stopped: None };
		assert_eq!(summary.to_string(), "Synced 3 of 5 files (1 failed)");
		summary.stopped = Some(StopReason::Cancelled);
		assert_eq!(summary.to_string(), "Synced 3 of 5 files (1 failed), cancelled");
		assert!(!summary.is_complete());
	}
}

// vim: ts=4
