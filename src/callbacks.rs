//! Callback traits for user-facing notifications and progress reporting
//!
//! The engine never renders anything itself. It emits [`SyncEvent`]s to a
//! [`SyncCallback`]; a presentation layer (see [`crate::progress`]) decides
//! how to show them.

use std::fmt;
use std::path::PathBuf;

use crate::bulk::BatchSummary;
use crate::operation::SyncAction;

/// Severity of a one-off user notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
	Info,
	Warning,
	Error,
}

/// Persistent status indicator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
	Disconnected,
	Paused,
	Running,
}

impl fmt::Display for SyncStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncStatus::Disconnected => write!(f, "disconnected"),
			SyncStatus::Paused => write!(f, "paused"),
			SyncStatus::Running => write!(f, "running"),
		}
	}
}

/// Everything the engine reports outward
#[derive(Debug, Clone)]
pub enum SyncEvent {
	/// Transient message for the user
	Notice { level: NoticeLevel, message: String },

	/// Status indicator changed
	StatusChanged(SyncStatus),

	/// A single file operation completed
	FileSynced { local: PathBuf, remote: String, action: SyncAction },

	/// Bytes sent so far for an upload in flight
	UploadProgress { remote: String, transferred: u64, total: u64 },

	/// Bulk sync enumerated its files and is about to start
	BatchStarted { root: PathBuf, total: usize },

	/// Bulk sync finished one more file
	BatchProgress { processed: usize, total: usize },

	/// Bulk sync ended, emitted exactly once per batch
	BatchFinished(BatchSummary),
}

/// Receiver of sync events
pub trait SyncCallback: Send + Sync {
	fn on_event(&self, _event: SyncEvent) {}
}

impl<T: Fn(SyncEvent) + Send + Sync> SyncCallback for T {
	fn on_event(&self, event: SyncEvent) {
		self(event);
	}
}

/// Callback that drops every event
pub struct NoCallback;

impl SyncCallback for NoCallback {}

/// Shorthand for emitting a [`SyncEvent::Notice`]
pub fn notice(callbacks: &dyn SyncCallback, level: NoticeLevel, message: impl Into<String>) {
	callbacks.on_event(SyncEvent::Notice { level, message: message.into() });
}


// vim: ts=4
