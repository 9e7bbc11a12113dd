//! Event-driven synchronization
//!
//! Each file-system notification is gated on hidden path, pause flag,
//! connection and configuration, then dispatched as an independent
//! [`SyncOperation`]. Dispatches are unordered relative to each other unless
//! per-path serialization is enabled.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::callbacks::SyncCallback;
use crate::context::SyncContext;
use crate::logging::*;
use crate::operation::{OperationOutcome, PathQueue, SyncAction, SyncOperation};
use crate::paths::PathConfig;
use crate::remote::StoreHandle;

/// Kind of local change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
	Created,
	Changed,
	Deleted,
}

impl FsEventKind {
	pub fn action(self) -> SyncAction {
		match self {
			FsEventKind::Created => SyncAction::Create,
			FsEventKind::Changed => SyncAction::Modify,
			FsEventKind::Deleted => SyncAction::Delete,
		}
	}
}

/// A local change notification with its resolved absolute path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
	pub kind: FsEventKind,
	pub path: PathBuf,
}

impl FsEvent {
	pub fn new(kind: FsEventKind, path: impl Into<PathBuf>) -> Self {
		FsEvent { kind, path: path.into() }
	}
}

/// Why an event was not dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
	Hidden,
	Paused,
	Disconnected,
	Unconfigured,
}

impl fmt::Display for Skip {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Skip::Hidden => write!(f, "hidden path"),
			Skip::Paused => write!(f, "sync paused"),
			Skip::Disconnected => write!(f, "not connected"),
			Skip::Unconfigured => write!(f, "paths not configured"),
		}
	}
}

#[derive(Clone)]
pub struct EventSyncController {
	ctx: Arc<SyncContext>,
	callbacks: Arc<dyn SyncCallback>,
	queue: Option<Arc<PathQueue>>,
}

impl EventSyncController {
	pub fn new(ctx: Arc<SyncContext>, callbacks: Arc<dyn SyncCallback>, serialize_per_path: bool) -> Self {
		let queue = serialize_per_path.then(|| Arc::new(PathQueue::new()));
		EventSyncController { ctx, callbacks, queue }
	}

	/// Decide whether an event on `path` may run, reading the latest state
	pub fn gate(&self, path: &std::path::Path) -> Result<(Arc<PathConfig>, StoreHandle), Skip> {
		let config = self.ctx.paths();
		if config.is_hidden(path) {
			return Err(Skip::Hidden);
		}
		if self.ctx.is_paused() {
			return Err(Skip::Paused);
		}
		let handle = self.ctx.handle().ok_or(Skip::Disconnected)?;
		if !config.is_complete() {
			return Err(Skip::Unconfigured);
		}
		Ok((config, handle))
	}

	/// Dispatch one notification. Returns the spawned operation, or `None`
	/// when the event was gated off.
	pub fn handle_event(&self, event: FsEvent) -> Option<JoinHandle<OperationOutcome>> {
		let (config, handle) = match self.gate(&event.path) {
			Ok(ready) => ready,
			Err(reason) => {
				debug!("Ignoring {:?} on {}: {}", event.kind, event.path.display(), reason);
				return None;
			}
		};

		let action = event.kind.action();
		let operation = SyncOperation::new(handle, config.clone(), self.callbacks.clone());
		let queue = self.queue.clone();

		Some(tokio::spawn(async move {
			match queue {
				Some(queue) => {
					let key = config.remote_path(&event.path);
					queue.run(&key, operation.execute(&event.path, action, true)).await
				}
				None => operation.execute(&event.path, action, true).await,
			}
		}))
	}

	/// Consume notifications until the channel closes
	pub async fn run(self, mut events: UnboundedReceiver<FsEvent>) {
		while let Some(event) = events.recv().await {
			// Fire and forget: completion order is up to the network
			let _ = self.handle_event(event);
		}
		debug!("Event stream closed");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::callbacks::NoCallback;
	use crate::context::ConnectionState;
	use crate::remote::MemoryStore;

	fn controller() -> (Arc<SyncContext>, EventSyncController) {
		let ctx = Arc::new(SyncContext::new(PathConfig::new("/w", "/dav")));
		let controller = EventSyncController::new(ctx.clone(), Arc::new(NoCallback), false);
		(ctx, controller)
	}

	#[test]
	fn test_gate_order() {
		let (ctx, controller) = controller();
		assert_eq!(controller.gate(std::path::Path::new("/w/.git/x")).err(), Some(Skip::Hidden));
		assert_eq!(controller.gate(std::path::Path::new("/w/a")).err(), Some(Skip::Paused));

		ctx.set_paused(false);
		assert_eq!(controller.gate(std::path::Path::new("/w/a")).err(), Some(Skip::Disconnected));

		ctx.set_connection(ConnectionState::Connected(Arc::new(MemoryStore::new())));
		assert!(controller.gate(std::path::Path::new("/w/a")).is_ok());

		ctx.set_paths(PathConfig::new("/w", ""));
		assert_eq!(controller.gate(std::path::Path::new("/w/a")).err(), Some(Skip::Unconfigured));
	}

	#[test]
	fn test_event_kind_actions() {
		assert_eq!(FsEventKind::Created.action(), SyncAction::Create);
		assert_eq!(FsEventKind::Changed.action(), SyncAction::Modify);
		assert_eq!(FsEventKind::Deleted.action(), SyncAction::Delete);
	}
}

// vim: ts=4
