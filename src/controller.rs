//! Run state and configuration lifecycle
//!
//! [`SyncStateController`] is the only writer of the shared context. It owns
//! the persisted paused flag, drives the connection manager, and keeps one
//! event subscription on the current local root.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::bulk::BulkSyncCoordinator;
use crate::callbacks::{notice, NoticeLevel, SyncCallback, SyncEvent, SyncStatus};
use crate::config::{SettingKey, Settings};
use crate::connection::{ConnectionManager, StoreConnector};
use crate::context::{ConnectionState, SyncContext};
use crate::error::SyncError;
use crate::events::EventSyncController;
use crate::logging::*;
use crate::paths::PathConfig;
use crate::state::RunStateStore;
use crate::watch::WatchSource;

/// External pieces the controller is wired to
pub struct Collaborators {
	pub store: RunStateStore,
	pub connector: Arc<dyn StoreConnector>,
	pub watch_source: Arc<dyn WatchSource>,
	pub callbacks: Arc<dyn SyncCallback>,
}

struct ActiveSubscription {
	root: PathBuf,
	task: JoinHandle<()>,
}

pub struct SyncStateController {
	ctx: Arc<SyncContext>,
	workspace_root: PathBuf,
	settings: Mutex<Settings>,
	store: RunStateStore,
	connections: ConnectionManager,
	watch_source: Arc<dyn WatchSource>,
	callbacks: Arc<dyn SyncCallback>,
	subscription: Mutex<Option<ActiveSubscription>>,
	last_status: Mutex<Option<SyncStatus>>,
}

impl SyncStateController {
	pub fn new(workspace_root: impl Into<PathBuf>, settings: Settings, collaborators: Collaborators) -> Self {
		let workspace_root = workspace_root.into();
		let ctx = Arc::new(SyncContext::new(PathConfig::default()));
		let connections =
			ConnectionManager::new(ctx.clone(), collaborators.connector, collaborators.callbacks.clone());

		SyncStateController {
			ctx,
			workspace_root,
			settings: Mutex::new(settings),
			store: collaborators.store,
			connections,
			watch_source: collaborators.watch_source,
			callbacks: collaborators.callbacks,
			subscription: Mutex::new(None),
			last_status: Mutex::new(None),
		}
	}

	/// Validate settings, restore the paused flag and connect. Does not
	/// subscribe to file events.
	pub async fn initialize(&self) -> Result<ConnectionState, SyncError> {
		let settings = self.settings();
		if let Err(e) = settings.validate() {
			error!("Configuration error: {}", e);
			notice(&*self.callbacks, NoticeLevel::Error, format!("WebDAV sync not configured: {}", e));
			return Err(e.into());
		}
		self.ctx.set_paths(settings.path_config(&self.workspace_root));

		let paused = self.store.load_paused().unwrap_or_else(|e| {
			warn!("Cannot read run state, starting paused: {}", e);
			true
		});
		self.ctx.set_paused(paused);

		Ok(self.connections.connect(&settings.credentials()).await)
	}

	/// Initialize and start observing file events
	pub async fn start(&self) -> Result<SyncStatus, SyncError> {
		self.initialize().await?;
		self.rebuild_subscription()?;
		Ok(self.publish_status())
	}

	pub fn pause(&self) -> Result<(), SyncError> {
		self.store.save_paused(true)?;
		self.ctx.set_paused(true);
		info!("Sync paused");
		notice(&*self.callbacks, NoticeLevel::Info, "WebDAV sync paused");
		self.publish_status();
		Ok(())
	}

	/// Resume event dispatch. Rejected while disconnected.
	pub fn resume(&self) -> Result<(), SyncError> {
		if !self.ctx.is_connected() {
			warn!("Resume rejected: not connected");
			notice(&*self.callbacks, NoticeLevel::Error, "Cannot resume sync: not connected to WebDAV server");
			return Err(SyncError::NotConnected);
		}
		self.store.save_paused(false)?;
		self.ctx.set_paused(false);
		info!("Sync resumed");
		notice(&*self.callbacks, NoticeLevel::Info, "WebDAV sync resumed");
		self.publish_status();
		Ok(())
	}

	/// Explicit reconnect with the current credentials
	pub async fn reconnect(&self) -> ConnectionState {
		let credentials = self.settings().credentials();
		let state = self.connections.reconnect(&credentials).await;
		if state.is_connected() {
			notice(&*self.callbacks, NoticeLevel::Info, "Reconnected to WebDAV server");
		}
		self.publish_status();
		state
	}

	/// Adopt new settings. Reconnects when a connection key changed and
	/// always re-subscribes so the event stream follows the new root.
	/// Returns the keys that changed.
	pub async fn apply_settings(&self, new: Settings) -> Result<Vec<SettingKey>, SyncError> {
		let changed = self.settings().changed_keys(&new);
		if changed.is_empty() {
			return Ok(changed);
		}

		// Rejected settings are never adopted
		if let Err(e) = new.validate() {
			error!("Configuration error: {}", e);
			notice(&*self.callbacks, NoticeLevel::Error, format!("WebDAV sync not configured: {}", e));
			return Err(e.into());
		}
		*self.settings.lock().unwrap_or_else(|e| e.into_inner()) = new.clone();

		self.ctx.set_paths(new.path_config(&self.workspace_root));
		if changed.iter().any(|key| key.affects_connection()) {
			self.connections.reconnect(&new.credentials()).await;
		}
		self.rebuild_subscription()?;
		self.publish_status();
		Ok(changed)
	}

	/// Replace the event subscription with one on the current local root
	pub fn rebuild_subscription(&self) -> Result<(), SyncError> {
		let mut slot = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
		if let Some(old) = slot.take() {
			debug!("Dropping subscription on {}", old.root.display());
			old.task.abort();
		}

		let paths = self.ctx.paths();
		if paths.local_base_path.is_empty() {
			return Ok(());
		}
		let root = PathBuf::from(&paths.local_base_path);

		let subscription = self.watch_source.subscribe(&root).map_err(|e| {
			error!("{}", e);
			notice(&*self.callbacks, NoticeLevel::Error, format!("Cannot watch {}: {}", root.display(), e));
			e
		})?;
		let (events, guard) = subscription.into_parts();
		let controller = self.event_controller();
		let task = tokio::spawn(async move {
			let _guard = guard;
			controller.run(events).await;
		});

		info!("Watching {}", root.display());
		*slot = Some(ActiveSubscription { root, task });
		Ok(())
	}

	/// Emit a status change if the derived status moved
	pub fn publish_status(&self) -> SyncStatus {
		let status = self.ctx.status();
		let mut last = self.last_status.lock().unwrap_or_else(|e| e.into_inner());
		if *last != Some(status) {
			*last = Some(status);
			self.callbacks.on_event(SyncEvent::StatusChanged(status));
		}
		status
	}

	pub fn status(&self) -> SyncStatus {
		self.ctx.status()
	}

	pub fn settings(&self) -> Settings {
		self.settings.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}

	pub fn context(&self) -> Arc<SyncContext> {
		self.ctx.clone()
	}

	pub fn callbacks(&self) -> Arc<dyn SyncCallback> {
		self.callbacks.clone()
	}

	/// Root of the live subscription, if any
	pub fn watch_root(&self) -> Option<PathBuf> {
		self.subscription.lock().unwrap_or_else(|e| e.into_inner()).as_ref().map(|s| s.root.clone())
	}

	pub fn bulk(&self) -> BulkSyncCoordinator {
		BulkSyncCoordinator::new(self.ctx.clone(), self.callbacks.clone())
	}

	pub fn event_controller(&self) -> EventSyncController {
		EventSyncController::new(self.ctx.clone(), self.callbacks.clone(), self.settings().serialize_per_path)
	}

	/// Stop observing events. In-flight operations run to completion.
	pub fn shutdown(&self) {
		if let Some(old) = self.subscription.lock().unwrap_or_else(|e| e.into_inner()).take() {
			old.task.abort();
		}
	}
}

impl Drop for SyncStateController {
	fn drop(&mut self) {
		self.shutdown();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::callbacks::NoCallback;
	use crate::connection::StaticConnector;
	use crate::remote::MemoryStore;
	use crate::watch::ChannelWatchSource;
	use tempfile::TempDir;

	fn controller(dir: &TempDir) -> SyncStateController {
		let settings = Settings {
			server_host: "http://dav.test".to_string(),
			remote_path: "/dav".to_string(),
			..Settings::default()
		};
		SyncStateController::new(
			dir.path(),
			settings,
			Collaborators {
				store: RunStateStore::open(&dir.path().join("state.redb"), "/w").unwrap(),
				connector: Arc::new(StaticConnector(Arc::new(MemoryStore::new()))),
				watch_source: Arc::new(ChannelWatchSource::new()),
				callbacks: Arc::new(NoCallback),
			},
		)
	}

	#[tokio::test]
	async fn test_unsaved_flag_is_not_applied() {
		let dir = TempDir::new().unwrap();
		let controller = controller(&dir);
		assert_eq!(controller.start().await.unwrap(), SyncStatus::Paused);

		controller.store.set_read_only(true);
		assert!(matches!(controller.resume(), Err(SyncError::State(_))));
		assert!(controller.context().is_paused());
		assert!(controller.store.load_paused().unwrap());

		controller.store.set_read_only(false);
		controller.resume().unwrap();
		controller.store.set_read_only(true);
		assert!(matches!(controller.pause(), Err(SyncError::State(_))));
		assert_eq!(controller.status(), SyncStatus::Running);
		assert!(!controller.store.load_paused().unwrap());
	}
}

// vim: ts=4
