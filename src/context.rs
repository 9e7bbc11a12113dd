//! Shared sync context
//!
//! One `SyncContext` holds the process-wide mutable state: path roots,
//! connection and run flag. Every component reads it through an `Arc`; only
//! the state controller and the connection manager write to it. Reads always
//! see the latest value.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::callbacks::SyncStatus;
use crate::paths::PathConfig;
use crate::remote::StoreHandle;

/// Connection to the remote store
#[derive(Clone, Default)]
pub enum ConnectionState {
	#[default]
	Disconnected,
	Connected(StoreHandle),
}

impl ConnectionState {
	pub fn is_connected(&self) -> bool {
		matches!(self, ConnectionState::Connected(_))
	}

	pub fn handle(&self) -> Option<StoreHandle> {
		match self {
			ConnectionState::Connected(handle) => Some(handle.clone()),
			ConnectionState::Disconnected => None,
		}
	}
}

impl fmt::Debug for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConnectionState::Disconnected => write!(f, "Disconnected"),
			ConnectionState::Connected(_) => write!(f, "Connected"),
		}
	}
}

pub struct SyncContext {
	paths: RwLock<Arc<PathConfig>>,
	connection: RwLock<ConnectionState>,
	paused: AtomicBool,
}

impl SyncContext {
	/// New context: disconnected and paused
	pub fn new(paths: PathConfig) -> Self {
		SyncContext {
			paths: RwLock::new(Arc::new(paths)),
			connection: RwLock::new(ConnectionState::Disconnected),
			paused: AtomicBool::new(true),
		}
	}

	pub fn paths(&self) -> Arc<PathConfig> {
		self.paths.read().unwrap_or_else(|e| e.into_inner()).clone()
	}

	pub(crate) fn set_paths(&self, paths: PathConfig) {
		*self.paths.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(paths);
	}

	pub fn connection(&self) -> ConnectionState {
		self.connection.read().unwrap_or_else(|e| e.into_inner()).clone()
	}

	pub fn handle(&self) -> Option<StoreHandle> {
		self.connection().handle()
	}

	pub fn is_connected(&self) -> bool {
		self.connection.read().unwrap_or_else(|e| e.into_inner()).is_connected()
	}

	/// Swap in a new connection state, returning the previous one
	pub(crate) fn set_connection(&self, state: ConnectionState) -> ConnectionState {
		let mut guard = self.connection.write().unwrap_or_else(|e| e.into_inner());
		std::mem::replace(&mut *guard, state)
	}

	pub fn is_paused(&self) -> bool {
		self.paused.load(Ordering::SeqCst)
	}

	pub(crate) fn set_paused(&self, paused: bool) {
		self.paused.store(paused, Ordering::SeqCst);
	}

	/// Status indicator value derived from connection and run flag
	pub fn status(&self) -> SyncStatus {
		if !self.is_connected() {
			SyncStatus::Disconnected
		} else if self.is_paused() {
			SyncStatus::Paused
		} else {
			SyncStatus::Running
		}
	}
}

impl fmt::Debug for SyncContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SyncContext")
			.field("paths", &self.paths())
			.field("connection", &self.connection())
			.field("paused", &self.is_paused())
			.finish()
	}
}


// vim: ts=4
