//! Connection lifecycle for the remote store
//!
//! A connection is a client bound to a host and credentials that has passed
//! a liveness probe (a `stat` of the root). There is no automatic retry: a
//! failed connect leaves the context disconnected until the next explicit
//! reconnect or settings change.

use std::fmt;
use std::sync::Arc;

use crate::callbacks::{notice, NoticeLevel, SyncCallback};
use crate::context::SyncContext;
use crate::error::ConnectionError;
use crate::logging::*;
use crate::remote::{StoreHandle, WebDavStore};

pub use crate::context::ConnectionState;

/// Host and credentials for one remote store session
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
	pub server_host: String,
	pub username: String,
	pub password: String,
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("server_host", &self.server_host)
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Builds a store client for a set of credentials
pub trait StoreConnector: Send + Sync {
	fn open(&self, credentials: &Credentials) -> Result<StoreHandle, ConnectionError>;
}

/// Connector producing [`WebDavStore`] clients
#[derive(Debug, Default)]
pub struct WebDavConnector;

impl StoreConnector for WebDavConnector {
	fn open(&self, credentials: &Credentials) -> Result<StoreHandle, ConnectionError> {
		let store = WebDavStore::new(
			&credentials.server_host,
			&credentials.username,
			&credentials.password,
		)?;
		Ok(Arc::new(store))
	}
}

/// Connector that always hands out the same store
pub struct StaticConnector(pub StoreHandle);

impl StoreConnector for StaticConnector {
	fn open(&self, _credentials: &Credentials) -> Result<StoreHandle, ConnectionError> {
		Ok(self.0.clone())
	}
}

/// Owns connect/reconnect and publishes the result into the context
pub struct ConnectionManager {
	ctx: Arc<SyncContext>,
	connector: Arc<dyn StoreConnector>,
	callbacks: Arc<dyn SyncCallback>,
}

impl ConnectionManager {
	pub fn new(
		ctx: Arc<SyncContext>,
		connector: Arc<dyn StoreConnector>,
		callbacks: Arc<dyn SyncCallback>,
	) -> Self {
		ConnectionManager { ctx, connector, callbacks }
	}

	pub fn state(&self) -> ConnectionState {
		self.ctx.connection()
	}

	/// Build a client and probe it. Never fails outward: a failure is
	/// reported to the user and leaves the context disconnected.
	pub async fn connect(&self, credentials: &Credentials) -> ConnectionState {
		match self.probe(credentials).await {
			Ok(handle) => {
				info!("Connected to {}", credentials.server_host);
				let state = ConnectionState::Connected(handle);
				self.ctx.set_connection(state.clone());
				state
			}
			Err(e) => {
				error!("Connection failed: {}", e);
				notice(&*self.callbacks, NoticeLevel::Error, format!("WebDAV connection failed: {}", e));
				self.ctx.set_connection(ConnectionState::Disconnected);
				ConnectionState::Disconnected
			}
		}
	}

	/// Drop the current connection and connect again.
	///
	/// Operations still holding the old handle keep it; if the old session
	/// is no longer usable their next call fails like any other remote error.
	pub async fn reconnect(&self, credentials: &Credentials) -> ConnectionState {
		let previous = self.ctx.set_connection(ConnectionState::Disconnected);
		debug!("Reconnecting (was {:?})", previous);
		self.connect(credentials).await
	}

	/// Construct a client and run the liveness probe
	pub async fn probe(&self, credentials: &Credentials) -> Result<StoreHandle, ConnectionError> {
		if credentials.server_host.trim().is_empty() {
			return Err(ConnectionError::MissingHost);
		}
		let handle = self.connector.open(credentials)?;
		handle.stat("/").await.map_err(|source| ConnectionError::ProbeFailed {
			host: credentials.server_host.clone(),
			source,
		})?;
		Ok(handle)
	}
}


// vim: ts=4
