//! # davsync - Mirror a local directory tree to a WebDAV server
//!
//! Local create/modify/delete events are replayed against a remote store
//! under a configured remote root, gated by a persisted pause flag and the
//! connection state. Bulk sync uploads a whole subtree with progress and
//! cooperative cancellation.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use davsync::callbacks::NoCallback;
//! use davsync::config::Config;
//! use davsync::connection::WebDavConnector;
//! use davsync::controller::{Collaborators, SyncStateController};
//! use davsync::state::RunStateStore;
//! use davsync::watch::NotifyWatchSource;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new("/home/me/project");
//!     let settings = config.load_settings()?;
//!     let controller = SyncStateController::new(
//!         &config.workspace_root,
//!         settings,
//!         Collaborators {
//!             store: RunStateStore::open_in(&config.state_dir, &config.workspace_root)?,
//!             connector: Arc::new(WebDavConnector),
//!             watch_source: Arc::new(NotifyWatchSource),
//!             callbacks: Arc::new(NoCallback),
//!         },
//!     );
//!     controller.start().await?;
//!     controller.resume()?;
//!     Ok(())
//! }
//! ```

pub mod bulk;
pub mod callbacks;
pub mod config;
pub mod connection;
pub mod context;
pub mod controller;
pub mod daemon;
pub mod error;
pub mod events;
pub mod logging;
pub mod operation;
pub mod paths;
pub mod progress;
pub mod remote;
pub mod signal;
pub mod state;
pub mod walk;
pub mod watch;

// Re-export commonly used types and functions
pub use bulk::{BatchSummary, BulkSyncCoordinator, StopReason};
pub use config::{Config, Settings};
pub use connection::{ConnectionManager, Credentials};
pub use context::{ConnectionState, SyncContext};
pub use controller::SyncStateController;
pub use error::{ConfigError, ConnectionError, RemoteError, StateError, SyncError, WatchError};
pub use events::{EventSyncController, FsEvent, FsEventKind};
pub use operation::{OperationOutcome, SyncAction, SyncOperation};
pub use paths::{is_hidden, map_remote_path, PathConfig};
pub use remote::{ensure_directory, RemoteStore};

// vim: ts=4
