//! Error types for davsync operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Main error type for sync operations
#[derive(Debug)]
pub enum SyncError {
	/// Required settings are missing or malformed
	Config(ConfigError),

	/// The remote store could not be reached
	Connection(ConnectionError),

	/// A remote store call failed
	Remote(RemoteError),

	/// The persisted run state could not be read or written
	State(StateError),

	/// The local file watcher could not be set up
	Watch(WatchError),

	/// Local I/O failure on a specific path
	Io { path: PathBuf, source: io::Error },

	/// Operation requires a live connection
	NotConnected,
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Config(e) => write!(f, "Configuration error: {}", e),
			SyncError::Connection(e) => write!(f, "Connection error: {}", e),
			SyncError::Remote(e) => write!(f, "Remote error: {}", e),
			SyncError::State(e) => write!(f, "State error: {}", e),
			SyncError::Watch(e) => write!(f, "Watch error: {}", e),
			SyncError::Io { path, source } => {
				write!(f, "I/O error on {}: {}", path.display(), source)
			}
			SyncError::NotConnected => write!(f, "Not connected to the remote store"),
		}
	}
}

impl Error for SyncError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			SyncError::Config(e) => Some(e),
			SyncError::Connection(e) => Some(e),
			SyncError::Remote(e) => Some(e),
			SyncError::State(e) => Some(e),
			SyncError::Watch(e) => Some(e),
			SyncError::Io { source, .. } => Some(source),
			_ => None,
		}
	}
}

impl From<ConfigError> for SyncError {
	fn from(e: ConfigError) -> Self {
		SyncError::Config(e)
	}
}

impl From<ConnectionError> for SyncError {
	fn from(e: ConnectionError) -> Self {
		SyncError::Connection(e)
	}
}

impl From<RemoteError> for SyncError {
	fn from(e: RemoteError) -> Self {
		SyncError::Remote(e)
	}
}

impl From<StateError> for SyncError {
	fn from(e: StateError) -> Self {
		SyncError::State(e)
	}
}

impl From<WatchError> for SyncError {
	fn from(e: WatchError) -> Self {
		SyncError::Watch(e)
	}
}

/// Configuration errors: surfaced once, synchronization does not start
#[derive(Debug)]
pub enum ConfigError {
	/// A required setting has no value
	Missing { key: &'static str },

	/// A setting has a value that cannot be used
	InvalidValue { key: &'static str, message: String },

	/// The settings file could not be read
	Read { path: PathBuf, source: io::Error },

	/// The settings file could not be parsed
	Parse { path: PathBuf, message: String },
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::Missing { key } => {
				write!(f, "setting '{}' is not configured", key)
			}
			ConfigError::InvalidValue { key, message } => {
				write!(f, "invalid value for '{}': {}", key, message)
			}
			ConfigError::Read { path, source } => {
				write!(f, "cannot read {}: {}", path.display(), source)
			}
			ConfigError::Parse { path, message } => {
				write!(f, "cannot parse {}: {}", path.display(), message)
			}
		}
	}
}

impl Error for ConfigError {}

/// Connection-specific errors
#[derive(Debug)]
pub enum ConnectionError {
	/// No server host configured
	MissingHost,

	/// The server host is not a usable base URL
	InvalidEndpoint { host: String, message: String },

	/// The HTTP client could not be constructed
	ClientBuild { message: String },

	/// The liveness probe (root stat) failed
	ProbeFailed { host: String, source: RemoteError },
}

impl fmt::Display for ConnectionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConnectionError::MissingHost => write!(f, "no server host configured"),
			ConnectionError::InvalidEndpoint { host, message } => {
				write!(f, "invalid server address '{}': {}", host, message)
			}
			ConnectionError::ClientBuild { message } => {
				write!(f, "cannot build client: {}", message)
			}
			ConnectionError::ProbeFailed { host, source } => {
				write!(f, "connection to {} failed: {}", host, source)
			}
		}
	}
}

impl Error for ConnectionError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			ConnectionError::ProbeFailed { source, .. } => Some(source),
			_ => None,
		}
	}
}

/// Errors reported by a remote store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
	/// Network or transport level failure
	Transport { message: String },

	/// Remote path does not exist
	NotFound { path: String },

	/// Remote path already exists and overwrite was not allowed
	AlreadyExists { path: String },

	/// Parent collection of the target is missing
	MissingParent { path: String },

	/// Server refused the request for lack of authorization
	Unauthorized { path: String },

	/// Any other unexpected status
	Status { method: String, path: String, status: u16 },

	/// Request could not be constructed
	InvalidRequest { message: String },
}

impl fmt::Display for RemoteError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RemoteError::Transport { message } => write!(f, "transport error: {}", message),
			RemoteError::NotFound { path } => write!(f, "{} not found", path),
			RemoteError::AlreadyExists { path } => write!(f, "{} already exists", path),
			RemoteError::MissingParent { path } => {
				write!(f, "parent collection of {} does not exist", path)
			}
			RemoteError::Unauthorized { path } => write!(f, "access to {} denied", path),
			RemoteError::Status { method, path, status } => {
				write!(f, "{} {} returned status {}", method, path, status)
			}
			RemoteError::InvalidRequest { message } => write!(f, "invalid request: {}", message),
		}
	}
}

impl Error for RemoteError {}

/// Persisted state errors
#[derive(Debug)]
pub enum StateError {
	/// Failed to open the state database
	OpenFailed { path: PathBuf, source: Box<dyn Error + Send + Sync> },

	/// Failed to load state
	LoadFailed { source: Box<dyn Error + Send + Sync> },

	/// Failed to save state
	SaveFailed { source: Box<dyn Error + Send + Sync> },

	/// Stored value cannot be decoded
	Corrupted { message: String },
}

impl fmt::Display for StateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StateError::OpenFailed { path, source } => {
				write!(f, "Failed to open state database {}: {}", path.display(), source)
			}
			StateError::LoadFailed { source } => write!(f, "Failed to load state: {}", source),
			StateError::SaveFailed { source } => write!(f, "Failed to save state: {}", source),
			StateError::Corrupted { message } => write!(f, "State corrupted: {}", message),
		}
	}
}

impl Error for StateError {}

/// File watcher errors
#[derive(Debug)]
pub enum WatchError {
	/// The watcher backend could not be created
	Init { message: String },

	/// The root could not be subscribed
	Subscribe { path: PathBuf, message: String },
}

impl fmt::Display for WatchError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			WatchError::Init { message } => write!(f, "cannot start watcher: {}", message),
			WatchError::Subscribe { path, message } => {
				write!(f, "cannot watch {}: {}", path.display(), message)
			}
		}
	}
}

impl Error for WatchError {}

impl From<notify::Error> for WatchError {
	fn from(e: notify::Error) -> Self {
		WatchError::Init { message: e.to_string() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_config_error_names_key() {
		let err = SyncError::from(ConfigError::Missing { key: "serverHost" });
		assert_eq!(err.to_string(), "Configuration error: setting 'serverHost' is not configured");
	}

	#[test]
	fn test_probe_failure_has_source() {
		let err = ConnectionError::ProbeFailed {
			host: "https://dav.example.com".to_string(),
			source: RemoteError::Unauthorized { path: "/".to_string() },
		};
		assert!(err.to_string().contains("dav.example.com"));
		assert!(err.source().is_some());
	}
}

// vim: ts=4
