//! Configuration for davsync
//!
//! Settings follow a priority chain:
//! 1. Built-in defaults (`Settings::default()`)
//! 2. Settings file (`<workspace>/.davsync.toml`, or `--config`; TOML or JSON)
//! 3. Environment variables (`DAVSYNC_*` prefix)
//! 4. CLI flags (highest priority)
//!
//! [`ConfigWatcher`] re-reads the settings file when it changes and reports
//! which keys differ, so the state controller can reconnect only when a
//! connection key changed.

use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::connection::Credentials;
use crate::error::{ConfigError, WatchError};
use crate::logging::*;
use crate::paths::{resolve_placeholder, PathConfig, WORKSPACE_PLACEHOLDER};

/// Settings file looked up in the workspace root
pub const SETTINGS_FILE_NAME: &str = ".davsync.toml";

/// Name of the state directory under `$HOME`
pub const STATE_DIR_NAME: &str = ".davsync";

// ============================================================================
// SETTINGS
// ============================================================================

/// User settings of one workspace
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
	/// Base URL of the WebDAV server
	pub server_host: String,

	pub username: String,

	pub password: String,

	/// Local watch root, may contain `${workspaceFolder}`
	pub local_path: String,

	/// Remote root the local tree is mirrored under
	pub remote_path: String,

	/// Run operations on the same remote path one at a time
	pub serialize_per_path: bool,

	/// Default tracing filter when `RUST_LOG` is not set
	pub log_level: String,
}

impl Default for Settings {
	fn default() -> Self {
		Settings {
			server_host: String::new(),
			username: String::new(),
			password: String::new(),
			local_path: WORKSPACE_PLACEHOLDER.to_string(),
			remote_path: String::new(),
			serialize_per_path: false,
			log_level: "info".to_string(),
		}
	}
}

impl fmt::Debug for Settings {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Settings")
			.field("server_host", &self.server_host)
			.field("username", &self.username)
			.field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
			.field("local_path", &self.local_path)
			.field("remote_path", &self.remote_path)
			.field("serialize_per_path", &self.serialize_per_path)
			.field("log_level", &self.log_level)
			.finish()
	}
}

/// Individually tracked setting, named as in the settings file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
	ServerHost,
	Username,
	Password,
	LocalPath,
	RemotePath,
	SerializePerPath,
	LogLevel,
}

impl SettingKey {
	pub fn name(self) -> &'static str {
		match self {
			SettingKey::ServerHost => "serverHost",
			SettingKey::Username => "username",
			SettingKey::Password => "password",
			SettingKey::LocalPath => "localPath",
			SettingKey::RemotePath => "remotePath",
			SettingKey::SerializePerPath => "serializePerPath",
			SettingKey::LogLevel => "logLevel",
		}
	}

	/// Changing this key requires a new connection
	pub fn affects_connection(self) -> bool {
		matches!(self, SettingKey::ServerHost | SettingKey::Username | SettingKey::Password)
	}
}

impl fmt::Display for SettingKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.name())
	}
}

impl Settings {
	/// Parse a settings file. `.json`/`.json5` files are read as JSON5,
	/// anything else as TOML.
	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let contents = std::fs::read_to_string(path)
			.map_err(|e| ConfigError::Read { path: path.to_path_buf(), source: e })?;
		let parse_err = |message: String| ConfigError::Parse { path: path.to_path_buf(), message };

		match path.extension().and_then(|e| e.to_str()) {
			Some("json") | Some("json5") => json5::from_str(&contents).map_err(|e| parse_err(e.to_string())),
			_ => toml::from_str(&contents).map_err(|e| parse_err(e.to_string())),
		}
	}

	/// Overlay `DAVSYNC_*` environment variables
	pub fn apply_env(&mut self) {
		self.apply_env_from(|key| std::env::var(key).ok());
	}

	pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
		if let Some(v) = lookup("DAVSYNC_SERVER_HOST") {
			self.server_host = v;
		}
		if let Some(v) = lookup("DAVSYNC_USERNAME") {
			self.username = v;
		}
		if let Some(v) = lookup("DAVSYNC_PASSWORD") {
			self.password = v;
		}
		if let Some(v) = lookup("DAVSYNC_LOCAL_PATH") {
			self.local_path = v;
		}
		if let Some(v) = lookup("DAVSYNC_REMOTE_PATH") {
			self.remote_path = v;
		}
	}

	/// Check that synchronization can start with these settings
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.server_host.trim().is_empty() {
			return Err(ConfigError::Missing { key: "serverHost" });
		}
		if self.local_path.trim().is_empty() {
			return Err(ConfigError::Missing { key: "localPath" });
		}
		if self.remote_path.trim().is_empty() {
			return Err(ConfigError::Missing { key: "remotePath" });
		}
		tracing_subscriber::EnvFilter::try_new(&self.log_level)
			.map_err(|e| ConfigError::InvalidValue { key: "logLevel", message: e.to_string() })?;
		Ok(())
	}

	/// Resolve the local and remote roots. A relative `localPath` is taken
	/// relative to the workspace root.
	pub fn path_config(&self, workspace_root: &Path) -> PathConfig {
		let local = resolve_placeholder(self.local_path.trim(), workspace_root);
		let local = if local.is_empty() || Path::new(&local).is_absolute() {
			local
		} else {
			workspace_root.join(&local).to_string_lossy().into_owned()
		};

		let remote = self.remote_path.trim().replace('\\', "/");
		let remote = if remote.is_empty() {
			remote
		} else {
			let trimmed = remote.trim_matches('/');
			format!("/{}", trimmed)
		};

		PathConfig::new(local, remote)
	}

	pub fn credentials(&self) -> Credentials {
		Credentials {
			server_host: self.server_host.trim().to_string(),
			username: self.username.clone(),
			password: self.password.clone(),
		}
	}

	/// Keys whose value differs in `other`
	pub fn changed_keys(&self, other: &Settings) -> Vec<SettingKey> {
		let mut changed = Vec::new();
		if self.server_host != other.server_host {
			changed.push(SettingKey::ServerHost);
		}
		if self.username != other.username {
			changed.push(SettingKey::Username);
		}
		if self.password != other.password {
			changed.push(SettingKey::Password);
		}
		if self.local_path != other.local_path {
			changed.push(SettingKey::LocalPath);
		}
		if self.remote_path != other.remote_path {
			changed.push(SettingKey::RemotePath);
		}
		if self.serialize_per_path != other.serialize_per_path {
			changed.push(SettingKey::SerializePerPath);
		}
		if self.log_level != other.log_level {
			changed.push(SettingKey::LogLevel);
		}
		changed
	}
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
	pub server_host: Option<String>,
	pub username: Option<String>,
	pub password: Option<String>,
	pub local_path: Option<String>,
	pub remote_path: Option<String>,
}

impl SettingsOverrides {
	pub fn apply(&self, settings: &mut Settings) {
		if let Some(ref v) = self.server_host {
			settings.server_host = v.clone();
		}
		if let Some(ref v) = self.username {
			settings.username = v.clone();
		}
		if let Some(ref v) = self.password {
			settings.password = v.clone();
		}
		if let Some(ref v) = self.local_path {
			settings.local_path = v.clone();
		}
		if let Some(ref v) = self.remote_path {
			settings.remote_path = v.clone();
		}
	}
}

// ============================================================================
// RUNTIME CONFIGURATION
// ============================================================================

/// Where settings and state live for one invocation
#[derive(Debug, Clone)]
pub struct Config {
	/// Workspace root; `${workspaceFolder}` resolves to it
	pub workspace_root: PathBuf,

	/// Explicit settings file (`--config`)
	pub config_file: Option<PathBuf>,

	/// Directory of the run state database
	pub state_dir: PathBuf,

	pub overrides: SettingsOverrides,
}

impl Config {
	pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
		Config {
			workspace_root: workspace_root.into(),
			config_file: None,
			state_dir: default_state_dir(),
			overrides: SettingsOverrides::default(),
		}
	}

	/// Settings file consulted by [`Config::load_settings`]
	pub fn settings_path(&self) -> PathBuf {
		self.config_file.clone().unwrap_or_else(|| self.workspace_root.join(SETTINGS_FILE_NAME))
	}

	/// Run the full priority chain. A missing default settings file is not
	/// an error; a missing explicit one is.
	pub fn load_settings(&self) -> Result<Settings, ConfigError> {
		self.load_settings_with(|key| std::env::var(key).ok())
	}

	pub fn load_settings_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<Settings, ConfigError> {
		let path = self.settings_path();
		let mut settings = if self.config_file.is_some() || path.exists() {
			debug!("Loading settings from {}", path.display());
			Settings::from_file(&path)?
		} else {
			Settings::default()
		};
		settings.apply_env_from(env);
		self.overrides.apply(&mut settings);
		Ok(settings)
	}
}

/// `~/.davsync`, or `.davsync` when `HOME` is unset
pub fn default_state_dir() -> PathBuf {
	std::env::var("HOME")
		.ok()
		.map(|h| PathBuf::from(h).join(STATE_DIR_NAME))
		.unwrap_or_else(|| PathBuf::from(STATE_DIR_NAME))
}

// ============================================================================
// CHANGE NOTIFICATIONS
// ============================================================================

/// Reloaded settings and the keys that changed
#[derive(Debug, Clone)]
pub struct ConfigChange {
	pub settings: Settings,
	pub changed: Vec<SettingKey>,
}

impl ConfigChange {
	/// Change record from `old` to `new`, `None` when nothing differs
	pub fn between(old: &Settings, new: Settings) -> Option<Self> {
		let changed = old.changed_keys(&new);
		if changed.is_empty() {
			None
		} else {
			Some(ConfigChange { settings: new, changed })
		}
	}

	pub fn affects_connection(&self) -> bool {
		self.changed.iter().any(|key| key.affects_connection())
	}
}

/// Watches the settings file and emits a [`ConfigChange`] per effective edit
pub struct ConfigWatcher {
	_watcher: RecommendedWatcher,
	task: JoinHandle<()>,
}

impl ConfigWatcher {
	pub fn spawn(config: Config, current: Settings) -> Result<(Self, UnboundedReceiver<ConfigChange>), WatchError> {
		let settings_path = config.settings_path();
		let watch_dir = settings_path
			.parent()
			.filter(|p| !p.as_os_str().is_empty())
			.map(Path::to_path_buf)
			.unwrap_or_else(|| PathBuf::from("."));
		let file_name = settings_path.file_name().map(|n| n.to_os_string());

		let (raw_tx, mut raw_rx) = unbounded_channel::<()>();
		let mut watcher = RecommendedWatcher::new(
			move |res: notify::Result<Event>| {
				if let Ok(event) = res {
					let touches_settings =
						event.paths.iter().any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
					if touches_settings {
						let _ = raw_tx.send(());
					}
				}
			},
			NotifyConfig::default(),
		)?;
		watcher.watch(&watch_dir, RecursiveMode::NonRecursive).map_err(|e| WatchError::Subscribe {
			path: watch_dir.clone(),
			message: e.to_string(),
		})?;

		let (tx, rx) = unbounded_channel();
		let task = tokio::spawn(async move {
			let mut last = current;
			while raw_rx.recv().await.is_some() {
				// An editor save often arrives as several events
				while raw_rx.try_recv().is_ok() {}

				let settings = match config.load_settings() {
					Ok(settings) => settings,
					Err(e) => {
						warn!("Ignoring settings change: {}", e);
						continue;
					}
				};
				if let Some(change) = ConfigChange::between(&last, settings.clone()) {
					let names: Vec<&str> = change.changed.iter().map(|k| k.name()).collect();
					info!("Settings changed: {}", names.join(", "));
					last = settings;
					if tx.send(change).is_err() {
						break;
					}
				}
			}
		});

		Ok((ConfigWatcher { _watcher: watcher, task }, rx))
	}
}

impl Drop for ConfigWatcher {
	fn drop(&mut self) {
		self.task.abort();
	}
}


// vim: ts=4
