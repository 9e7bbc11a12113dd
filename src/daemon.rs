//! Long-running watch session
//!
//! Keeps the state controller alive, applies settings file edits as they
//! happen and takes one-line commands on stdin. Bulk syncs run in the
//! background so `cancel` can stop them between files.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::unbounded_channel;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ConfigWatcher};
use crate::controller::SyncStateController;
use crate::error::SyncError;
use crate::logging::*;

/// Interactive command read from stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCommand {
	Pause,
	Resume,
	Reconnect,
	SyncAll,
	Sync(PathBuf),
	Cancel,
	Status,
	Quit,
}

impl FromStr for DaemonCommand {
	type Err = String;

	fn from_str(line: &str) -> Result<Self, Self::Err> {
		let line = line.trim();
		let (word, rest) = match line.split_once(char::is_whitespace) {
			Some((word, rest)) => (word, rest.trim()),
			None => (line, ""),
		};
		match (word, rest.is_empty()) {
			("pause", true) => Ok(DaemonCommand::Pause),
			("resume", true) => Ok(DaemonCommand::Resume),
			("reconnect", true) => Ok(DaemonCommand::Reconnect),
			("sync-all", true) => Ok(DaemonCommand::SyncAll),
			("sync", false) => Ok(DaemonCommand::Sync(PathBuf::from(rest))),
			("sync", true) => Err("usage: sync <path>".to_string()),
			("cancel", true) => Ok(DaemonCommand::Cancel),
			("status", true) => Ok(DaemonCommand::Status),
			("quit", true) | ("exit", true) => Ok(DaemonCommand::Quit),
			_ => Err(format!("unknown command: {}", line)),
		}
	}
}

impl fmt::Display for DaemonCommand {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DaemonCommand::Pause => write!(f, "pause"),
			DaemonCommand::Resume => write!(f, "resume"),
			DaemonCommand::Reconnect => write!(f, "reconnect"),
			DaemonCommand::SyncAll => write!(f, "sync-all"),
			DaemonCommand::Sync(path) => write!(f, "sync {}", path.display()),
			DaemonCommand::Cancel => write!(f, "cancel"),
			DaemonCommand::Status => write!(f, "status"),
			DaemonCommand::Quit => write!(f, "quit"),
		}
	}
}

struct BulkRun {
	task: JoinHandle<()>,
	cancel: CancellationToken,
}

pub struct Daemon {
	controller: Arc<SyncStateController>,
	bulk: Option<BulkRun>,
}

impl Daemon {
	pub fn new(controller: Arc<SyncStateController>) -> Self {
		Daemon { controller, bulk: None }
	}

	pub fn is_bulk_running(&self) -> bool {
		self.bulk.as_ref().is_some_and(|run| !run.task.is_finished())
	}

	/// Run one command. Returns false when the session should end.
	pub async fn execute(&mut self, command: DaemonCommand) -> bool {
		debug!("Command: {}", command);
		match command {
			DaemonCommand::Pause => {
				if let Err(e) = self.controller.pause() {
					error!("Pause failed: {}", e);
				}
			}
			DaemonCommand::Resume => {
				if let Err(e) = self.controller.resume() {
					debug!("Resume failed: {}", e);
				}
			}
			DaemonCommand::Reconnect => {
				self.controller.reconnect().await;
			}
			DaemonCommand::SyncAll => self.start_bulk(None),
			DaemonCommand::Sync(path) => {
				let path = if path.is_absolute() {
					path
				} else {
					PathBuf::from(&self.controller.context().paths().local_base_path).join(path)
				};
				self.start_bulk(Some(path));
			}
			DaemonCommand::Cancel => match self.bulk {
				Some(ref run) if !run.task.is_finished() => {
					info!("Cancelling bulk sync");
					run.cancel.cancel();
				}
				_ => info!("No bulk sync running"),
			},
			DaemonCommand::Status => {
				let ctx = self.controller.context();
				let paths = ctx.paths();
				info!(
					"Status: {} | {} -> {} | watching: {} | bulk sync: {}",
					ctx.status(),
					paths.local_base_path,
					paths.remote_base_path,
					self.controller.watch_root().map(|p| p.display().to_string()).unwrap_or_else(|| "-".into()),
					if self.is_bulk_running() { "running" } else { "idle" }
				);
			}
			DaemonCommand::Quit => return false,
		}
		true
	}

	fn start_bulk(&mut self, root: Option<PathBuf>) {
		if self.is_bulk_running() {
			warn!("A bulk sync is already running; cancel it first");
			return;
		}

		let cancel = CancellationToken::new();
		let token = cancel.clone();
		let bulk = self.controller.bulk();
		let task = tokio::spawn(async move {
			let result = match root {
				Some(root) => bulk.sync_subtree(&root, &token).await,
				None => bulk.sync_all(&token).await,
			};
			if let Err(e) = result {
				error!("Bulk sync did not start: {}", e);
			}
		});
		self.bulk = Some(BulkRun { task, cancel });
	}

	/// Cancel a running bulk sync and wait for it to stop at a file boundary
	pub async fn stop_bulk(&mut self) {
		if let Some(run) = self.bulk.take() {
			run.cancel.cancel();
			let _ = run.task.await;
		}
	}
}

/// Serve until `shutdown` is cancelled or `quit` is read
pub async fn run(
	config: Config,
	controller: Arc<SyncStateController>,
	shutdown: CancellationToken,
) -> Result<(), SyncError> {
	// Keep a sender so the channel stays open when the watcher is unavailable
	let (_fallback_tx, fallback_rx) = unbounded_channel();
	let (_config_watcher, mut changes) = match ConfigWatcher::spawn(config.clone(), controller.settings()) {
		Ok((watcher, rx)) => (Some(watcher), rx),
		Err(e) => {
			warn!("Settings file will not be watched: {}", e);
			(None, fallback_rx)
		}
	};

	let mut daemon = Daemon::new(controller.clone());
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut stdin_open = true;

	info!("Watching for changes (commands: pause, resume, reconnect, sync-all, sync <path>, cancel, status, quit)");

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => break,
			Some(change) = changes.recv() => {
				if let Err(e) = controller.apply_settings(change.settings).await {
					warn!("Settings not applied: {}", e);
				}
			}
			line = lines.next_line(), if stdin_open => match line {
				Ok(Some(line)) if line.trim().is_empty() => {}
				Ok(Some(line)) => match line.parse::<DaemonCommand>() {
					Ok(command) => {
						if !daemon.execute(command).await {
							break;
						}
					}
					Err(e) => warn!("{}", e),
				},
				Ok(None) => {
					debug!("stdin closed, commands disabled");
					stdin_open = false;
				}
				Err(e) => {
					warn!("Cannot read commands: {}", e);
					stdin_open = false;
				}
			},
		}
	}

	daemon.stop_bulk().await;
	controller.shutdown();
	info!("Stopped");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_commands() {
		assert_eq!("pause".parse::<DaemonCommand>(), Ok(DaemonCommand::Pause));
		assert_eq!("  resume \n".parse::<DaemonCommand>(), Ok(DaemonCommand::Resume));
		assert_eq!("sync-all".parse::<DaemonCommand>(), Ok(DaemonCommand::SyncAll));
		assert_eq!("sync src/my dir".parse::<DaemonCommand>(), Ok(DaemonCommand::Sync(PathBuf::from("src/my dir"))));
		assert_eq!("exit".parse::<DaemonCommand>(), Ok(DaemonCommand::Quit));
	}

	#[test]
	fn test_parse_rejects() {
		assert!("sync".parse::<DaemonCommand>().is_err());
		assert!("pause now".parse::<DaemonCommand>().is_err());
		assert!("frobnicate".parse::<DaemonCommand>().is_err());
	}

	#[test]
	fn test_display_roundtrip() {
		let command = DaemonCommand::Sync(PathBuf::from("a/b"));
		assert_eq!(command.to_string().parse::<DaemonCommand>(), Ok(command));
	}
}

// vim: ts=4
