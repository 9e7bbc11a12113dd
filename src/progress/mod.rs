//! Progress display callback for the CLI
//!
//! Renders [`SyncEvent`]s: notices go to the log at their level, status
//! changes are logged, bulk progress is a throttled bar on stderr.

pub mod constants;

use std::io::Write;
use std::sync::Mutex;
use std::time::Instant;

use crate::callbacks::{NoticeLevel, SyncCallback, SyncEvent};
use crate::logging::*;

/// Progress display constants
pub use constants::*;

/// Shared state for progress tracking
#[derive(Debug)]
pub struct ProgressState {
	pub last_update: Mutex<Instant>,
	/// A progress line is on screen and needs clearing
	pub bar_visible: Mutex<bool>,
}

impl ProgressState {
	pub fn new() -> Self {
		Self { last_update: Mutex::new(Instant::now()), bar_visible: Mutex::new(false) }
	}
}

impl Default for ProgressState {
	fn default() -> Self {
		Self::new()
	}
}

/// CLI progress callback
pub struct CliProgressCallback {
	state: ProgressState,
	show_progress: bool,
}

impl CliProgressCallback {
	pub fn new() -> Self {
		Self { state: ProgressState::new(), show_progress: true }
	}

	/// Log-only variant for non-interactive output
	pub fn quiet() -> Self {
		Self { state: ProgressState::new(), show_progress: false }
	}

	fn clear_bar(&self) {
		let mut visible = self.state.bar_visible.lock().unwrap_or_else(|e| e.into_inner());
		if *visible {
			let _ = write!(std::io::stderr(), "\r{}\r", " ".repeat(PROGRESS_LINE_WIDTH));
			let _ = std::io::stderr().flush();
			*visible = false;
		}
	}

	fn draw_bar(&self, processed: usize, total: usize) {
		// Throttle updates to avoid spamming, but always draw the last one
		let mut last = self.state.last_update.lock().unwrap_or_else(|e| e.into_inner());
		if processed < total && last.elapsed().as_millis() < UPDATE_THROTTLE_MS {
			return;
		}
		*last = Instant::now();
		drop(last);

		let line = render_bar(processed, total);
		let _ = write!(std::io::stderr(), "\r  {}", line);
		let _ = std::io::stderr().flush();
		*self.state.bar_visible.lock().unwrap_or_else(|e| e.into_inner()) = true;
	}
}

impl Default for CliProgressCallback {
	fn default() -> Self {
		Self::new()
	}
}

/// `[=====     ] 5/10 files`
pub fn render_bar(processed: usize, total: usize) -> String {
	let ratio = if total > 0 { processed as f64 / total as f64 } else { 1.0 };
	let filled = (ratio.clamp(0.0, 1.0) * PROGRESS_BAR_WIDTH as f64) as usize;
	format!(
		"[{}{}] {}/{} files",
		"=".repeat(filled),
		" ".repeat(PROGRESS_BAR_WIDTH - filled),
		processed,
		total
	)
}

impl SyncCallback for CliProgressCallback {
	fn on_event(&self, event: SyncEvent) {
		match event {
			SyncEvent::Notice { level, message } => {
				self.clear_bar();
				match level {
					NoticeLevel::Info => info!("{}", message),
					NoticeLevel::Warning => warn!("{}", message),
					NoticeLevel::Error => error!("{}", message),
				}
			}
			SyncEvent::StatusChanged(status) => {
				self.clear_bar();
				info!("WebDAV sync: {}", status);
			}
			SyncEvent::BatchStarted { root, total } => {
				info!("→ Syncing {} files from {}", total, root.display());
				if self.show_progress {
					self.draw_bar(0, total);
				}
			}
			SyncEvent::BatchProgress { processed, total } => {
				if self.show_progress {
					self.draw_bar(processed, total);
				}
			}
			SyncEvent::BatchFinished(_) => self.clear_bar(),
			SyncEvent::UploadProgress { remote, transferred, total } => {
				if total as f64 >= BYTES_PER_MB {
					debug!(
						"{}: {:.1}/{:.1} MB",
						remote,
						transferred as f64 / BYTES_PER_MB,
						total as f64 / BYTES_PER_MB
					);
				}
			}
			SyncEvent::FileSynced { .. } => {}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_render_bar() {
		assert_eq!(render_bar(0, 4), format!("[{}] 0/4 files", " ".repeat(PROGRESS_BAR_WIDTH)));
		assert_eq!(render_bar(4, 4), format!("[{}] 4/4 files", "=".repeat(PROGRESS_BAR_WIDTH)));
		assert_eq!(render_bar(0, 0), format!("[{}] 0/0 files", "=".repeat(PROGRESS_BAR_WIDTH)));
	}
}

// vim: ts=4
