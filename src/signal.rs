//! Signal handlers for graceful termination

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Cancel `shutdown` on SIGINT or SIGTERM
#[cfg(unix)]
pub fn setup_signal_handlers(shutdown: CancellationToken) {
	tokio::spawn(async move {
		use tokio::signal;

		let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(stream) => stream,
			Err(e) => {
				warn!("Failed to setup SIGTERM handler: {}. Process will not handle SIGTERM gracefully.", e);
				return;
			}
		};

		let mut sigint = match signal::unix::signal(signal::unix::SignalKind::interrupt()) {
			Ok(stream) => stream,
			Err(e) => {
				warn!("Failed to setup SIGINT handler: {}. Process will not handle SIGINT gracefully.", e);
				return;
			}
		};

		tokio::select! {
			_ = sigterm.recv() => debug!("Received SIGTERM, shutting down..."),
			_ = sigint.recv() => debug!("Received SIGINT, shutting down..."),
		}
		shutdown.cancel();
	});
}

/// Cancel `shutdown` on Ctrl-C
#[cfg(not(unix))]
pub fn setup_signal_handlers(shutdown: CancellationToken) {
	tokio::spawn(async move {
		match tokio::signal::ctrl_c().await {
			Ok(()) => {
				debug!("Received Ctrl-C, shutting down...");
				shutdown.cancel();
			}
			Err(e) => warn!("Failed to setup Ctrl-C handler: {}", e),
		}
	});
}

// vim: ts=4
