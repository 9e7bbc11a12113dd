//! Logging prelude module for convenient access to tracing macros.
//!
//! # Usage
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Syncing {}", path);
//! warn!("This is a warning");
//! error!("An error occurred");
//! debug!("Debug information");
//! ```

pub use tracing::{debug, error, info, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// `default_level` (the `logLevel` setting) applies when `RUST_LOG` is not
/// set:
///
/// ```bash
/// RUST_LOG=debug davsync watch
/// RUST_LOG=davsync::operation=debug,davsync::events=debug davsync watch
/// ```
pub fn init_tracing(default_level: &str) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

	// A second init (tests, embedding) keeps the first subscriber
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

// vim: ts=4
