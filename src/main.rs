use clap::{Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use davsync::callbacks::SyncCallback;
use davsync::config::{Config, Settings, SettingsOverrides};
use davsync::connection::{StaticConnector, StoreConnector, WebDavConnector};
use davsync::controller::{Collaborators, SyncStateController};
use davsync::progress::CliProgressCallback;
use davsync::remote::MemoryStore;
use davsync::state::RunStateStore;
use davsync::watch::NotifyWatchSource;
use davsync::{daemon, logging, signal};

///////////////////////
// Utility functions //
///////////////////////

fn build_config(matches: &ArgMatches) -> Result<Config, Box<dyn Error>> {
	let workspace_root = match matches.get_one::<String>("workspace") {
		Some(dir) => PathBuf::from(dir),
		None => std::env::current_dir()?,
	};
	let workspace_root = workspace_root
		.canonicalize()
		.map_err(|e| format!("Cannot open workspace {}: {}", workspace_root.display(), e))?;

	let mut config = Config::new(workspace_root);
	config.config_file = matches.get_one::<String>("config").map(PathBuf::from);
	if let Some(dir) = matches.get_one::<String>("state-dir") {
		config.state_dir = PathBuf::from(dir);
	}
	config.overrides = SettingsOverrides {
		server_host: matches.get_one::<String>("server").cloned(),
		username: matches.get_one::<String>("user").cloned(),
		password: matches.get_one::<String>("password").cloned(),
		local_path: matches.get_one::<String>("local").cloned(),
		remote_path: matches.get_one::<String>("remote").cloned(),
	};
	Ok(config)
}

fn build_controller(
	config: &Config,
	settings: Settings,
	connector: Arc<dyn StoreConnector>,
	callbacks: Arc<dyn SyncCallback>,
) -> Result<SyncStateController, Box<dyn Error>> {
	let store = RunStateStore::open_in(&config.state_dir, &config.workspace_root)?;
	Ok(SyncStateController::new(
		&config.workspace_root,
		settings,
		Collaborators { store, connector, watch_source: Arc::new(NotifyWatchSource), callbacks },
	))
}

fn cli() -> Command {
	Command::new("davsync")
		.version(env!("CARGO_PKG_VERSION"))
		.author("Szilard Hajba <szilard@symbion.hu>")
		.about("Mirror a local directory to a WebDAV server")
		.subcommand_required(true)
		.arg(
			Arg::new("workspace")
				.short('w')
				.long("workspace")
				.value_name("DIR")
				.global(true)
				.help("Workspace root (default: current directory)"),
		)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.global(true)
				.help("Settings file (default: <workspace>/.davsync.toml)"),
		)
		.arg(
			Arg::new("state-dir")
				.long("state-dir")
				.value_name("DIR")
				.global(true)
				.help("Run state directory (default: ~/.davsync)"),
		)
		.arg(
			Arg::new("server")
				.long("server")
				.value_name("URL")
				.global(true)
				.help("WebDAV server base URL"),
		)
		.arg(
			Arg::new("user")
				.short('u')
				.long("user")
				.value_name("USER")
				.global(true)
				.help("WebDAV username"),
		)
		.arg(
			Arg::new("password")
				.long("password")
				.value_name("PASSWORD")
				.global(true)
				.help("WebDAV password"),
		)
		.arg(
			Arg::new("local")
				.long("local")
				.value_name("PATH")
				.global(true)
				.help("Local root (may use ${workspaceFolder})"),
		)
		.arg(
			Arg::new("remote")
				.long("remote")
				.value_name("PATH")
				.global(true)
				.help("Remote root"),
		)
		.subcommand(Command::new("watch").about("Sync file changes as they happen"))
		.subcommand(
			Command::new("push")
				.about("Upload a directory tree or a single file")
				.arg(Arg::new("path").help("Path to sync (default: the local root)"))
				.arg(
					Arg::new("dry-run")
						.short('n')
						.long("dry-run")
						.action(ArgAction::SetTrue)
						.help("Upload into an in-memory store instead of the server"),
				),
		)
		.subcommand(Command::new("pause").about("Pause event sync for this workspace"))
		.subcommand(Command::new("resume").about("Resume event sync (requires a working connection)"))
		.subcommand(Command::new("status").about("Show run state and connection"))
		.subcommand(Command::new("check").about("Test the connection to the server"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = cli().get_matches();
	let config = build_config(&matches)?;
	let settings = config.load_settings()?;
	logging::init_tracing(&settings.log_level);

	let callbacks: Arc<dyn SyncCallback> = if std::io::stderr().is_terminal() {
		Arc::new(CliProgressCallback::new())
	} else {
		Arc::new(CliProgressCallback::quiet())
	};

	match matches.subcommand() {
		Some(("watch", _)) => {
			let controller = Arc::new(build_controller(&config, settings, Arc::new(WebDavConnector), callbacks)?);
			controller.start().await?;

			let shutdown = CancellationToken::new();
			signal::setup_signal_handlers(shutdown.clone());
			daemon::run(config, controller, shutdown).await?;

			// A pending stdin read would keep the runtime from shutting down
			std::process::exit(0);
		}
		Some(("push", sub_matches)) => {
			let connector: Arc<dyn StoreConnector> = if sub_matches.get_flag("dry-run") {
				Arc::new(StaticConnector(Arc::new(MemoryStore::new())))
			} else {
				Arc::new(WebDavConnector)
			};
			let controller = build_controller(&config, settings, connector, callbacks)?;
			let state = controller.initialize().await?;
			if !state.is_connected() {
				return Err("not connected to the WebDAV server".into());
			}

			let root = match sub_matches.get_one::<String>("path") {
				Some(path) => PathBuf::from(path).canonicalize()?,
				None => PathBuf::from(&controller.context().paths().local_base_path),
			};

			let cancel = CancellationToken::new();
			signal::setup_signal_handlers(cancel.clone());
			let summary = controller.bulk().sync_subtree(&root, &cancel).await?;
			if summary.failed > 0 || !summary.is_complete() {
				return Err(summary.to_string().into());
			}
		}
		Some(("pause", _)) => {
			let store = RunStateStore::open_in(&config.state_dir, &config.workspace_root)?;
			store.save_paused(true)?;
			eprintln!("Sync paused for {}", config.workspace_root.display());
		}
		Some(("resume", _)) => {
			let controller = build_controller(&config, settings, Arc::new(WebDavConnector), callbacks)?;
			controller.initialize().await?;
			controller.resume()?;
		}
		Some(("status", _)) => {
			let store = RunStateStore::open_in(&config.state_dir, &config.workspace_root)?;
			let paths = settings.path_config(&config.workspace_root);
			eprintln!("workspace: {}", config.workspace_root.display());
			eprintln!("settings:  {}", config.settings_path().display());
			eprintln!("local:     {}", paths.local_base_path);
			eprintln!("remote:    {}", paths.remote_base_path);
			eprintln!("server:    {}", settings.server_host);
			eprintln!("state:     {}", if store.load_paused()? { "paused" } else { "running" });
			if let Err(e) = settings.validate() {
				eprintln!("config:    {}", e);
			}
		}
		Some(("check", _)) => {
			let controller = build_controller(&config, settings, Arc::new(WebDavConnector), callbacks)?;
			let state = controller.initialize().await?;
			if !state.is_connected() {
				return Err("connection check failed".into());
			}
			eprintln!("Connection OK");
		}
		_ => return Err("unknown command".into()),
	}

	Ok(())
}

// vim: ts=4
