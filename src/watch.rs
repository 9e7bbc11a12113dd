//! Local file-system watch sources
//!
//! A [`WatchSource`] turns a watch root into a stream of [`FsEvent`]s. The
//! `notify` backend reports directories as well as files and splits renames
//! into a delete of the old path and a create of the new one.

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::WatchError;
use crate::events::{FsEvent, FsEventKind};
use crate::logging::*;

/// Keeps a backend watcher alive; dropping it ends the subscription
#[allow(dead_code)]
pub struct WatchGuard(Option<Box<dyn Send>>);

impl WatchGuard {
	pub fn none() -> Self {
		WatchGuard(None)
	}
}

/// Events for one watch root
pub struct Subscription {
	pub root: PathBuf,
	events: UnboundedReceiver<FsEvent>,
	guard: WatchGuard,
}

impl Subscription {
	pub fn new(root: PathBuf, events: UnboundedReceiver<FsEvent>, guard: WatchGuard) -> Self {
		Subscription { root, events, guard }
	}

	pub fn into_parts(self) -> (UnboundedReceiver<FsEvent>, WatchGuard) {
		(self.events, self.guard)
	}
}

/// Source of recursive change notifications for a directory
pub trait WatchSource: Send + Sync {
	fn subscribe(&self, root: &Path) -> Result<Subscription, WatchError>;
}

/// Watcher backed by the platform's native notification API
#[derive(Debug, Default)]
pub struct NotifyWatchSource;

impl WatchSource for NotifyWatchSource {
	fn subscribe(&self, root: &Path) -> Result<Subscription, WatchError> {
		let (tx, rx) = unbounded_channel();
		let mut watcher = RecommendedWatcher::new(
			move |res: notify::Result<Event>| match res {
				Ok(event) => {
					for fs_event in convert_event(event) {
						if tx.send(fs_event).is_err() {
							break;
						}
					}
				}
				Err(e) => warn!("File watcher error: {}", e),
			},
			Config::default(),
		)?;
		watcher.watch(root, RecursiveMode::Recursive).map_err(|e| WatchError::Subscribe {
			path: root.to_path_buf(),
			message: e.to_string(),
		})?;
		debug!("Watching {}", root.display());

		Ok(Subscription::new(root.to_path_buf(), rx, WatchGuard(Some(Box::new(watcher)))))
	}
}

/// Map a backend notification to zero or more sync-relevant events
pub(crate) fn convert_event(event: Event) -> Vec<FsEvent> {
	let make = |kind, path: &PathBuf| FsEvent { kind, path: path.clone() };
	match event.kind {
		EventKind::Create(_) => event.paths.iter().map(|p| make(FsEventKind::Created, p)).collect(),
		EventKind::Remove(_) => event.paths.iter().map(|p| make(FsEventKind::Deleted, p)).collect(),
		EventKind::Modify(ModifyKind::Name(mode)) => match mode {
			RenameMode::From => event.paths.iter().map(|p| make(FsEventKind::Deleted, p)).collect(),
			RenameMode::To => event.paths.iter().map(|p| make(FsEventKind::Created, p)).collect(),
			RenameMode::Both => {
				let mut out = Vec::new();
				if let Some(from) = event.paths.first() {
					out.push(make(FsEventKind::Deleted, from));
				}
				if let Some(to) = event.paths.get(1) {
					out.push(make(FsEventKind::Created, to));
				}
				out
			}
			// Backend could not tell which side this is
			_ => event
				.paths
				.iter()
				.map(|p| {
					let kind = if p.exists() { FsEventKind::Created } else { FsEventKind::Deleted };
					make(kind, p)
				})
				.collect(),
		},
		EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
		EventKind::Modify(_) => event.paths.iter().map(|p| make(FsEventKind::Changed, p)).collect(),
		EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
	}
}

/// Watch source fed by hand, for tests and embedding
#[derive(Default)]
pub struct ChannelWatchSource {
	senders: Mutex<Vec<UnboundedSender<FsEvent>>>,
	roots: Mutex<Vec<PathBuf>>,
}

impl ChannelWatchSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Deliver `event` to every live subscription
	pub fn emit(&self, event: FsEvent) {
		let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
		senders.retain(|tx| tx.send(event.clone()).is_ok());
	}

	/// Roots subscribed so far, oldest first
	pub fn subscribed_roots(&self) -> Vec<PathBuf> {
		self.roots.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}

	pub fn live_subscriptions(&self) -> usize {
		let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
		senders.retain(|tx| !tx.is_closed());
		senders.len()
	}
}

impl WatchSource for ChannelWatchSource {
	fn subscribe(&self, root: &Path) -> Result<Subscription, WatchError> {
		let (tx, rx) = unbounded_channel();
		self.senders.lock().unwrap_or_else(|e| e.into_inner()).push(tx);
		self.roots.lock().unwrap_or_else(|e| e.into_inner()).push(root.to_path_buf());
		Ok(Subscription::new(root.to_path_buf(), rx, WatchGuard::none()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

	fn event(kind: EventKind, paths: &[&str]) -> Event {
		let mut event = Event::new(kind);
		for p in paths {
			event = event.add_path(PathBuf::from(p));
		}
		event
	}

	#[test]
	fn test_create_remove_modify() {
		let created = convert_event(event(EventKind::Create(CreateKind::File), &["/w/a"]));
		assert_eq!(created, vec![FsEvent { kind: FsEventKind::Created, path: PathBuf::from("/w/a") }]);

		let removed = convert_event(event(EventKind::Remove(RemoveKind::Folder), &["/w/d"]));
		assert_eq!(removed[0].kind, FsEventKind::Deleted);

		let changed =
			convert_event(event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &["/w/a"]));
		assert_eq!(changed[0].kind, FsEventKind::Changed);
	}

	#[test]
	fn test_rename_both_splits() {
		let events =
			convert_event(event(EventKind::Modify(ModifyKind::Name(RenameMode::Both)), &["/w/old", "/w/new"]));
		assert_eq!(
			events,
			vec![
				FsEvent { kind: FsEventKind::Deleted, path: PathBuf::from("/w/old") },
				FsEvent { kind: FsEventKind::Created, path: PathBuf::from("/w/new") },
			]
		);
	}

	#[test]
	fn test_ignored_kinds() {
		assert!(convert_event(event(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)), &["/w/a"]))
			.is_empty());
		assert!(convert_event(event(EventKind::Any, &["/w/a"])).is_empty());
	}

	#[tokio::test]
	async fn test_channel_source_delivers() {
		let source = ChannelWatchSource::new();
		let (mut rx, _guard) = source.subscribe(Path::new("/w")).unwrap().into_parts();
		source.emit(FsEvent { kind: FsEventKind::Changed, path: PathBuf::from("/w/a") });
		assert_eq!(rx.recv().await.map(|e| e.kind), Some(FsEventKind::Changed));
		assert_eq!(source.subscribed_roots(), vec![PathBuf::from("/w")]);

		drop(rx);
		assert_eq!(source.live_subscriptions(), 0);
	}
}

// vim: ts=4
