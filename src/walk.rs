//! Lazy local tree traversal
//!
//! [`walk`] yields every entry under a root, depth-first, children of a
//! directory in name order. Nothing is read until the stream is polled and
//! each call starts a fresh traversal. Symbolic links are not followed and
//! not reported.

use futures::stream::{self, Stream};
use std::path::{Path, PathBuf};

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
	File,
	Directory,
}

/// One entry found by the traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
	pub path: PathBuf,
	pub kind: EntryKind,
}

impl LocalEntry {
	pub fn is_file(&self) -> bool {
		self.kind == EntryKind::File
	}
}

struct WalkState<F> {
	pending_root: Option<PathBuf>,
	stack: Vec<std::vec::IntoIter<LocalEntry>>,
	keep: F,
}

/// Traverse `root`. Entries rejected by `keep` are skipped, and a rejected
/// directory is not descended into. A directory that cannot be listed yields
/// an error item and the walk goes on with its siblings.
pub fn walk<F>(root: impl Into<PathBuf>, keep: F) -> impl Stream<Item = Result<LocalEntry, SyncError>> + Send
where
	F: Fn(&LocalEntry) -> bool + Send + 'static,
{
	let state = WalkState { pending_root: Some(root.into()), stack: Vec::new(), keep };

	stream::unfold(state, |mut state| async move {
		if let Some(root) = state.pending_root.take() {
			match read_children(&root).await {
				Ok(children) => state.stack.push(children.into_iter()),
				Err(e) => return Some((Err(e), state)),
			}
		}

		loop {
			let top = state.stack.last_mut()?;
			let entry = match top.next() {
				Some(entry) => entry,
				None => {
					state.stack.pop();
					continue;
				}
			};
			if !(state.keep)(&entry) {
				continue;
			}
			if entry.kind == EntryKind::Directory {
				match read_children(&entry.path).await {
					Ok(children) => state.stack.push(children.into_iter()),
					Err(e) => return Some((Err(e), state)),
				}
			}
			return Some((Ok(entry), state));
		}
	})
}

async fn read_children(dir: &Path) -> Result<Vec<LocalEntry>, SyncError> {
	let io_err = |e| SyncError::Io { path: dir.to_path_buf(), source: e };
	let mut reader = tokio::fs::read_dir(dir).await.map_err(io_err)?;
	let mut children = Vec::new();

	while let Some(entry) = reader.next_entry().await.map_err(io_err)? {
		let file_type = entry.file_type().await.map_err(io_err)?;
		let kind = if file_type.is_dir() {
			EntryKind::Directory
		} else if file_type.is_file() {
			EntryKind::File
		} else {
			continue;
		};
		children.push(LocalEntry { path: entry.path(), kind });
	}

	children.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
	Ok(children)
}


// vim: ts=4
