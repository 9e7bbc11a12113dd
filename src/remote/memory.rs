//! In-process remote store
//!
//! Keeps collections and files in memory and records every call. Used by the
//! test suite and by `push --dry-run`.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

use super::{PutOptions, RemoteKind, RemoteResult, RemoteStat, RemoteStore};
use crate::error::RemoteError;

/// A call made against a [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
	Stat(String),
	Exists(String),
	CreateDirectory(String),
	Put(String),
	Delete(String),
}

impl RemoteCall {
	pub fn path(&self) -> &str {
		match self {
			RemoteCall::Stat(p)
			| RemoteCall::Exists(p)
			| RemoteCall::CreateDirectory(p)
			| RemoteCall::Put(p)
			| RemoteCall::Delete(p) => p,
		}
	}
}

#[derive(Debug, Default)]
struct Inner {
	dirs: BTreeSet<String>,
	files: BTreeMap<String, Vec<u8>>,
	calls: Vec<RemoteCall>,
	failing_puts: HashSet<String>,
	offline: bool,
}

/// Remote store kept entirely in memory
#[derive(Debug)]
pub struct MemoryStore {
	inner: Mutex<Inner>,
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryStore {
	/// Create a store containing only the root collection
	pub fn new() -> Self {
		let mut inner = Inner::default();
		inner.dirs.insert("/".to_string());
		MemoryStore { inner: Mutex::new(inner) }
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
		self.inner.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Make every call fail with a transport error
	pub fn set_offline(&self, offline: bool) {
		self.lock().offline = offline;
	}

	/// Make uploads to `path` fail
	pub fn fail_put(&self, path: impl Into<String>) {
		self.lock().failing_puts.insert(path.into());
	}

	pub fn has_directory(&self, path: &str) -> bool {
		self.lock().dirs.contains(&normalize(path))
	}

	pub fn file(&self, path: &str) -> Option<Vec<u8>> {
		self.lock().files.get(&normalize(path)).cloned()
	}

	pub fn file_paths(&self) -> Vec<String> {
		self.lock().files.keys().cloned().collect()
	}

	pub fn calls(&self) -> Vec<RemoteCall> {
		self.lock().calls.clone()
	}

	pub fn count_calls(&self, filter: impl Fn(&RemoteCall) -> bool) -> usize {
		self.lock().calls.iter().filter(|c| filter(c)).count()
	}

	pub fn clear_calls(&self) {
		self.lock().calls.clear();
	}

	fn record(&self, call: RemoteCall) -> RemoteResult<std::sync::MutexGuard<'_, Inner>> {
		let mut inner = self.lock();
		inner.calls.push(call);
		if inner.offline {
			return Err(RemoteError::Transport { message: "connection refused".to_string() });
		}
		Ok(inner)
	}
}

fn normalize(path: &str) -> String {
	let trimmed = path.trim_end_matches('/');
	if trimmed.is_empty() {
		"/".to_string()
	} else if trimmed.starts_with('/') {
		trimmed.to_string()
	} else {
		format!("/{}", trimmed)
	}
}

fn parent_of(path: &str) -> String {
	match path.rsplit_once('/') {
		Some(("", _)) | None => "/".to_string(),
		Some((parent, _)) => parent.to_string(),
	}
}

#[async_trait]
impl RemoteStore for MemoryStore {
	async fn stat(&self, path: &str) -> RemoteResult<RemoteStat> {
		let path = normalize(path);
		let inner = self.record(RemoteCall::Stat(path.clone()))?;
		if inner.dirs.contains(&path) {
			return Ok(RemoteStat { path, kind: RemoteKind::Directory, size: 0 });
		}
		match inner.files.get(&path) {
			Some(data) => {
				let size = data.len() as u64;
				Ok(RemoteStat { path, kind: RemoteKind::File, size })
			}
			None => Err(RemoteError::NotFound { path }),
		}
	}

	async fn exists(&self, path: &str) -> RemoteResult<bool> {
		let path = normalize(path);
		let inner = self.record(RemoteCall::Exists(path.clone()))?;
		Ok(inner.dirs.contains(&path) || inner.files.contains_key(&path))
	}

	async fn create_directory(&self, path: &str, recursive: bool) -> RemoteResult<()> {
		let path = normalize(path);
		let mut inner = self.record(RemoteCall::CreateDirectory(path.clone()))?;
		if inner.files.contains_key(&path) {
			return Err(RemoteError::AlreadyExists { path });
		}
		if !recursive && !inner.dirs.contains(&parent_of(&path)) {
			return Err(RemoteError::MissingParent { path });
		}
		let mut current = path;
		while current != "/" {
			let parent = parent_of(&current);
			inner.dirs.insert(current);
			current = parent;
		}
		Ok(())
	}

	async fn put_file_contents(
		&self,
		path: &str,
		data: Vec<u8>,
		options: PutOptions,
	) -> RemoteResult<()> {
		let path = normalize(path);
		{
			let mut inner = self.record(RemoteCall::Put(path.clone()))?;
			if inner.failing_puts.contains(&path) {
				return Err(RemoteError::Status {
					method: "PUT".to_string(),
					path,
					status: 507,
				});
			}
			if !inner.dirs.contains(&parent_of(&path)) {
				return Err(RemoteError::MissingParent { path });
			}
			if !options.overwrite && inner.files.contains_key(&path) {
				return Err(RemoteError::AlreadyExists { path });
			}
			inner.files.insert(path, data.clone());
		}
		let total = data.len() as u64;
		options.report(total, total);
		Ok(())
	}

	async fn delete_file(&self, path: &str) -> RemoteResult<()> {
		let path = normalize(path);
		let mut inner = self.record(RemoteCall::Delete(path.clone()))?;
		if inner.files.remove(&path).is_some() {
			return Ok(());
		}
		if inner.dirs.remove(&path) {
			let prefix = format!("{}/", path);
			inner.dirs.retain(|d| !d.starts_with(&prefix));
			inner.files.retain(|f, _| !f.starts_with(&prefix));
			return Ok(());
		}
		Err(RemoteError::NotFound { path })
	}
}


// vim: ts=4
