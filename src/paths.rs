//! Local-to-remote path mapping and hidden entry detection
//!
//! Remote paths are never stored. They are recomputed from the current
//! [`PathConfig`] every time an operation needs one, so they always follow
//! the latest configuration.

use std::path::{Component, Path};

/// Token in `localPath` that stands for the workspace root
pub const WORKSPACE_PLACEHOLDER: &str = "${workspaceFolder}";

/// Local and remote roots of the mirrored tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathConfig {
	/// Absolute local filesystem path of the watch root
	pub local_base_path: String,

	/// Remote root, forward-slash separated, no trailing slash
	pub remote_base_path: String,
}

impl PathConfig {
	pub fn new(local_base_path: impl Into<String>, remote_base_path: impl Into<String>) -> Self {
		PathConfig {
			local_base_path: local_base_path.into(),
			remote_base_path: remote_base_path.into(),
		}
	}

	/// Both roots are set, so operations may run
	pub fn is_complete(&self) -> bool {
		!self.local_base_path.is_empty() && !self.remote_base_path.is_empty()
	}

	pub fn remote_path(&self, local_path: &Path) -> String {
		map_remote_path(local_path, self)
	}

	pub fn is_hidden(&self, path: &Path) -> bool {
		is_hidden(path, self)
	}
}

/// Map a local absolute path to its remote counterpart.
///
/// The local root is removed with a plain first-occurrence string replace,
/// case-sensitive and not anchored to path boundaries. A path that does not
/// start with the root therefore maps to an unintended remote path instead of
/// failing.
pub fn map_remote_path(local_path: &Path, config: &PathConfig) -> String {
	let local = to_forward_slashes(&local_path.to_string_lossy());
	let base = to_forward_slashes(&config.local_base_path);

	let suffix = if base.is_empty() { local } else { local.replacen(base.as_str(), "", 1) };
	let suffix = suffix.strip_prefix('/').unwrap_or(&suffix);
	let suffix = strip_drive_letter(suffix).trim_start_matches('/');

	let remote_base = config.remote_base_path.trim_end_matches('/');
	let joined = if suffix.is_empty() {
		remote_base.to_string()
	} else {
		format!("{}/{}", remote_base, suffix)
	};

	let collapsed = collapse_slashes(&joined);
	if collapsed.is_empty() {
		"/".to_string()
	} else {
		collapsed
	}
}

/// Whether any component of `path` relative to the local root starts with a dot.
///
/// `.` and `..` produced by path normalization are resolved before testing.
pub fn is_hidden(path: &Path, config: &PathConfig) -> bool {
	let target = normalized_components(path);
	let base = normalized_components(Path::new(&config.local_base_path));

	let common = target.iter().zip(base.iter()).take_while(|(a, b)| a == b).count();
	target[common..].iter().any(|part| part.starts_with('.'))
}

/// Parent collection of a remote path
pub fn remote_parent(remote_path: &str) -> String {
	match remote_path.trim_end_matches('/').rsplit_once('/') {
		Some(("", _)) | None => "/".to_string(),
		Some((parent, _)) => parent.to_string(),
	}
}

/// Replace the workspace placeholder in a configured path
pub fn resolve_placeholder(value: &str, workspace_root: &Path) -> String {
	if value.contains(WORKSPACE_PLACEHOLDER) {
		value.replace(WORKSPACE_PLACEHOLDER, &workspace_root.to_string_lossy())
	} else {
		value.to_string()
	}
}

fn to_forward_slashes(s: &str) -> String {
	s.replace('\\', "/")
}

fn strip_drive_letter(s: &str) -> &str {
	let bytes = s.as_bytes();
	if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
		&s[2..]
	} else {
		s
	}
}

fn collapse_slashes(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	let mut prev_slash = false;
	for c in s.chars() {
		if c == '/' {
			if prev_slash {
				continue;
			}
			prev_slash = true;
		} else {
			prev_slash = false;
		}
		out.push(c);
	}
	out
}

fn normalized_components(path: &Path) -> Vec<String> {
	let mut parts: Vec<String> = Vec::new();
	for component in path.components() {
		match component {
			Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
			Component::ParentDir => {
				parts.pop();
			}
			Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
		}
	}
	parts
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	fn config() -> PathConfig {
		PathConfig::new("/home/u/proj", "/dav/sync")
	}

	#[test]
	fn test_maps_path_inside_root() {
		let remote = map_remote_path(Path::new("/home/u/proj/src/a.txt"), &config());
		assert_eq!(remote, "/dav/sync/src/a.txt");
	}

	#[test]
	fn test_strips_drive_letter() {
		let remote = map_remote_path(Path::new("C:/home/u/proj/a.txt"), &config());
		assert_eq!(remote, "/dav/sync/a.txt");
	}

	#[test]
	fn test_backslash_paths_are_normalized() {
		let config = PathConfig::new("C:\\Users\\u\\proj", "/dav/sync/");
		let remote = map_remote_path(Path::new("C:\\Users\\u\\proj\\src\\a.txt"), &config);
		assert_eq!(remote, "/dav/sync/src/a.txt");
	}

	#[test]
	fn test_no_double_slashes() {
		let config = PathConfig::new("/home/u/proj/", "/dav/sync/");
		let remote = map_remote_path(Path::new("/home/u/proj//src/a.txt"), &config);
		assert_eq!(remote, "/dav/sync/src/a.txt");
	}

	#[test]
	fn test_root_maps_to_remote_root() {
		assert_eq!(map_remote_path(Path::new("/home/u/proj"), &config()), "/dav/sync");
		let config = PathConfig::new("/home/u/proj", "/");
		assert_eq!(map_remote_path(Path::new("/home/u/proj"), &config), "/");
		assert_eq!(map_remote_path(Path::new("/home/u/proj/a"), &config), "/a");
	}

	#[test]
	fn test_prefix_stripping_is_not_boundary_aware() {
		// The root text is removed wherever it first occurs
		let remote = map_remote_path(Path::new("/x/home/u/proj/f.txt"), &config());
		assert_eq!(remote, "/dav/sync/x/f.txt");

		// A sibling directory sharing the root as a string prefix
		let remote = map_remote_path(Path::new("/home/u/project/f.txt"), &config());
		assert_eq!(remote, "/dav/sync/ect/f.txt");

		// Case differences leave the path untouched
		let remote = map_remote_path(Path::new("/Home/u/proj/f.txt"), &config());
		assert_eq!(remote, "/dav/sync/Home/u/proj/f.txt");
	}

	#[test]
	fn test_hidden_components() {
		let config = config();
		assert!(is_hidden(Path::new("/home/u/proj/.git/config"), &config));
		assert!(is_hidden(Path::new("/home/u/proj/src/.env"), &config));
		assert!(!is_hidden(Path::new("/home/u/proj/src/main.rs"), &config));
		assert!(!is_hidden(Path::new("/home/u/proj/src/env"), &config));
	}

	#[test]
	fn test_hidden_ignores_dot_components() {
		let config = config();
		assert!(!is_hidden(Path::new("/home/u/proj/./src/a.txt"), &config));
		assert!(!is_hidden(Path::new("/home/u/proj/src/../lib/a.txt"), &config));
		assert!(is_hidden(Path::new("/home/u/proj/src/../.cache/a"), &config));
	}

	#[test]
	fn test_hidden_root_itself_is_not_hidden() {
		let config = PathConfig::new("/home/u/.projects/p", "/dav");
		assert!(!is_hidden(Path::new("/home/u/.projects/p/a.txt"), &config));
		assert!(!is_hidden(Path::new("/home/u/.projects/p"), &config));
	}

	#[test]
	fn test_hidden_outside_root() {
		let config = config();
		assert!(is_hidden(Path::new("/home/u/.config/x"), &config));
		assert!(!is_hidden(Path::new("/home/u/other/x"), &config));
	}

	#[test]
	fn test_remote_parent() {
		assert_eq!(remote_parent("/dav/sync/src/a.txt"), "/dav/sync/src");
		assert_eq!(remote_parent("/a.txt"), "/");
		assert_eq!(remote_parent("a.txt"), "/");
	}

	#[test]
	fn test_resolve_placeholder() {
		let root = PathBuf::from("/work/space");
		assert_eq!(resolve_placeholder("${workspaceFolder}", &root), "/work/space");
		assert_eq!(resolve_placeholder("${workspaceFolder}/sub", &root), "/work/space/sub");
		assert_eq!(resolve_placeholder("/abs/path", &root), "/abs/path");
	}

	#[test]
	fn test_completeness() {
		assert!(config().is_complete());
		assert!(!PathConfig::new("", "/dav").is_complete());
		assert!(!PathConfig::default().is_complete());
	}
}

// vim: ts=4
