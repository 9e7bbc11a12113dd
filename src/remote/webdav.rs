//! WebDAV remote store over HTTP

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use std::time::Duration;

use super::{PutOptions, RemoteKind, RemoteResult, RemoteStat, RemoteStore};
use crate::error::{ConnectionError, RemoteError};
use crate::logging::*;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getcontentlength/>
  </d:prop>
</d:propfind>"#;

/// WebDAV client bound to one server and one set of credentials
#[derive(Debug, Clone)]
pub struct WebDavStore {
	client: Client,
	base_url: String,
	username: String,
	password: String,
}

impl WebDavStore {
	/// Bind a client to `server_host`. No request is made here.
	pub fn new(server_host: &str, username: &str, password: &str) -> Result<Self, ConnectionError> {
		if server_host.trim().is_empty() {
			return Err(ConnectionError::MissingHost);
		}
		let url = Url::parse(server_host).map_err(|e| ConnectionError::InvalidEndpoint {
			host: server_host.to_string(),
			message: e.to_string(),
		})?;
		if url.scheme() != "http" && url.scheme() != "https" {
			return Err(ConnectionError::InvalidEndpoint {
				host: server_host.to_string(),
				message: format!("unsupported scheme '{}'", url.scheme()),
			});
		}

		let client = Client::builder()
			.timeout(REQUEST_TIMEOUT)
			.build()
			.map_err(|e| ConnectionError::ClientBuild { message: e.to_string() })?;

		Ok(WebDavStore {
			client,
			base_url: server_host.trim_end_matches('/').to_string(),
			username: username.to_string(),
			password: password.to_string(),
		})
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	/// Full URL of a remote path, each segment percent-encoded
	pub fn url_for(&self, path: &str) -> String {
		let encoded: Vec<String> = path
			.split('/')
			.filter(|segment| !segment.is_empty())
			.map(|segment| urlencoding::encode(segment).into_owned())
			.collect();
		format!("{}/{}", self.base_url, encoded.join("/"))
	}

	fn request(&self, method: Method, path: &str) -> RequestBuilder {
		let builder = self.client.request(method, self.url_for(path));
		if self.username.is_empty() {
			builder
		} else {
			builder.basic_auth(&self.username, Some(&self.password))
		}
	}

	async fn send(&self, builder: RequestBuilder) -> RemoteResult<reqwest::Response> {
		builder.send().await.map_err(|e| RemoteError::Transport { message: e.to_string() })
	}

	async fn mkcol(&self, path: &str) -> RemoteResult<()> {
		let response = self.send(self.request(custom_method("MKCOL")?, path)).await?;
		let status = response.status();
		// 405 means the collection is already there
		if status.is_success() || status == StatusCode::METHOD_NOT_ALLOWED {
			Ok(())
		} else {
			Err(status_error("MKCOL", path, status))
		}
	}
}

fn custom_method(name: &str) -> RemoteResult<Method> {
	Method::from_bytes(name.as_bytes())
		.map_err(|e| RemoteError::InvalidRequest { message: e.to_string() })
}

fn status_error(method: &str, path: &str, status: StatusCode) -> RemoteError {
	match status {
		StatusCode::NOT_FOUND => RemoteError::NotFound { path: path.to_string() },
		StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
			RemoteError::Unauthorized { path: path.to_string() }
		}
		StatusCode::CONFLICT => RemoteError::MissingParent { path: path.to_string() },
		StatusCode::PRECONDITION_FAILED => RemoteError::AlreadyExists { path: path.to_string() },
		_ => RemoteError::Status {
			method: method.to_string(),
			path: path.to_string(),
			status: status.as_u16(),
		},
	}
}

/// Extract entry kind and size from a Depth 0 PROPFIND multistatus body
fn parse_propfind(body: &str) -> (RemoteKind, u64) {
	let lower = body.to_ascii_lowercase();
	let is_collection = element_body(&lower, "resourcetype").is_some_and(|inner| inner.contains("collection"));
	let kind = if is_collection { RemoteKind::Directory } else { RemoteKind::File };

	let size = element_body(&lower, "getcontentlength")
		.and_then(|digits| digits.trim().parse().ok())
		.unwrap_or(0);

	(kind, size)
}

/// Content of the first `<name>` element, any namespace prefix
fn element_body<'a>(body: &'a str, name: &str) -> Option<&'a str> {
	let suffix = format!("{}>", name);
	let mut from = 0;
	while let Some(pos) = body[from..].find(&suffix) {
		let name_start = from + pos;
		from = name_start + suffix.len();
		let Some(open) = body[..name_start].rfind('<') else {
			continue;
		};
		// `<name>` or `<ns:name>`; closing tags and longer names do not match
		let prefix = &body[open + 1..name_start];
		let is_open_tag = prefix.is_empty()
			|| prefix.strip_suffix(':').is_some_and(|ns| {
				ns.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
			});
		if !is_open_tag {
			continue;
		}
		let rest = &body[from..];
		return rest.find(&format!("</{}{}", prefix, suffix)).map(|end| &rest[..end]);
	}
	None
}

/// Cumulative prefixes of a remote path: `/a/b` yields `/a`, `/a/b`
fn path_prefixes(path: &str) -> Vec<String> {
	let mut prefixes = Vec::new();
	let mut current = String::new();
	for segment in path.split('/').filter(|s| !s.is_empty()) {
		current.push('/');
		current.push_str(segment);
		prefixes.push(current.clone());
	}
	prefixes
}

#[async_trait]
impl RemoteStore for WebDavStore {
	async fn stat(&self, path: &str) -> RemoteResult<RemoteStat> {
		let builder = self
			.request(custom_method("PROPFIND")?, path)
			.header("Depth", "0")
			.header("Content-Type", "application/xml; charset=utf-8")
			.body(PROPFIND_BODY);
		let response = self.send(builder).await?;
		let status = response.status();
		if !status.is_success() {
			return Err(status_error("PROPFIND", path, status));
		}

		let body = response.text().await.map_err(|e| RemoteError::Transport { message: e.to_string() })?;
		let (kind, size) = parse_propfind(&body);
		Ok(RemoteStat { path: path.to_string(), kind, size })
	}

	async fn exists(&self, path: &str) -> RemoteResult<bool> {
		match self.stat(path).await {
			Ok(_) => Ok(true),
			Err(RemoteError::NotFound { .. }) => Ok(false),
			Err(e) => Err(e),
		}
	}

	async fn create_directory(&self, path: &str, recursive: bool) -> RemoteResult<()> {
		let prefixes = path_prefixes(path);
		if recursive {
			for prefix in &prefixes {
				self.mkcol(prefix).await?;
			}
		} else if let Some(leaf) = prefixes.last() {
			self.mkcol(leaf).await?;
		}
		Ok(())
	}

	async fn put_file_contents(
		&self,
		path: &str,
		data: Vec<u8>,
		options: PutOptions,
	) -> RemoteResult<()> {
		let total = data.len() as u64;
		let progress = options.clone();
		let chunks: Vec<Vec<u8>> = data.chunks(UPLOAD_CHUNK_SIZE).map(<[u8]>::to_vec).collect();
		let mut sent = 0u64;
		let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
			sent += chunk.len() as u64;
			progress.report(sent, total);
			Ok::<Vec<u8>, std::io::Error>(chunk)
		}));

		let mut builder = self
			.request(Method::PUT, path)
			.header("Content-Type", "application/octet-stream")
			.header("Content-Length", total)
			.body(reqwest::Body::wrap_stream(stream));
		if !options.overwrite {
			builder = builder.header("If-None-Match", "*");
		}

		let response = self.send(builder).await?;
		let status = response.status();
		if !status.is_success() {
			return Err(status_error("PUT", path, status));
		}
		if total == 0 {
			options.report(0, 0);
		}
		debug!("PUT {} ({} bytes) -> {}", path, total, status);
		Ok(())
	}

	async fn delete_file(&self, path: &str) -> RemoteResult<()> {
		let response = self.send(self.request(Method::DELETE, path)).await?;
		let status = response.status();
		if status.is_success() {
			Ok(())
		} else {
			Err(status_error("DELETE", path, status))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_url_for_encodes_segments() {
		let store = WebDavStore::new("https://dav.example.com/remote.php/dav/", "", "").unwrap();
		assert_eq!(store.url_for("/"), "https://dav.example.com/remote.php/dav/");
		assert_eq!(
			store.url_for("/sync/my file#1.txt"),
			"https://dav.example.com/remote.php/dav/sync/my%20file%231.txt"
		);
	}

	#[test]
	fn test_rejects_bad_endpoints() {
		assert!(matches!(WebDavStore::new("", "u", "p"), Err(ConnectionError::MissingHost)));
		assert!(matches!(
			WebDavStore::new("not a url", "u", "p"),
			Err(ConnectionError::InvalidEndpoint { .. })
		));
		assert!(matches!(
			WebDavStore::new("ftp://host/dav", "u", "p"),
			Err(ConnectionError::InvalidEndpoint { .. })
		));
	}

	#[test]
	fn test_parse_propfind_collection() {
		let body = r#"<d:multistatus xmlns:d="DAV:"><d:response><d:propstat><d:prop>
			<d:resourcetype><d:collection/></d:resourcetype>
			</d:prop></d:propstat></d:response></d:multistatus>"#;
		assert_eq!(parse_propfind(body), (RemoteKind::Directory, 0));
	}

	#[test]
	fn test_parse_propfind_file() {
		let body = r#"<D:multistatus xmlns:D="DAV:"><D:response><D:propstat><D:prop>
			<D:resourcetype/><D:getcontentlength>1234</D:getcontentlength>
			</D:prop></D:propstat></D:response></D:multistatus>"#;
		assert_eq!(parse_propfind(body), (RemoteKind::File, 1234));
	}

	#[test]
	fn test_parse_propfind_ignores_collection_in_href() {
		let body = r#"<d:multistatus xmlns:d="DAV:"><d:response>
			<d:href>/dav/my:collection/notes.txt</d:href><d:propstat><d:prop>
			<d:resourcetype/><d:getcontentlength>7</d:getcontentlength>
			</d:prop></d:propstat></d:response></d:multistatus>"#;
		assert_eq!(parse_propfind(body), (RemoteKind::File, 7));

		let bare = "<multistatus><response><href>/collection/</href><propstat><prop>\
			<resourcetype><collection/></resourcetype></prop></propstat></response></multistatus>";
		assert_eq!(parse_propfind(bare), (RemoteKind::Directory, 0));
	}

	#[test]
	fn test_path_prefixes() {
		assert_eq!(path_prefixes("/a/b/c"), vec!["/a", "/a/b", "/a/b/c"]);
		assert_eq!(path_prefixes("a//b/"), vec!["/a", "/a/b"]);
		assert!(path_prefixes("/").is_empty());
	}

	#[test]
	fn test_status_mapping() {
		assert_eq!(
			status_error("PUT", "/x", StatusCode::CONFLICT),
			RemoteError::MissingParent { path: "/x".to_string() }
		);
		assert_eq!(
			status_error("DELETE", "/x", StatusCode::INTERNAL_SERVER_ERROR),
			RemoteError::Status { method: "DELETE".to_string(), path: "/x".to_string(), status: 500 }
		);
	}
}

// vim: ts=4
