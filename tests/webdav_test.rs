//! WebDAV client wire behavior against a mock server

use std::sync::{Arc, Mutex};
use wiremock::matchers::{basic_auth, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use davsync::callbacks::NoCallback;
use davsync::connection::{ConnectionManager, Credentials, WebDavConnector};
use davsync::context::SyncContext;
use davsync::error::RemoteError;
use davsync::operation::{OperationOutcome, SyncAction, SyncOperation};
use davsync::paths::PathConfig;
use davsync::remote::{PutOptions, RemoteKind, RemoteStore, WebDavStore};

const COLLECTION: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:"><d:response><d:href>/dav/</d:href><d:propstat><d:prop>
<d:resourcetype><d:collection/></d:resourcetype>
</d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response></d:multistatus>"#;

const FILE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:"><d:response><d:href>/dav/a.txt</d:href><d:propstat><d:prop>
<d:resourcetype/><d:getcontentlength>42</d:getcontentlength>
</d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response></d:multistatus>"#;

fn store(server: &MockServer) -> WebDavStore {
	WebDavStore::new(&server.uri(), "", "").unwrap()
}

#[tokio::test]
async fn test_stat_collection_and_file() {
	let server = MockServer::start().await;
	Mock::given(method("PROPFIND"))
		.and(path("/dav"))
		.and(header("Depth", "0"))
		.respond_with(ResponseTemplate::new(207).set_body_string(COLLECTION))
		.mount(&server)
		.await;
	Mock::given(method("PROPFIND"))
		.and(path("/dav/a.txt"))
		.respond_with(ResponseTemplate::new(207).set_body_string(FILE))
		.mount(&server)
		.await;

	let store = store(&server);
	let dir = store.stat("/dav").await.unwrap();
	assert_eq!(dir.kind, RemoteKind::Directory);

	let file = store.stat("/dav/a.txt").await.unwrap();
	assert_eq!((file.kind, file.size), (RemoteKind::File, 42));
}

#[tokio::test]
async fn test_missing_entry() {
	let server = MockServer::start().await;
	Mock::given(method("PROPFIND"))
		.and(path("/dav/nope"))
		.respond_with(ResponseTemplate::new(404))
		.mount(&server)
		.await;

	let store = store(&server);
	assert!(matches!(store.stat("/dav/nope").await, Err(RemoteError::NotFound { .. })));
	assert!(!store.exists("/dav/nope").await.unwrap());
}

#[tokio::test]
async fn test_recursive_mkcol_tolerates_existing() {
	let server = MockServer::start().await;
	Mock::given(method("MKCOL"))
		.and(path("/dav"))
		.respond_with(ResponseTemplate::new(405))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("MKCOL"))
		.and(path("/dav/newdir"))
		.respond_with(ResponseTemplate::new(201))
		.expect(1)
		.mount(&server)
		.await;

	store(&server).create_directory("/dav/newdir", true).await.unwrap();
}

#[tokio::test]
async fn test_mkcol_failure_propagates() {
	let server = MockServer::start().await;
	Mock::given(method("MKCOL"))
		.respond_with(ResponseTemplate::new(403))
		.mount(&server)
		.await;

	let err = store(&server).create_directory("/locked", false).await;
	assert!(matches!(err, Err(RemoteError::Unauthorized { .. })));
}

#[tokio::test]
async fn test_put_streams_body_with_progress() {
	let server = MockServer::start().await;
	Mock::given(method("PUT"))
		.and(path("/dav/big.bin"))
		.respond_with(ResponseTemplate::new(201))
		.expect(1)
		.mount(&server)
		.await;

	let data: Vec<u8> = (0..150_000u32).map(|i| (i % 251) as u8).collect();
	let seen = Arc::new(Mutex::new(Vec::new()));
	let sink = seen.clone();
	let options = PutOptions::overwrite().with_progress(Arc::new(move |done, total| {
		sink.lock().unwrap().push((done, total));
	}));

	store(&server).put_file_contents("/dav/big.bin", data.clone(), options).await.unwrap();

	let requests = server.received_requests().await.unwrap();
	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].body, data);
	assert!(requests[0].headers.get("if-none-match").is_none());

	let seen = seen.lock().unwrap();
	assert!(seen.len() >= 2);
	assert_eq!(seen.last(), Some(&(150_000, 150_000)));
	assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[tokio::test]
async fn test_put_without_overwrite_sends_precondition() {
	let server = MockServer::start().await;
	Mock::given(method("PUT"))
		.and(path("/dav/a.txt"))
		.and(header("If-None-Match", "*"))
		.respond_with(ResponseTemplate::new(412))
		.mount(&server)
		.await;

	let err = store(&server).put_file_contents("/dav/a.txt", b"x".to_vec(), PutOptions::default()).await;
	assert!(matches!(err, Err(RemoteError::AlreadyExists { .. })));
}

#[tokio::test]
async fn test_put_missing_parent() {
	let server = MockServer::start().await;
	Mock::given(method("PUT"))
		.respond_with(ResponseTemplate::new(409))
		.mount(&server)
		.await;

	let err = store(&server).put_file_contents("/no/such/a.txt", b"x".to_vec(), PutOptions::overwrite()).await;
	assert!(matches!(err, Err(RemoteError::MissingParent { .. })));
}

#[tokio::test]
async fn test_delete() {
	let server = MockServer::start().await;
	Mock::given(method("DELETE"))
		.and(path("/dav/a.txt"))
		.respond_with(ResponseTemplate::new(204))
		.mount(&server)
		.await;
	Mock::given(method("DELETE"))
		.and(path("/dav/gone.txt"))
		.respond_with(ResponseTemplate::new(404))
		.mount(&server)
		.await;

	let store = store(&server);
	store.delete_file("/dav/a.txt").await.unwrap();
	assert!(matches!(store.delete_file("/dav/gone.txt").await, Err(RemoteError::NotFound { .. })));
}

#[tokio::test]
async fn test_basic_auth_is_sent() {
	let server = MockServer::start().await;
	Mock::given(method("PROPFIND"))
		.and(basic_auth("alice", "s3cret"))
		.respond_with(ResponseTemplate::new(207).set_body_string(COLLECTION))
		.mount(&server)
		.await;
	Mock::given(method("PROPFIND"))
		.respond_with(ResponseTemplate::new(401))
		.mount(&server)
		.await;

	let good = WebDavStore::new(&server.uri(), "alice", "s3cret").unwrap();
	assert!(good.stat("/").await.is_ok());

	let bad = WebDavStore::new(&server.uri(), "alice", "wrong").unwrap();
	assert!(matches!(bad.stat("/").await, Err(RemoteError::Unauthorized { .. })));
}

#[tokio::test]
async fn test_connection_probe() {
	let server = MockServer::start().await;
	Mock::given(method("PROPFIND"))
		.and(path("/"))
		.and(basic_auth("bob", "pw"))
		.respond_with(ResponseTemplate::new(207).set_body_string(COLLECTION))
		.mount(&server)
		.await;
	Mock::given(method("PROPFIND"))
		.respond_with(ResponseTemplate::new(401))
		.mount(&server)
		.await;

	let ctx = Arc::new(SyncContext::new(PathConfig::new("/l", "/r")));
	let manager = ConnectionManager::new(ctx.clone(), Arc::new(WebDavConnector), Arc::new(NoCallback));

	let wrong = Credentials { server_host: server.uri(), username: "bob".into(), password: "nope".into() };
	assert!(!manager.connect(&wrong).await.is_connected());
	assert!(!ctx.is_connected());

	let right = Credentials { password: "pw".into(), ..wrong };
	assert!(manager.reconnect(&right).await.is_connected());
	assert!(ctx.is_connected());

	let unreachable = Credentials { server_host: "http://127.0.0.1:9".into(), ..Default::default() };
	assert!(!manager.reconnect(&unreachable).await.is_connected());
	assert!(!ctx.is_connected());
}

#[tokio::test]
async fn test_operation_uploads_over_webdav() {
	let server = MockServer::start().await;
	Mock::given(method("PROPFIND"))
		.and(path("/dav/sync/src"))
		.respond_with(ResponseTemplate::new(404))
		.mount(&server)
		.await;
	Mock::given(method("MKCOL"))
		.respond_with(ResponseTemplate::new(201))
		.expect(3)
		.mount(&server)
		.await;
	Mock::given(method("PUT"))
		.and(path("/dav/sync/src/a.txt"))
		.respond_with(ResponseTemplate::new(201))
		.expect(1)
		.mount(&server)
		.await;

	let dir = tempfile::TempDir::new().unwrap();
	std::fs::create_dir(dir.path().join("src")).unwrap();
	let file = dir.path().join("src/a.txt");
	std::fs::write(&file, b"payload").unwrap();

	let config = PathConfig::new(dir.path().to_string_lossy(), "/dav/sync");
	let operation = SyncOperation::new(Arc::new(store(&server)), Arc::new(config), Arc::new(NoCallback));
	let outcome = operation.execute(&file, SyncAction::Create, false).await;
	assert_eq!(outcome, OperationOutcome::Uploaded { remote: "/dav/sync/src/a.txt".to_string(), bytes: 7 });

	let put = server
		.received_requests()
		.await
		.unwrap()
		.into_iter()
		.find(|r| r.method.as_str() == "PUT")
		.unwrap();
	assert_eq!(put.body, b"payload");
}

// vim: ts=4
