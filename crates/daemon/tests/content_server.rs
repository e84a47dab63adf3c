use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use atelier_common::types::{OwnerId, WorkspacePatch, WorkspaceRecord};
use atelier_daemon::content::server::{build_router, ContentState};
use atelier_daemon::registry::WorkspaceRegistry;
use atelier_daemon::scope::ScopeCache;
use atelier_daemon::store::workspaces::{SqliteWorkspaceStore, WorkspaceStore};
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

const OWNER: i64 = 1;
const CSP: &str = "default-src 'self'";

struct Fixture {
    router: Router,
    registry: Arc<WorkspaceRegistry>,
    root: TempDir,
}

async fn fixture() -> Fixture {
    let store = SqliteWorkspaceStore::in_memory().expect("in-memory store should open");
    let registry = Arc::new(WorkspaceRegistry::new(Arc::new(store)));
    let root = TempDir::new().expect("tempdir should be created");

    registry
        .set(
            OWNER,
            "garden",
            WorkspacePatch::rename("garden")
                .with_local_files_path(root.path().to_string_lossy().into_owned()),
        )
        .await
        .expect("workspace should be registered");

    Fixture { router: router_for(Arc::clone(&registry)), registry, root }
}

fn router_for(registry: Arc<WorkspaceRegistry>) -> Router {
    build_router(ContentState {
        registry,
        scopes: Arc::new(ScopeCache::new(8)),
        owner_id: OWNER,
        csp: HeaderValue::from_static(CSP),
    })
}

/// A store whose database has gone away.
struct UnavailableStore;

impl WorkspaceStore for UnavailableStore {
    fn get(&self, _owner_id: OwnerId, _name: &str) -> anyhow::Result<Option<WorkspaceRecord>> {
        Err(anyhow!("meta.db is unavailable"))
    }

    fn get_by_publish_target(
        &self,
        _owner_id: OwnerId,
        _url: &str,
    ) -> anyhow::Result<Option<WorkspaceRecord>> {
        Err(anyhow!("meta.db is unavailable"))
    }

    fn all(&self, _owner_id: OwnerId) -> anyhow::Result<Vec<WorkspaceRecord>> {
        Err(anyhow!("meta.db is unavailable"))
    }

    fn name_exists(&self, _name: &str) -> anyhow::Result<bool> {
        Err(anyhow!("meta.db is unavailable"))
    }

    fn upsert(&self, _record: &WorkspaceRecord) -> anyhow::Result<()> {
        Err(anyhow!("meta.db is unavailable"))
    }

    fn delete(&self, _owner_id: OwnerId, _name: &str) -> anyhow::Result<bool> {
        Err(anyhow!("meta.db is unavailable"))
    }
}

fn write(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directory should be created");
    }
    fs::write(path, contents).expect("fixture file should be written");
}

async fn get(router: &Router, host: &str, path: &str, range: Option<&str>) -> Response {
    let mut builder = Request::builder().uri(path).header(header::HOST, host);
    if let Some(range) = range {
        builder = builder.header(header::RANGE, range);
    }
    let request = builder.body(Body::empty()).expect("request should build");
    router.clone().oneshot(request).await.expect("router should respond")
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.expect("body should be readable").to_vec()
}

async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).expect("body should be utf-8")
}

#[tokio::test]
async fn serves_whole_file_with_headers() {
    let fx = fixture().await;
    write(fx.root.path(), "hello.txt", b"hello world");

    let response = get(&fx.router, "garden.localhost:9340", "/hello.txt", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_LENGTH], "11");
    assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=60");
    assert_eq!(headers[header::CONTENT_SECURITY_POLICY], CSP);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));
    assert_eq!(body_bytes(response).await, b"hello world");
}

#[tokio::test]
async fn byte_range_returns_partial_content() {
    let fx = fixture().await;
    let content: Vec<u8> = (0..100u8).collect();
    write(fx.root.path(), "a.txt", &content);

    let response = get(&fx.router, "garden.localhost", "/a.txt", Some("bytes=10-19")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 10-19/100");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
    assert_eq!(body_bytes(response).await, &content[10..20]);
}

#[tokio::test]
async fn unsatisfiable_range_falls_back_to_full_body() {
    let fx = fixture().await;
    write(fx.root.path(), "a.txt", b"0123456789");

    let response = get(&fx.router, "garden.localhost", "/a.txt", Some("bytes=50-60")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_RANGE).is_none());
    assert_eq!(body_bytes(response).await, b"0123456789");
}

#[tokio::test]
async fn directory_with_index_serves_index() {
    let fx = fixture().await;
    write(fx.root.path(), "index.html", b"<h1>home</h1>");
    write(fx.root.path(), "docs/index.html", b"<h1>docs</h1>");

    let root = get(&fx.router, "garden.localhost", "/", None).await;
    assert_eq!(root.status(), StatusCode::OK);
    assert!(root.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
    assert_eq!(body_text(root).await, "<h1>home</h1>");

    let docs = get(&fx.router, "garden.localhost", "/docs/", None).await;
    assert_eq!(body_text(docs).await, "<h1>docs</h1>");
}

#[tokio::test]
async fn directory_without_index_renders_sorted_listing() {
    let fx = fixture().await;
    write(fx.root.path(), "site/b.txt", b"b");
    write(fx.root.path(), "site/A.txt", b"a");
    write(fx.root.path(), "site/<x>.txt", b"x");
    fs::create_dir_all(fx.root.path().join("site/zeta")).unwrap();

    let response = get(&fx.router, "garden.localhost", "/site", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
    assert_eq!(response.headers()[header::CONTENT_SECURITY_POLICY], CSP);

    let html = body_text(response).await;
    assert!(html.contains("<a href=\"..\">..</a>"));
    assert!(html.contains("&lt;x&gt;.txt"));
    assert!(!html.contains("<x>.txt"));
    assert!(html.contains("4 files"));

    let zeta = html.find(">zeta<").expect("directory should be listed");
    let a = html.find(">A.txt<").expect("A.txt should be listed");
    let b = html.find(">b.txt<").expect("b.txt should be listed");
    assert!(zeta < a, "directories come first");
    assert!(a < b, "files sort case-insensitively");
}

#[tokio::test]
async fn root_listing_has_no_parent_link() {
    let fx = fixture().await;
    write(fx.root.path(), "only.txt", b"1");

    let html = body_text(get(&fx.router, "garden.localhost", "/", None).await).await;
    assert!(!html.contains("href=\"..\""));
    assert!(html.contains("1 file<"));
}

#[tokio::test]
async fn missing_path_is_not_found() {
    let fx = fixture().await;

    let response = get(&fx.router, "garden.localhost", "/nope.txt", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[header::CONTENT_SECURITY_POLICY], CSP);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
}

#[tokio::test]
async fn unknown_workspace_names_escaped_host() {
    let fx = fixture().await;

    let response = get(&fx.router, "orchard.localhost:9340", "/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[header::CONTENT_SECURITY_POLICY], CSP);
    assert!(body_text(response).await.contains("No workspace found at orchard.localhost:9340"));
}

#[tokio::test]
async fn unknown_workspace_page_shows_host_as_sent() {
    let fx = fixture().await;

    let response = get(&fx.router, "Orchard.Example.localhost", "/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("No workspace found at Orchard.Example.localhost"));
}

#[tokio::test]
async fn lookup_failure_is_server_error_with_its_text() {
    let registry = Arc::new(WorkspaceRegistry::new(Arc::new(UnavailableStore)));
    let router = router_for(registry);

    let response = get(&router, "garden.localhost", "/a.txt", None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[header::CONTENT_SECURITY_POLICY], CSP);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
    assert!(body_text(response).await.contains("meta.db is unavailable"));
}

#[tokio::test]
async fn workspace_without_directory_is_not_found() {
    let fx = fixture().await;
    fx.registry
        .set(OWNER, "meadow", WorkspacePatch::rename("meadow"))
        .await
        .expect("workspace should be registered");

    let response = get(&fx.router, "meadow.localhost", "/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_file_has_no_content_type() {
    let fx = fixture().await;
    write(fx.root.path(), "empty.txt", b"");

    let response = get(&fx.router, "garden.localhost", "/empty.txt", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    assert_eq!(response.headers()[header::CONTENT_SECURITY_POLICY], CSP);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn percent_encoded_paths_are_decoded() {
    let fx = fixture().await;
    write(fx.root.path(), "my notes.txt", b"notes");

    let response = get(&fx.router, "garden.localhost", "/my%20notes.txt", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"notes");
}

#[tokio::test]
async fn host_lookup_is_case_insensitive() {
    let fx = fixture().await;
    write(fx.root.path(), "a.txt", b"a");

    let response = get(&fx.router, "GARDEN.localhost", "/a.txt", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn mixed_case_workspace_is_served_and_is_one_workspace() {
    let fx = fixture().await;
    let site = TempDir::new().unwrap();
    write(site.path(), "a.txt", b"site");

    let record = fx
        .registry
        .set(
            OWNER,
            "MySite",
            WorkspacePatch::default()
                .with_local_files_path(site.path().to_string_lossy().into_owned()),
        )
        .await
        .expect("mixed-case name should be accepted");
    assert_eq!(record.name, "mysite");

    let response = get(&fx.router, "MySite.localhost", "/a.txt", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"site");

    fx.registry
        .set(
            OWNER,
            "mysite",
            WorkspacePatch::default()
                .with_local_files_path(site.path().to_string_lossy().into_owned()),
        )
        .await
        .expect("lowercase spelling should update the same workspace");

    let names: Vec<String> =
        fx.registry.list(OWNER).unwrap().into_iter().map(|record| record.name).collect();
    assert_eq!(names, vec!["garden", "mysite"]);
    assert!(fx.registry.remove(OWNER, "MYSITE").await.unwrap());
    assert!(fx.registry.get(OWNER, "mysite").unwrap().is_none());
}

#[tokio::test]
async fn rebinding_a_workspace_serves_the_new_directory() {
    let fx = fixture().await;
    write(fx.root.path(), "which.txt", b"first");
    let second = TempDir::new().unwrap();
    write(second.path(), "which.txt", b"second");

    let before = get(&fx.router, "garden.localhost", "/which.txt", None).await;
    assert_eq!(body_bytes(before).await, b"first");

    fx.registry
        .set(
            OWNER,
            "garden",
            WorkspacePatch::default()
                .with_local_files_path(second.path().to_string_lossy().into_owned()),
        )
        .await
        .unwrap();

    let after = get(&fx.router, "garden.localhost", "/which.txt", None).await;
    assert_eq!(body_bytes(after).await, b"second");
}

#[tokio::test]
async fn responses_carry_request_id() {
    let fx = fixture().await;
    write(fx.root.path(), "a.txt", b"a");

    let generated = get(&fx.router, "garden.localhost", "/a.txt", None).await;
    let id = generated.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());

    let request = Request::builder()
        .uri("/a.txt")
        .header(header::HOST, "garden.localhost")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let echoed = fx.router.clone().oneshot(request).await.unwrap();
    assert_eq!(echoed.headers()["x-request-id"], "req-42");
}
