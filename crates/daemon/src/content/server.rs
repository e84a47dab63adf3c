// HTTP bridge for the content responder.
//
// `http://<name>.localhost:<port>/<path>` is treated as
// `workspace://<name>/<path>`: the first DNS label of the Host header picks
// the workspace.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use atelier_common::types::OwnerId;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};
use uuid::Uuid;

use super::listing::escape_html;
use super::{error_page, serve, ContentRequest};
use crate::registry::WorkspaceRegistry;
use crate::scope::{Scope, ScopeCache};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct ContentState {
    pub registry: Arc<WorkspaceRegistry>,
    pub scopes: Arc<ScopeCache>,
    pub owner_id: OwnerId,
    pub csp: HeaderValue,
}

pub fn build_router(state: ContentState) -> Router {
    apply_middleware(Router::new().fallback(serve_workspace).with_state(state))
}

fn apply_middleware(router: Router) -> Router {
    router
        .layer(middleware::from_fn(request_context_middleware))
        .layer(middleware::from_fn(panic_handler))
}

/// Serve until a message arrives on `shutdown`.
pub async fn serve_http(
    listener: TcpListener,
    state: ContentState,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("failed to read content listener address")?;
    info!(listen_addr = %addr, "content server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .context("content server exited unexpectedly")
}

async fn serve_workspace(
    State(state): State<ContentState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let host = request_host(&headers, &uri);
    let workspace = workspace_label(host);
    let range = headers.get(header::RANGE).and_then(|value| value.to_str().ok());

    let scope = match lookup_scope(&state, &workspace).await {
        Ok(scope) => scope,
        Err(err) => {
            error!(%workspace, error = %err, "workspace lookup failed");
            let message = escape_html(&err.to_string());
            return error_page(StatusCode::INTERNAL_SERVER_ERROR, &message, &state.csp);
        }
    };

    let content = ContentRequest { host, path: uri.path(), range, csp: &state.csp };
    serve(content, scope).await
}

async fn lookup_scope(state: &ContentState, name: &str) -> anyhow::Result<Option<Arc<Scope>>> {
    if name.is_empty() {
        return Ok(None);
    }
    let root = state
        .registry
        .get(state.owner_id, name)?
        .and_then(|record| record.bound_directory().map(ToOwned::to_owned));
    match root {
        Some(root) => Ok(Some(state.scopes.resolve(root).await)),
        None => Ok(None),
    }
}

/// The Host header as sent, falling back to the authority of an absolute URI.
fn request_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> &'a str {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.host())
        .unwrap_or_default()
}

/// First DNS label of `host`, lowercased, without the port.
fn workspace_label(host: &str) -> String {
    let host = host.rsplit_once(':').map_or(host, |(host, _port)| host);
    host.split('.').next().unwrap_or_default().to_ascii_lowercase()
}

async fn panic_handler(request: Request<Body>, next: Next) -> Response {
    match tokio::spawn(async move { next.run(request).await }).await {
        Ok(response) => response,
        Err(join_error) => {
            error!(?join_error, "request handling panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn request_context_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let mut response = next.run(request).await;

    if let Ok(request_id_header) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, request_id_header);
    }

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started_at.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}
