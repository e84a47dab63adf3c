// Content responder: answers `workspace://<name>/<path>` reads against a scope.
//
// Status mapping:
// - no scope, bad path, missing entry → 404
// - directory → its index.html, else a generated listing
// - file → 200 or 206, streamed after a short peek used for the MIME type
// - anything else → 500 with the error text

pub mod listing;
pub mod mime;
pub mod range;
pub mod server;

use std::io;
use std::ops::RangeInclusive;
use std::sync::Arc;

use anyhow::{Context, Result};
use atelier_common::path::{join_relative, normalize_request_path};
use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use bytes::Bytes;
use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::warn;

use crate::scope::Scope;
use listing::{escape_html, render_listing, DirectoryEntry};

const CACHE_CONTROL: &str = "public, max-age=60";
const HTML_UTF8: &str = "text/html; charset=utf-8";
const STREAM_CHUNK_BYTES: usize = 64 * 1024;

/// The parts of an incoming request the responder looks at.
#[derive(Debug, Clone, Copy)]
pub struct ContentRequest<'a> {
    /// Host as the client sent it, used only in the "no workspace" page.
    pub host: &'a str,
    /// Raw (still percent-encoded) request path.
    pub path: &'a str,
    /// `Range` header value, if any.
    pub range: Option<&'a str>,
    /// Sent verbatim as `Content-Security-Policy` on every response.
    pub csp: &'a HeaderValue,
}

/// Serve `request` from `scope`. `None` means the workspace is unknown or
/// has no bound directory.
pub async fn serve(request: ContentRequest<'_>, scope: Option<Arc<Scope>>) -> Response<Body> {
    let Some(scope) = scope else {
        let message = format!("No workspace found at {}", escape_html(request.host));
        return error_page(StatusCode::NOT_FOUND, &message, request.csp);
    };

    match serve_scoped(&request, &scope).await {
        Ok(response) => response,
        Err(error) => {
            warn!(host = request.host, path = request.path, error = %error, "content request failed");
            let message = escape_html(&format!("{error:#}"));
            error_page(StatusCode::INTERNAL_SERVER_ERROR, &message, request.csp)
        }
    }
}

async fn serve_scoped(request: &ContentRequest<'_>, scope: &Scope) -> Result<Response<Body>> {
    let Ok(mut rel) = normalize_request_path(request.path) else {
        return Ok(not_found(request.csp));
    };
    let Ok(mut stat) = scope.stat(&rel).await else {
        return Ok(not_found(request.csp));
    };

    if stat.is_directory {
        let index = join_relative(&rel, "index.html");
        if let Ok(index_stat) = scope.stat(&index).await {
            rel = index;
            stat = index_stat;
        }
    }

    if stat.is_directory {
        let html = render_directory(scope, &rel).await;
        let mut response = Response::new(Body::from(html));
        response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        response.headers_mut().insert(header::CONTENT_SECURITY_POLICY, request.csp.clone());
        return Ok(response);
    }

    serve_file(request, scope, &rel, stat.size).await
}

async fn render_directory(scope: &Scope, rel: &str) -> String {
    let names = scope.read_dir(rel).await.unwrap_or_default();
    let stats = join_all(names.into_iter().map(|name| async move {
        let path = join_relative(rel, &name);
        let stat = scope.stat(&path).await.ok()?;
        Some(DirectoryEntry { name, path, is_directory: stat.is_directory })
    }))
    .await;

    render_listing(rel, stats.into_iter().flatten().collect())
}

async fn serve_file(
    request: &ContentRequest<'_>,
    scope: &Scope,
    rel: &str,
    size: u64,
) -> Result<Response<Body>> {
    let range = request.range.and_then(|header| range::parse_range(header, size));

    match scope.open(rel, range.clone()).await {
        Ok(reader) => respond_with_reader(request, rel, size, range, reader).await,
        Err(error) => {
            warn!(path = rel, error = %error, "failed to open file");
            Ok(error_page(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file", request.csp))
        }
    }
}

async fn respond_with_reader<R>(
    request: &ContentRequest<'_>,
    rel: &str,
    size: u64,
    range: Option<RangeInclusive<u64>>,
    mut reader: R,
) -> Result<Response<Body>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let peek = match peek(&mut reader).await {
        Ok(peek) => peek,
        Err(error) => {
            warn!(path = rel, error = %error, "failed to read file before headers");
            return Ok(error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read file",
                request.csp,
            ));
        }
    };

    if peek.is_empty() {
        let mut response = Response::new(Body::empty());
        response.headers_mut().insert(header::CONTENT_SECURITY_POLICY, request.csp.clone());
        return Ok(response);
    }

    let mime = mime::identify(rel, &peek);
    let mut response = Response::new(body_stream(rel.to_string(), peek, reader));
    if range.is_some() {
        *response.status_mut() = StatusCode::PARTIAL_CONTENT;
    }

    let headers = response.headers_mut();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    match range {
        Some(range) => {
            let (start, end) = (*range.start(), *range.end());
            headers.insert(
                header::CONTENT_RANGE,
                HeaderValue::from_str(&format!("bytes {start}-{end}/{size}"))
                    .context("invalid Content-Range value")?,
            );
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(end - start + 1));
        }
        None if size > 0 => {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
        }
        None => {}
    }
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&mime).context("invalid Content-Type value")?,
    );
    headers.insert(header::CONTENT_SECURITY_POLICY, request.csp.clone());
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    Ok(response)
}

/// Read up to `mime::SNIFF_LEN` bytes, stopping early only at EOF.
async fn peek<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; mime::SNIFF_LEN];
    let mut filled = 0;
    while filled < buf.len() {
        let read = reader.read(&mut buf[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    buf.truncate(filled);
    Ok(buf)
}

/// The peeked bytes followed by the rest of the reader, chunk by chunk.
/// A read error ends the stream with that error.
fn body_stream<R>(path: String, peek: Vec<u8>, reader: R) -> Body
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let head = stream::once(async move { Ok::<_, io::Error>(Bytes::from(peek)) });
    let rest = stream::unfold(Some(reader), move |state| {
        let path = path.clone();
        async move {
            let mut reader = state?;
            let mut chunk = vec![0u8; STREAM_CHUNK_BYTES];
            match reader.read(&mut chunk).await {
                Ok(0) => None,
                Ok(read) => {
                    chunk.truncate(read);
                    Some((Ok(Bytes::from(chunk)), Some(reader)))
                }
                Err(error) => {
                    warn!(path = %path, error = %error, "file read failed mid-stream");
                    Some((Err(error), None))
                }
            }
        }
    });
    Body::from_stream(head.chain(rest))
}

fn not_found(csp: &HeaderValue) -> Response<Body> {
    error_page(StatusCode::NOT_FOUND, "404 Not Found", csp)
}

fn error_page(status: StatusCode, message: &str, csp: &HeaderValue) -> Response<Body> {
    let body = format!(
        "<!doctype html><html><head><meta charset=\"UTF-8\"><title>{status}</title></head>\
         <body><h1>{message}</h1></body></html>",
        status = status.as_u16(),
    );
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(HTML_UTF8));
    headers.insert(header::CONTENT_SECURITY_POLICY, csp.clone());
    response
}
