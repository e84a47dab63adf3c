// HTML directory listing for scopes without an index.html.

use std::cmp::Ordering;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped in listing hrefs. Mirrors what a browser's `encodeURI`
/// would touch, plus `%` so names containing it round-trip through decoding.
const HREF_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

const STYLES: &str = "<style>
  .entry {
    padding: 3px 20px;
    font-family: Consolas, 'Lucida Console', Monaco, monospace;
    font-size: 13px;
  }
  .directory a { font-weight: bold; }
  .summary { color: #777; }
</style>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    /// Path relative to the scope root.
    pub path: String,
    pub is_directory: bool,
}

/// Render a listing page for `dir_path` (scope-relative).
pub fn render_listing(dir_path: &str, mut entries: Vec<DirectoryEntry>) -> String {
    entries.sort_by(compare_entries);

    let mut html = String::from("<meta charset=\"UTF-8\">");
    html.push_str(STYLES);

    if !is_root(dir_path) {
        html.push_str("<div class=\"entry updog\"><a href=\"..\">..</a></div>");
    }

    for entry in &entries {
        let kind = if entry.is_directory { "directory" } else { "file" };
        html.push_str(&format!(
            "<div class=\"entry {kind}\"><a href=\"{}\">{}</a></div>",
            escape_html(&entry_href(entry)),
            escape_html(&entry.name),
        ));
    }

    let count = entries.len();
    let noun = if count == 1 { "file" } else { "files" };
    html.push_str(&format!("<div class=\"entry summary\">{count} {noun}</div>"));
    html
}

fn compare_entries(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
    b.is_directory
        .cmp(&a.is_directory)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

fn is_root(dir_path: &str) -> bool {
    dir_path.trim_matches('/').is_empty()
}

fn entry_href(entry: &DirectoryEntry) -> String {
    let path = entry.path.trim_start_matches('/');
    let mut href = format!("/{}", utf8_percent_encode(path, HREF_ENCODE_SET));
    if entry.is_directory && !href.ends_with('/') {
        href.push('/');
    }
    href
}

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
