// Archive addresses: 64-char hex keys, optionally prefixed by `dat://`.

use url::Url;

/// URL scheme for peer-to-peer archive addresses.
pub const ARCHIVE_SCHEME: &str = "dat";

/// `dat://` prefix used when building canonical addresses.
pub const ARCHIVE_URL_PREFIX: &str = "dat://";

/// Length of a hex-encoded archive key.
pub const ARCHIVE_KEY_HEX_LEN: usize = 64;

/// True if `value` is exactly a 64-character hex archive key (any case).
pub fn is_archive_key(value: &str) -> bool {
    value.len() == ARCHIVE_KEY_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Canonicalize a user-supplied publish target.
///
/// - bare 64-char hex key → `dat://<key>`
/// - `dat://` URL → `dat://<host>` (path, query and port are dropped)
/// - anything else → `""`
///
/// An empty result means "unset/invalid". Callers treat it as a value, never
/// as an error.
pub fn canonicalize_publish_target(input: &str) -> String {
    if is_archive_key(input) {
        return format!("{ARCHIVE_URL_PREFIX}{input}");
    }

    if !input.starts_with(ARCHIVE_URL_PREFIX) {
        return String::new();
    }

    match Url::parse(input) {
        Ok(url) => match url.host_str() {
            Some(host) if !host.is_empty() => format!("{ARCHIVE_URL_PREFIX}{host}"),
            _ => String::new(),
        },
        Err(_) => String::new(),
    }
}
