// Content-Type selection: extension first, then a sniff of the leading bytes.

/// Bytes read before headers are sent.
pub const SNIFF_LEN: usize = 512;

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";

const MAGIC: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
    (b"\0asm", "application/wasm"),
    (b"OggS", "audio/ogg"),
    (b"ID3", "audio/mpeg"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
];

/// Pick a Content-Type for `path` whose first bytes are `peek`.
pub fn identify(path: &str, peek: &[u8]) -> String {
    if let Some(guess) = mime_guess::from_path(path).first() {
        if guess.type_() == mime_guess::mime::TEXT && guess.get_param("charset").is_none() {
            return format!("{}; charset=utf-8", guess.essence_str());
        }
        return guess.to_string();
    }
    sniff(peek).to_string()
}

/// Classify bytes with no help from the file name.
pub fn sniff(peek: &[u8]) -> &'static str {
    if let Some((_, mime)) = MAGIC.iter().find(|(magic, _)| peek.starts_with(magic)) {
        return mime;
    }
    if peek.len() >= 12 && &peek[..4] == b"RIFF" && &peek[8..12] == b"WEBP" {
        return "image/webp";
    }
    if looks_like_html(peek) {
        return TEXT_HTML;
    }
    if looks_like_text(peek) {
        return TEXT_PLAIN;
    }
    OCTET_STREAM
}

fn looks_like_html(peek: &[u8]) -> bool {
    let start = peek.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(peek.len());
    let head = &peek[start..];
    ["<!doctype html", "<html", "<head", "<body"].iter().any(|tag| {
        head.len() >= tag.len() && head[..tag.len()].eq_ignore_ascii_case(tag.as_bytes())
    })
}

fn looks_like_text(peek: &[u8]) -> bool {
    if peek.contains(&0) {
        return false;
    }
    match std::str::from_utf8(peek) {
        Ok(_) => true,
        // The peek may cut a multi-byte character in half.
        Err(error) => error.error_len().is_none(),
    }
}
