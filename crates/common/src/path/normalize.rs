// Request path canonicalization: percent-decoding, lexical `.`/`..`
// resolution, root-escape rejection, 4096 byte max.

use percent_encoding::percent_decode_str;
use thiserror::Error;

/// Maximum allowed decoded path length in bytes.
const MAX_PATH_BYTES: usize = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path exceeds maximum length of {MAX_PATH_BYTES} bytes")]
    TooLong,

    #[error("path escapes the scope root")]
    Traversal,

    #[error("path contains null byte")]
    NullByte,

    #[error("path is not valid percent-encoded UTF-8")]
    InvalidEncoding,
}

/// Decode and normalize a request path into a scope-relative path.
///
/// Rules:
/// - Percent-decode (the result must be UTF-8)
/// - Convert `\` separators to `/`
/// - Drop empty and `.` components
/// - Resolve `..` against preceding components; a `..` that would climb
///   above the root is rejected
/// - Reject null bytes
///
/// The root itself normalizes to `""`.
pub fn normalize_request_path(raw: &str) -> Result<String, PathError> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| PathError::InvalidEncoding)?;
    normalize_decoded_path(&decoded)
}

/// Normalize an already-decoded path. See [`normalize_request_path`].
pub fn normalize_decoded_path(decoded: &str) -> Result<String, PathError> {
    if decoded.contains('\0') {
        return Err(PathError::NullByte);
    }

    if decoded.len() > MAX_PATH_BYTES {
        return Err(PathError::TooLong);
    }

    let unified = decoded.replace('\\', "/");
    let mut components: Vec<&str> = Vec::new();
    for component in unified.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if components.pop().is_none() {
                    return Err(PathError::Traversal);
                }
            }
            other => components.push(other),
        }
    }

    Ok(components.join("/"))
}

/// Join a child name onto a scope-relative directory path.
pub fn join_relative(dir: &str, name: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}
