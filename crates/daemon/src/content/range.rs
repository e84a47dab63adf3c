// `Range: bytes=...` parsing. Only the first range of a list is honored.

use std::ops::RangeInclusive;

/// Parse a `Range` header value against a resource of `size` bytes.
///
/// Accepts `bytes=a-b`, `bytes=a-` and `bytes=-n`. The end is clamped to
/// `size - 1`. Returns `None` for malformed or unsatisfiable input, in which
/// case the caller serves the whole resource.
pub fn parse_range(header: &str, size: u64) -> Option<RangeInclusive<u64>> {
    if size == 0 {
        return None;
    }

    let (unit, specs) = header.trim().split_once('=')?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return None;
    }

    let first = specs.split(',').next()?.trim();
    let (start, end) = first.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());
    let last = size - 1;

    match (start.is_empty(), end.is_empty()) {
        // bytes=-n: the final n bytes
        (true, false) => {
            let suffix: u64 = end.parse().ok()?;
            if suffix == 0 {
                return None;
            }
            Some(size.saturating_sub(suffix)..=last)
        }
        // bytes=a-
        (false, true) => {
            let start: u64 = start.parse().ok()?;
            (start <= last).then_some(start..=last)
        }
        // bytes=a-b
        (false, false) => {
            let start: u64 = start.parse().ok()?;
            let end: u64 = end.parse().ok()?;
            if start > end || start > last {
                return None;
            }
            Some(start..=end.min(last))
        }
        (true, true) => None,
    }
}
