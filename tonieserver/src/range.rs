//! HTTP Range parsing.
//!
//! Follows the real device firmware's bug-compatible behavior rather than
//! strict RFC 7233: a syntactically invalid or unsatisfiable `Range` header
//! is treated as "no range requested" (plain 200 with the full body) instead
//! of a 416. Clients in the wild send ranges this handler must not reject.
//! A second bug-compatible quirk: only `a > 0` triggers a 206 — `bytes=0-b`
//! (and a suffix range that resolves to start 0) is served as a plain 200,
//! matching the firmware's gate on the start offset.

/// An inclusive byte range, already clamped to `[0, len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parses a `Range: bytes=...` header value against a resource of `len`
/// bytes. Returns `None` for a missing, malformed, or unsatisfiable range —
/// the caller should then serve the whole resource with a 200.
pub fn parse(range_header: Option<&str>, len: u64) -> Option<ByteRange> {
    if len == 0 {
        return None;
    }
    let spec = range_header?.strip_prefix("bytes=")?;
    let (start_s, end_s) = spec.split_once('-')?;

    if start_s.is_empty() {
        let suffix_len: u64 = end_s.parse().ok()?;
        if suffix_len == 0 || suffix_len > len {
            return None;
        }
        let start = len - suffix_len;
        if start == 0 {
            return None;
        }
        return Some(ByteRange { start, end: len - 1 });
    }

    let start: u64 = start_s.parse().ok()?;
    if start == 0 || start >= len {
        return None;
    }
    let end = if end_s.is_empty() {
        len - 1
    } else {
        end_s.parse().ok()?
    };
    if end < start {
        return None;
    }
    Some(ByteRange { start, end: end.min(len - 1) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_header_is_none() {
        assert!(parse(None, 100).is_none());
    }

    #[test]
    fn simple_range() {
        let r = parse(Some("bytes=10-19"), 100).unwrap();
        assert_eq!(r.start, 10);
        assert_eq!(r.end, 19);
        assert_eq!(r.len(), 10);
    }

    #[test]
    fn open_ended_range_clamps_to_len() {
        let r = parse(Some("bytes=90-"), 100).unwrap();
        assert_eq!(r.start, 90);
        assert_eq!(r.end, 99);
    }

    #[test]
    fn suffix_range() {
        let r = parse(Some("bytes=-10"), 100).unwrap();
        assert_eq!(r.start, 90);
        assert_eq!(r.end, 99);
    }

    #[test]
    fn malformed_header_is_none_not_an_error() {
        assert!(parse(Some("not-a-range"), 100).is_none());
    }

    #[test]
    fn start_beyond_len_is_none() {
        assert!(parse(Some("bytes=1000-"), 100).is_none());
    }

    #[test]
    fn inverted_range_is_none() {
        assert!(parse(Some("bytes=50-10"), 100).is_none());
    }

    #[test]
    fn start_zero_is_none_even_though_well_formed() {
        assert!(parse(Some("bytes=0-99"), 100).is_none());
        assert!(parse(Some("bytes=0-"), 100).is_none());
    }

    #[test]
    fn suffix_covering_whole_resource_is_none() {
        assert!(parse(Some("bytes=-100"), 100).is_none());
    }
}
