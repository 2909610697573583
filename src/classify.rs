//! Hostname classification.

use std::ffi::CStr;

/// Suffix that marks a hostname for loopback redirection.
pub const LOCAL_SUFFIX: &[u8] = b".localhost";

/// Returns `true` if `hostname` ends in [`LOCAL_SUFFIX`].
///
/// The comparison is byte-exact and case-sensitive; `None` and the empty
/// string are never reserved.
///
/// ```
/// use lohost_dns::is_reserved;
///
/// assert!(is_reserved(Some(c"api.localhost")));
/// assert!(!is_reserved(Some(c"api.LOCALHOST")));
/// assert!(!is_reserved(None));
/// ```
#[must_use]
pub fn is_reserved(hostname: Option<&CStr>) -> bool {
    hostname.is_some_and(|h| is_reserved_bytes(h.to_bytes()))
}

/// Byte-slice form of [`is_reserved`].
#[must_use]
pub fn is_reserved_bytes(hostname: &[u8]) -> bool {
    hostname.ends_with(LOCAL_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_matches() {
        assert!(is_reserved_bytes(b"foo.localhost"));
        assert!(is_reserved_bytes(b"a.b.c.localhost"));
        assert!(is_reserved_bytes(b".localhost"));
    }

    #[test]
    fn near_misses_do_not_match() {
        assert!(!is_reserved_bytes(b"foolocalhost"));
        assert!(!is_reserved_bytes(b"localhost"));
        assert!(!is_reserved_bytes(b"x.LOCALHOST"));
        assert!(!is_reserved_bytes(b"foo.localhost."));
        assert!(!is_reserved_bytes(b"foo.localhost.com"));
        assert!(!is_reserved_bytes(b"ocalhost"));
    }

    #[test]
    fn empty_and_null() {
        assert!(!is_reserved_bytes(b""));
        assert!(!is_reserved(Some(c"")));
        assert!(!is_reserved(None));
    }
}
