//! Internal utilities.

use libc::{c_char, c_int};
use std::ffi::CStr;

/// Borrows an optional C string argument.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for `'a`.
#[must_use]
pub unsafe fn opt_cstr<'a>(ptr: *const c_char) -> Option<&'a CStr> {
    if ptr.is_null() {
        None
    } else {
        // SAFETY: non-null and NUL-terminated per the caller's contract.
        Some(unsafe { CStr::from_ptr(ptr) })
    }
}

/// Parses a decimal integer the way C `atoi` does.
///
/// Leading whitespace and one sign are accepted, parsing stops at the first
/// non-digit, and anything unparsable yields 0. Out-of-range input clamps to
/// the `long` range and is then truncated to `int`.
#[must_use]
pub fn atoi(s: &CStr) -> c_int {
    let bytes = s.to_bytes();
    let mut i = bytes
        .iter()
        .take_while(|b| matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r'))
        .count();

    let negative = match bytes.get(i) {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };

    let mut value: i64 = 0;
    for &b in bytes[i..].iter().take_while(|b| b.is_ascii_digit()) {
        let digit = i64::from(b - b'0');
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }

    #[allow(clippy::cast_possible_truncation)]
    {
        value as c_int
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_none() {
        assert!(unsafe { opt_cstr(std::ptr::null()) }.is_none());
        let s = c"abc";
        assert_eq!(unsafe { opt_cstr(s.as_ptr()) }, Some(s));
    }

    #[test]
    fn atoi_plain_and_signed() {
        assert_eq!(atoi(c"8080"), 8080);
        assert_eq!(atoi(c"+42"), 42);
        assert_eq!(atoi(c"-5"), -5);
        assert_eq!(atoi(c"  \t7"), 7);
    }

    #[test]
    fn atoi_stops_at_garbage() {
        assert_eq!(atoi(c"3000abc"), 3000);
        assert_eq!(atoi(c"http"), 0);
        assert_eq!(atoi(c""), 0);
        assert_eq!(atoi(c"-"), 0);
    }

    #[test]
    fn atoi_clamps_then_truncates() {
        // LONG_MAX truncated to int is -1.
        assert_eq!(atoi(c"99999999999999999999999"), -1);
    }
}
