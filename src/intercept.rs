//! Synchronous `getaddrinfo` interception.
//!
//! [`getaddrinfo_with`] holds the whole decision; the platform glue in
//! `interpose` only supplies the real resolver.

use crate::classify::is_reserved;
use crate::error::LohostError;
use crate::record::{self, Hints};
use crate::util::opt_cstr;
use libc::{addrinfo, c_char, c_int};
use std::ffi::CStr;
use std::ptr::NonNull;

/// Signature of the system `getaddrinfo`.
pub type GetAddrInfoFn = unsafe extern "C" fn(
    node: *const c_char,
    service: *const c_char,
    hints: *const addrinfo,
    res: *mut *mut addrinfo,
) -> c_int;

/// Builds a loopback record for `node` if it qualifies.
///
/// Returns `None` when the host is not reserved, when the hints ask for
/// IPv6 only, or when allocation fails. In every such case the caller must
/// fall back to real resolution.
#[must_use]
pub fn synthesize_for(
    node: Option<&CStr>,
    service: Option<&CStr>,
    hints: Option<&Hints>,
) -> Option<NonNull<addrinfo>> {
    if !is_reserved(node) {
        return None;
    }
    let name = node.map(CStr::to_string_lossy).unwrap_or_default();

    if hints.is_some_and(Hints::is_ipv6_only) {
        tracing::debug!(node = %name, "IPv6-only lookup, passing through");
        return None;
    }

    let ai = record::build(service, hints)?;
    tracing::debug!(
        node = %name,
        port = record::service_port(service),
        "Intercepted lookup -> 127.0.0.1"
    );
    Some(ai)
}

/// `getaddrinfo` with `*.localhost` answered locally.
///
/// Anything not synthesized is forwarded verbatim to `real`, including a
/// null `res`. A missing `real` is reported as `EAI_SYSTEM`.
///
/// # Safety
///
/// Same contract as `getaddrinfo(3)`: `node` and `service` are null or
/// NUL-terminated, `hints` is null or readable, `res` is null or writable.
pub unsafe fn getaddrinfo_with(
    real: Option<GetAddrInfoFn>,
    node: *const c_char,
    service: *const c_char,
    hints: *const addrinfo,
    res: *mut *mut addrinfo,
) -> c_int {
    if !res.is_null() {
        // SAFETY: pointer arguments follow the getaddrinfo contract.
        let (node_c, service_c, hints_r) =
            unsafe { (opt_cstr(node), opt_cstr(service), Hints::from_ptr(hints)) };
        if let Some(ai) = synthesize_for(node_c, service_c, hints_r.as_ref()) {
            // SAFETY: `res` is non-null and writable.
            unsafe { *res = ai.as_ptr() };
            return 0;
        }
    }

    match real {
        // SAFETY: arguments are forwarded untouched to the genuine resolver.
        Some(real) => unsafe { real(node, service, hints, res) },
        None => {
            let err = LohostError::SymbolNotFound {
                symbol: "getaddrinfo",
            };
            tracing::error!(error = %err, "Cannot fall back to system resolver");
            err.eai_code()
        }
    }
}
