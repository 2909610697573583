//! Capture and redirect of libinfo's `getaddrinfo_async_start`.
//!
//! Some runtimes never call `getaddrinfo` directly. They look up the
//! callback-based `getaddrinfo_async_start` through `dlsym` and call the
//! returned address. [`redirect_lookup`] sits behind the interposed `dlsym`:
//! the first successful lookup of that symbol stores the genuine address in
//! [`REAL_ASYNC_START`], and the caller receives [`async_start_hook`]
//! instead. The hook answers `*.localhost` on the spot and hands everything
//! else to the captured function.
//!
//! The logic is platform-neutral so it can be tested anywhere; only Apple
//! targets wire it into `dlsym`.

use crate::capture::{CaptureSlot, symbol_is};
use crate::error::LohostError;
use crate::intercept::synthesize_for;
use crate::record::Hints;
use crate::util::opt_cstr;
use libc::{addrinfo, c_char, c_uint, c_void};
use std::ffi::CStr;
use std::ptr;

/// Symbol whose lookups are redirected.
pub const ASYNC_START_SYMBOL: &CStr = c"getaddrinfo_async_start";

/// Mach port handle written back to the caller.
pub type MachPort = c_uint;

/// Completion callback: `(status, result, context)`.
pub type AsyncCallback =
    unsafe extern "C" fn(status: i32, res: *mut addrinfo, context: *mut c_void);

/// Signature of `getaddrinfo_async_start`.
pub type AsyncStartFn = unsafe extern "C" fn(
    port: *mut MachPort,
    node: *const c_char,
    service: *const c_char,
    hints: *const addrinfo,
    callback: Option<AsyncCallback>,
    context: *mut c_void,
) -> i32;

/// The genuine `getaddrinfo_async_start`, filled by the first lookup.
pub static REAL_ASYNC_START: CaptureSlot<AsyncStartFn> = CaptureSlot::new();

/// Post-processes a `dlsym` result.
///
/// Lookups of any other symbol return `found` untouched. Lookups of
/// [`ASYNC_START_SYMBOL`] always return `replacement`; a non-null `found`
/// is offered to `slot` on the way (the first one sticks, and
/// `replacement` itself is never stored).
#[must_use]
pub fn redirect_lookup(
    slot: &CaptureSlot<AsyncStartFn>,
    replacement: *mut c_void,
    symbol: Option<&CStr>,
    found: *mut c_void,
) -> *mut c_void {
    if !symbol_is(symbol, ASYNC_START_SYMBOL) {
        return found;
    }

    // SAFETY: `found` is what the loader returned for this exact symbol.
    if found != replacement && unsafe { slot.capture(found) } {
        tracing::debug!(address = ?found, "Captured real getaddrinfo_async_start");
    }

    tracing::debug!("dlsym(getaddrinfo_async_start) -> returning hook");
    replacement
}

/// `getaddrinfo_async_start` against an explicit capture slot.
///
/// A reserved `node` (without an IPv6-only hint) completes immediately:
/// `callback` runs once with status 0 before this returns, `*port` is set
/// to 0, and 0 is returned. Everything else goes to the captured real
/// function with its result returned verbatim. If nothing was captured,
/// `callback` receives status -1 with a null result and -1 is returned.
///
/// # Safety
///
/// Same contract as libinfo's `getaddrinfo_async_start`: `port` is null or
/// writable, `node`/`service` are null or NUL-terminated, `hints` is null
/// or readable.
pub unsafe fn start_async_with(
    slot: &CaptureSlot<AsyncStartFn>,
    port: *mut MachPort,
    node: *const c_char,
    service: *const c_char,
    hints: *const addrinfo,
    callback: Option<AsyncCallback>,
    context: *mut c_void,
) -> i32 {
    // SAFETY: pointer arguments follow the libinfo contract.
    let (node_c, service_c, hints_r) =
        unsafe { (opt_cstr(node), opt_cstr(service), Hints::from_ptr(hints)) };
    tracing::debug!(
        node = %node_c.map(CStr::to_string_lossy).unwrap_or_default(),
        "getaddrinfo_async_start"
    );

    if let Some(ai) = synthesize_for(node_c, service_c, hints_r.as_ref()) {
        // SAFETY: the record is handed to the caller-supplied completion
        // routine, which takes ownership as with a genuine result.
        unsafe {
            match callback {
                Some(cb) => cb(0, ai.as_ptr(), context),
                None => crate::record::release(ai.as_ptr()),
            }
            if !port.is_null() {
                *port = 0;
            }
        }
        return 0;
    }

    if let Some(real) = slot.get() {
        // SAFETY: arguments are forwarded untouched to the genuine function.
        return unsafe { real(port, node, service, hints, callback, context) };
    }

    let err = LohostError::NotCaptured;
    tracing::error!(error = %err, "No real getaddrinfo_async_start available");
    if let Some(cb) = callback {
        // SAFETY: the caller supplied `cb` for exactly this completion.
        unsafe { cb(err.eai_code(), ptr::null_mut(), context) };
    }
    err.eai_code()
}

/// Replacement handed out for `getaddrinfo_async_start` lookups.
///
/// # Safety
///
/// See [`start_async_with`].
pub unsafe extern "C" fn async_start_hook(
    port: *mut MachPort,
    node: *const c_char,
    service: *const c_char,
    hints: *const addrinfo,
    callback: Option<AsyncCallback>,
    context: *mut c_void,
) -> i32 {
    crate::logging::ensure_init();
    // SAFETY: forwarded contract.
    unsafe {
        start_async_with(
            &REAL_ASYNC_START,
            port,
            node,
            service,
            hints,
            callback,
            context,
        )
    }
}

/// Address of [`async_start_hook`] as returned from `dlsym`.
#[must_use]
pub fn hook_address() -> *mut c_void {
    async_start_hook as AsyncStartFn as *mut c_void
}
