//! Platform wiring.
//!
//! - Linux and other ELF platforms: `getaddrinfo` is exported by name and
//!   picked up ahead of libc when the library is preloaded. The genuine
//!   implementation is found with `dlsym(RTLD_NEXT, ...)`.
//! - Apple platforms: `__DATA,__interpose` entries swap in replacements for
//!   `getaddrinfo` and `dlsym`. Calls made from inside this image still bind
//!   to the originals, which is how the hooks reach them.

#[cfg(target_vendor = "apple")]
use crate::async_start;
use crate::config::Config;
use crate::intercept;
#[cfg(target_vendor = "apple")]
use crate::util::opt_cstr;
use libc::{addrinfo, c_char, c_int};
#[cfg(target_vendor = "apple")]
use libc::c_void;

/// Hooks active on this platform, for the load-time banner.
pub const ACTIVE_HOOKS: &str = if cfg!(target_vendor = "apple") {
    "getaddrinfo, dlsym"
} else {
    "getaddrinfo"
};

// SAFETY: runs once at load time; touches only the environment and the
// logging subscriber.
#[ctor::ctor]
unsafe fn announce() {
    crate::logging::init(&Config::from_env());
    tracing::debug!(hooks = ACTIVE_HOOKS, "lohost-dns loaded");
}

#[cfg(all(unix, not(target_vendor = "apple")))]
static REAL_GETADDRINFO: crate::capture::CaptureSlot<intercept::GetAddrInfoFn> =
    crate::capture::CaptureSlot::new();

/// Preload entry point replacing libc's `getaddrinfo`.
///
/// # Safety
///
/// Same contract as `getaddrinfo(3)`.
#[cfg(all(unix, not(target_vendor = "apple")))]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn getaddrinfo(
    node: *const c_char,
    service: *const c_char,
    hints: *const addrinfo,
    res: *mut *mut addrinfo,
) -> c_int {
    crate::logging::ensure_init();
    // SAFETY: `getaddrinfo` has exactly the `GetAddrInfoFn` signature.
    let real = unsafe { REAL_GETADDRINFO.get_or_resolve_next(c"getaddrinfo") };
    // SAFETY: forwarded contract.
    unsafe { intercept::getaddrinfo_with(real, node, service, hints, res) }
}

/// Replacement for `getaddrinfo` on Apple platforms.
#[cfg(target_vendor = "apple")]
unsafe extern "C" fn hooked_getaddrinfo(
    node: *const c_char,
    service: *const c_char,
    hints: *const addrinfo,
    res: *mut *mut addrinfo,
) -> c_int {
    crate::logging::ensure_init();
    // SAFETY: forwarded contract; inside this image `libc::getaddrinfo` is
    // the genuine one.
    unsafe { intercept::getaddrinfo_with(Some(libc::getaddrinfo), node, service, hints, res) }
}

/// Replacement for `dlsym` on Apple platforms. Only lookups of
/// `getaddrinfo_async_start` are altered.
#[cfg(target_vendor = "apple")]
unsafe extern "C" fn hooked_dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void {
    // SAFETY: inside this image `libc::dlsym` is the genuine one.
    let found = unsafe { libc::dlsym(handle, symbol) };
    // SAFETY: `symbol` is null or NUL-terminated per the dlsym contract.
    let name = unsafe { opt_cstr(symbol) };
    async_start::redirect_lookup(
        &async_start::REAL_ASYNC_START,
        async_start::hook_address(),
        name,
        found,
    )
}

/// One dyld interpose tuple.
#[cfg(target_vendor = "apple")]
#[repr(C)]
pub struct Interpose {
    pub replacement: *const c_void,
    pub replacee: *const c_void,
}

// SAFETY: both fields are immutable function addresses.
#[cfg(target_vendor = "apple")]
unsafe impl Sync for Interpose {}

#[cfg(target_vendor = "apple")]
#[unsafe(link_section = "__DATA,__interpose")]
#[used]
static INTERPOSE_GETADDRINFO: Interpose = Interpose {
    replacement: hooked_getaddrinfo as *const c_void,
    replacee: libc::getaddrinfo as *const c_void,
};

#[cfg(target_vendor = "apple")]
#[unsafe(link_section = "__DATA,__interpose")]
#[used]
static INTERPOSE_DLSYM: Interpose = Interpose {
    replacement: hooked_dlsym as *const c_void,
    replacee: libc::dlsym as *const c_void,
};
