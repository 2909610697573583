//! Write-once function address register.
//!
//! A [`CaptureSlot`] starts empty and accepts exactly one non-null address.
//! Every later write is rejected, so the first genuine implementation seen
//! stays authoritative even when several threads race to fill the slot.

use libc::c_void;
use std::ffi::CStr;
use std::marker::PhantomData;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// A function pointer of type `F` captured at most once.
pub struct CaptureSlot<F> {
    ptr: AtomicPtr<c_void>,
    _marker: PhantomData<F>,
}

// SAFETY: the slot only holds an `AtomicPtr`; a captured function address is
// valid from any thread.
unsafe impl<F> Sync for CaptureSlot<F> {}
// SAFETY: as above.
unsafe impl<F> Send for CaptureSlot<F> {}

impl<F: Copy> CaptureSlot<F> {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
            _marker: PhantomData,
        }
    }

    /// Stores `addr` if the slot is still empty.
    ///
    /// Returns `true` only for the write that filled the slot. Null
    /// addresses are ignored.
    ///
    /// # Safety
    ///
    /// `addr` must be the address of a function with signature `F`.
    pub unsafe fn capture(&self, addr: *mut c_void) -> bool {
        if addr.is_null() {
            return false;
        }
        self.ptr
            .compare_exchange(ptr::null_mut(), addr, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns the captured function, if any.
    #[must_use]
    pub fn get(&self) -> Option<F> {
        let raw = self.ptr.load(Ordering::Acquire);
        if raw.is_null() {
            return None;
        }
        debug_assert_eq!(mem::size_of::<F>(), mem::size_of::<*mut c_void>());
        // SAFETY: `capture` only accepts addresses of functions typed `F`.
        Some(unsafe { mem::transmute_copy::<*mut c_void, F>(&raw) })
    }

    /// The stored address, null while empty.
    #[must_use]
    pub fn raw(&self) -> *mut c_void {
        self.ptr.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_captured(&self) -> bool {
        !self.raw().is_null()
    }

    /// Returns the captured function, filling the slot on first use from
    /// `dlsym(RTLD_NEXT, symbol)`.
    ///
    /// # Safety
    ///
    /// `symbol` must name a function with signature `F`.
    #[cfg(all(unix, not(target_vendor = "apple")))]
    #[must_use]
    pub unsafe fn get_or_resolve_next(&self, symbol: &CStr) -> Option<F> {
        if let Some(f) = self.get() {
            return Some(f);
        }
        // SAFETY: `symbol` is NUL-terminated; RTLD_NEXT skips this image.
        let found = unsafe { libc::dlsym(libc::RTLD_NEXT, symbol.as_ptr()) };
        // SAFETY: the caller vouches that `symbol` has signature `F`.
        if unsafe { self.capture(found) } {
            tracing::debug!(symbol = %symbol.to_string_lossy(), address = ?found, "Resolved real symbol");
        }
        self.get()
    }
}

impl<F: Copy> Default for CaptureSlot<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Compares a C symbol name against an expected one.
#[must_use]
pub fn symbol_is(symbol: Option<&CStr>, expected: &CStr) -> bool {
    symbol == Some(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    type Dummy = unsafe extern "C" fn() -> i32;

    fn dummy(addr: usize) -> *mut c_void {
        ptr::without_provenance_mut(addr)
    }

    #[test]
    fn starts_empty() {
        let slot: CaptureSlot<Dummy> = CaptureSlot::new();
        assert!(!slot.is_captured());
        assert!(slot.get().is_none());
        assert!(slot.raw().is_null());
    }

    #[test]
    fn first_capture_wins() {
        let slot: CaptureSlot<Dummy> = CaptureSlot::new();
        assert!(unsafe { slot.capture(dummy(0x1000)) });
        assert!(!unsafe { slot.capture(dummy(0x2000)) });
        assert_eq!(slot.raw(), dummy(0x1000));
    }

    #[test]
    fn null_is_not_captured() {
        let slot: CaptureSlot<Dummy> = CaptureSlot::new();
        assert!(!unsafe { slot.capture(ptr::null_mut()) });
        assert!(!slot.is_captured());
        assert!(unsafe { slot.capture(dummy(0x3000)) });
    }

    #[test]
    fn racing_threads_capture_once() {
        let slot: Arc<CaptureSlot<Dummy>> = Arc::new(CaptureSlot::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (1..=8usize)
            .map(|i| {
                let slot = Arc::clone(&slot);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    if unsafe { slot.capture(dummy(i * 0x1000)) } {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(slot.is_captured());
    }

    #[test]
    fn captured_function_is_callable() {
        unsafe extern "C" fn seven() -> i32 {
            7
        }
        let slot: CaptureSlot<Dummy> = CaptureSlot::new();
        assert!(unsafe { slot.capture(seven as *mut c_void) });
        let f = slot.get().unwrap();
        assert_eq!(unsafe { f() }, 7);
    }

    #[test]
    fn symbol_comparison() {
        assert!(symbol_is(Some(c"getaddrinfo_async_start"), c"getaddrinfo_async_start"));
        assert!(!symbol_is(Some(c"getaddrinfo"), c"getaddrinfo_async_start"));
        assert!(!symbol_is(None, c"getaddrinfo_async_start"));
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn resolves_next_symbol() {
        type GetPid = unsafe extern "C" fn() -> libc::pid_t;
        let slot: CaptureSlot<GetPid> = CaptureSlot::new();
        let f = unsafe { slot.get_or_resolve_next(c"getpid") }.unwrap();
        assert_eq!(unsafe { f() }, unsafe { libc::getpid() });
        assert!(slot.is_captured());
    }
}
