//! Synthetic `addrinfo` records.
//!
//! [`EndpointRecord`] is the plain-Rust description of a loopback answer.
//! [`EndpointRecord::into_raw`] lowers it into a C `addrinfo` laid out the
//! way the platform's own `freeaddrinfo` expects, so ownership can be handed
//! to the caller exactly like a genuine result:
//!
//! - glibc and the BSDs release a record with a single `free`, so the record
//!   and its socket address share one `calloc` block.
//! - Apple's libinfo frees `ai_addr` on its own, so the two live in separate
//!   blocks.

use crate::error::{LohostError, Result};
use crate::util::atoi;
use libc::{addrinfo, c_int, sockaddr_in, socklen_t};
use std::ffi::CStr;
use std::mem;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::ptr::NonNull;

/// Address every synthetic record points at.
pub const LOOPBACK: Ipv4Addr = Ipv4Addr::LOCALHOST;

const SEPARATE_ADDR_BLOCK: bool = cfg!(target_vendor = "apple");

/// The subset of caller-supplied `addrinfo` hints the shim looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hints {
    /// `ai_flags`, copied verbatim into the record.
    pub flags: c_int,
    /// Requested address family; `AF_INET6` disables synthesis.
    pub family: c_int,
    /// Requested socket type, 0 for any.
    pub socktype: c_int,
    /// Requested protocol, 0 for any.
    pub protocol: c_int,
}

impl Hints {
    /// Copies the relevant fields out of a C hints struct.
    #[must_use]
    pub const fn from_addrinfo(ai: &addrinfo) -> Self {
        Self {
            flags: ai.ai_flags,
            family: ai.ai_family,
            socktype: ai.ai_socktype,
            protocol: ai.ai_protocol,
        }
    }

    /// Reads hints from a possibly-null pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a readable `addrinfo`.
    #[must_use]
    pub unsafe fn from_ptr(ptr: *const addrinfo) -> Option<Self> {
        // SAFETY: null or readable per the caller's contract.
        unsafe { ptr.as_ref() }.map(Self::from_addrinfo)
    }

    /// The caller asked for IPv6 results only.
    #[must_use]
    pub const fn is_ipv6_only(&self) -> bool {
        self.family == libc::AF_INET6
    }
}

/// Socket address carried by a record, tagged by family.
///
/// Only IPv4 is synthesized; every other family goes to the real resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrPayload {
    /// An IPv4 socket address.
    V4(SocketAddrV4),
}

impl AddrPayload {
    /// The `AF_*` constant for this payload.
    #[must_use]
    pub const fn family(&self) -> c_int {
        match self {
            Self::V4(_) => libc::AF_INET,
        }
    }

    /// Port in host byte order.
    #[must_use]
    pub const fn port(&self) -> u16 {
        match self {
            Self::V4(addr) => addr.port(),
        }
    }

    const fn len(&self) -> usize {
        match self {
            Self::V4(_) => mem::size_of::<sockaddr_in>(),
        }
    }
}

/// One resolved endpoint, before or after crossing the C boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointRecord {
    /// `ai_flags` taken from the hints, 0 without hints.
    pub flags: c_int,
    /// `ai_socktype`, never 0.
    pub socktype: c_int,
    /// `ai_protocol`, never 0.
    pub protocol: c_int,
    /// The loopback address and service port.
    pub addr: AddrPayload,
}

impl EndpointRecord {
    /// Describes the loopback answer for `service` under `hints`.
    ///
    /// Flags, socket type and protocol are copied from `hints`. An
    /// unspecified socket type becomes `SOCK_STREAM` and an unspecified
    /// protocol becomes `IPPROTO_TCP`, each independently of the other.
    #[must_use]
    pub fn synthesize(service: Option<&CStr>, hints: Option<&Hints>) -> Self {
        let (flags, socktype, protocol) =
            hints.map_or((0, 0, 0), |h| (h.flags, h.socktype, h.protocol));

        let socktype = if socktype == 0 {
            libc::SOCK_STREAM
        } else {
            socktype
        };
        let protocol = if protocol == 0 {
            libc::IPPROTO_TCP
        } else {
            protocol
        };

        Self {
            flags,
            socktype,
            protocol,
            addr: AddrPayload::V4(SocketAddrV4::new(LOOPBACK, service_port(service))),
        }
    }

    /// Always `AF_INET` for synthesized records.
    #[must_use]
    pub const fn family(&self) -> c_int {
        self.addr.family()
    }

    /// Port in host byte order.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Allocates a C `addrinfo` for this record.
    ///
    /// The returned pointer belongs to the caller and must be released with
    /// the platform's `freeaddrinfo` (or [`release`]).
    ///
    /// # Errors
    ///
    /// Returns [`LohostError::Allocation`] if `calloc` fails; nothing is
    /// leaked in that case.
    pub fn into_raw(self) -> Result<NonNull<addrinfo>> {
        let record_len = mem::size_of::<addrinfo>();
        let addr_len = self.addr.len();

        let (ai, sa) = if SEPARATE_ADDR_BLOCK {
            // SAFETY: plain allocation; the result is checked for null.
            let ai = unsafe { libc::calloc(1, record_len) }.cast::<addrinfo>();
            if ai.is_null() {
                return Err(LohostError::Allocation);
            }
            // SAFETY: as above.
            let sa = unsafe { libc::calloc(1, addr_len) }.cast::<u8>();
            if sa.is_null() {
                // SAFETY: `ai` came from `calloc` and was never handed out.
                unsafe { libc::free(ai.cast()) };
                return Err(LohostError::Allocation);
            }
            (ai, sa)
        } else {
            // SAFETY: plain allocation; the result is checked for null.
            let block = unsafe { libc::calloc(1, record_len + addr_len) }.cast::<u8>();
            if block.is_null() {
                return Err(LohostError::Allocation);
            }
            // `record_len` is a multiple of the addrinfo alignment, which is
            // at least that of any sockaddr.
            // SAFETY: the block is `record_len + addr_len` bytes long.
            (block.cast::<addrinfo>(), unsafe { block.add(record_len) })
        };

        match self.addr {
            AddrPayload::V4(addr) => {
                // SAFETY: `sa` is a fresh, suitably aligned block of `addr_len` bytes.
                #[allow(clippy::cast_ptr_alignment)]
                unsafe {
                    sa.cast::<sockaddr_in>().write(sockaddr_v4(addr));
                }
            }
        }

        // SAFETY: `ai` is a fresh zeroed allocation; zero is a valid addrinfo
        // (null pointers, zero integers).
        let record = unsafe { &mut *ai };
        record.ai_flags = self.flags;
        record.ai_family = self.family();
        record.ai_socktype = self.socktype;
        record.ai_protocol = self.protocol;
        #[allow(clippy::cast_possible_truncation)]
        {
            record.ai_addrlen = addr_len as socklen_t;
        }
        record.ai_addr = sa.cast();

        NonNull::new(ai).ok_or(LohostError::Allocation)
    }
}

/// Builds a raw loopback record, or `None` if allocation failed.
#[must_use]
pub fn build(service: Option<&CStr>, hints: Option<&Hints>) -> Option<NonNull<addrinfo>> {
    match EndpointRecord::synthesize(service, hints).into_raw() {
        Ok(ai) => Some(ai),
        Err(e) => {
            tracing::warn!(error = %e, "Could not synthesize loopback record");
            None
        }
    }
}

/// Port for a service argument, following C `atoi`.
///
/// Non-positive or unparsable input gives 0. Values above `u16::MAX` wrap
/// through the 16-bit port field.
#[must_use]
pub fn service_port(service: Option<&CStr>) -> u16 {
    let port = service.map_or(0, atoi);
    if port > 0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            port as u16
        }
    } else {
        0
    }
}

/// Decodes an IPv4 `addrinfo` back into an [`EndpointRecord`].
///
/// Returns `None` for null pointers and non-IPv4 records. Only the first
/// entry of a list is read.
///
/// # Safety
///
/// `ptr` must be null or point to a valid `addrinfo` whose `ai_addr` spans
/// `ai_addrlen` readable bytes.
#[must_use]
pub unsafe fn read(ptr: *const addrinfo) -> Option<EndpointRecord> {
    // SAFETY: null or valid per the caller's contract.
    let ai = unsafe { ptr.as_ref() }?;
    if ai.ai_family != libc::AF_INET
        || ai.ai_addr.is_null()
        || (ai.ai_addrlen as usize) < mem::size_of::<sockaddr_in>()
    {
        return None;
    }

    // SAFETY: family and length checked above.
    #[allow(clippy::cast_ptr_alignment)]
    let sin = unsafe { ai.ai_addr.cast::<sockaddr_in>().read_unaligned() };
    let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
    let port = u16::from_be(sin.sin_port);

    Some(EndpointRecord {
        flags: ai.ai_flags,
        socktype: ai.ai_socktype,
        protocol: ai.ai_protocol,
        addr: AddrPayload::V4(SocketAddrV4::new(ip, port)),
    })
}

/// Frees a list produced by [`EndpointRecord::into_raw`], the same way the
/// platform `freeaddrinfo` would.
///
/// # Safety
///
/// `ptr` must be null or the head of a list allocated by this module and not
/// yet freed.
pub unsafe fn release(mut ptr: *mut addrinfo) {
    while !ptr.is_null() {
        // SAFETY: `ptr` is a live record per the caller's contract.
        let (next, canon, addr) = unsafe { ((*ptr).ai_next, (*ptr).ai_canonname, (*ptr).ai_addr) };
        // SAFETY: every pointer below came from `calloc` and is freed once.
        unsafe {
            if !canon.is_null() {
                libc::free(canon.cast());
            }
            if SEPARATE_ADDR_BLOCK && !addr.is_null() {
                libc::free(addr.cast());
            }
            libc::free(ptr.cast());
        }
        ptr = next;
    }
}

fn sockaddr_v4(addr: SocketAddrV4) -> sockaddr_in {
    // SAFETY: all-zero is a valid `sockaddr_in`.
    let mut sin: sockaddr_in = unsafe { mem::zeroed() };
    #[cfg(any(
        target_vendor = "apple",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    #[allow(clippy::cast_possible_truncation)]
    {
        sin.sin_len = mem::size_of::<sockaddr_in>() as u8;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        sin.sin_family = libc::AF_INET as libc::sa_family_t;
    }
    sin.sin_port = addr.port().to_be();
    sin.sin_addr = libc::in_addr {
        s_addr: u32::from(*addr.ip()).to_be(),
    };
    sin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_hints() {
        let r = EndpointRecord::synthesize(Some(c"3000"), None);
        assert_eq!(r.flags, 0);
        assert_eq!(r.socktype, libc::SOCK_STREAM);
        assert_eq!(r.protocol, libc::IPPROTO_TCP);
        assert_eq!(r.family(), libc::AF_INET);
        assert_eq!(r.addr, AddrPayload::V4(SocketAddrV4::new(LOOPBACK, 3000)));
    }

    #[test]
    fn hints_are_copied() {
        let hints = Hints {
            flags: libc::AI_NUMERICSERV,
            family: libc::AF_INET,
            socktype: libc::SOCK_DGRAM,
            protocol: libc::IPPROTO_UDP,
        };
        let r = EndpointRecord::synthesize(Some(c"53"), Some(&hints));
        assert_eq!(r.flags, libc::AI_NUMERICSERV);
        assert_eq!(r.socktype, libc::SOCK_DGRAM);
        assert_eq!(r.protocol, libc::IPPROTO_UDP);
        assert_eq!(r.port(), 53);
    }

    #[test]
    fn zero_hints_fall_back_to_stream() {
        let hints = Hints {
            flags: libc::AI_ADDRCONFIG,
            ..Hints::default()
        };
        let r = EndpointRecord::synthesize(None, Some(&hints));
        assert_eq!(r.flags, libc::AI_ADDRCONFIG);
        assert_eq!(r.socktype, libc::SOCK_STREAM);
        assert_eq!(r.protocol, libc::IPPROTO_TCP);
        assert_eq!(r.port(), 0);
    }

    #[test]
    fn datagram_without_protocol_defaults_to_tcp() {
        let hints = Hints {
            socktype: libc::SOCK_DGRAM,
            ..Hints::default()
        };
        let r = EndpointRecord::synthesize(Some(c"53"), Some(&hints));
        assert_eq!(r.socktype, libc::SOCK_DGRAM);
        assert_eq!(r.protocol, libc::IPPROTO_TCP);
    }

    #[test]
    fn service_port_quirks() {
        assert_eq!(service_port(None), 0);
        assert_eq!(service_port(Some(c"8080")), 8080);
        assert_eq!(service_port(Some(c"http")), 0);
        assert_eq!(service_port(Some(c"-1")), 0);
        assert_eq!(service_port(Some(c"0")), 0);
        // 70000 wraps through the 16-bit field.
        assert_eq!(service_port(Some(c"70000")), 4464);
    }

    #[test]
    fn raw_record_layout() {
        let ai = build(Some(c"8080"), None).unwrap();
        let raw = unsafe { ai.as_ref() };
        assert_eq!(raw.ai_family, libc::AF_INET);
        assert_eq!(raw.ai_addrlen as usize, mem::size_of::<sockaddr_in>());
        assert!(raw.ai_canonname.is_null());
        assert!(raw.ai_next.is_null());

        let sin = unsafe { raw.ai_addr.cast::<sockaddr_in>().read_unaligned() };
        assert_eq!(i32::from(sin.sin_family), libc::AF_INET);
        assert_eq!(sin.sin_port, 8080u16.to_be());
        assert_eq!(sin.sin_addr.s_addr, u32::from(LOOPBACK).to_be());

        unsafe { release(ai.as_ptr()) };
    }

    #[test]
    fn read_back_matches() {
        let expected = EndpointRecord::synthesize(Some(c"5173"), None);
        let ai = expected.into_raw().unwrap();
        assert_eq!(unsafe { read(ai.as_ptr()) }, Some(expected));
        unsafe { release(ai.as_ptr()) };
    }

    #[test]
    fn read_null_is_none() {
        assert_eq!(unsafe { read(std::ptr::null()) }, None);
    }

    #[test]
    fn ipv6_only_hint() {
        let hints = Hints {
            family: libc::AF_INET6,
            ..Hints::default()
        };
        assert!(hints.is_ipv6_only());
        assert!(!Hints::default().is_ipv6_only());
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn system_freeaddrinfo_accepts_record() {
        let ai = build(Some(c"80"), None).unwrap();
        unsafe { libc::freeaddrinfo(ai.as_ptr()) };
    }
}
