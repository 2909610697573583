//! # lohost-dns
//!
//! Resolve `*.localhost` to `127.0.0.1` inside any process, without touching
//! DNS.
//!
//! Built as a `cdylib`, this crate is loaded into a target process with the
//! platform's preload facility and sits in front of the system resolver.
//! Hostnames ending in `.localhost` get a synthetic IPv4 loopback answer;
//! every other lookup is forwarded unchanged.
//!
//! ## Usage
//!
//! ```bash
//! # Linux
//! LD_PRELOAD=target/release/liblohost_dns.so curl http://app.localhost:3000
//!
//! # macOS
//! DYLD_INSERT_LIBRARIES=target/release/liblohost_dns.dylib ./server
//! ```
//!
//! Set `LOHOST_DEBUG` (any value) to print diagnostics to stderr.
//!
//! ## What gets intercepted
//!
//! - `getaddrinfo` on every platform.
//! - On macOS, additionally `dlsym`, so that runtimes which fetch libinfo's
//!   `getaddrinfo_async_start` by name receive a hook instead. The first
//!   genuine address returned by the loader is captured once and used for
//!   every lookup the hook does not answer itself.
//!
//! Lookups that explicitly ask for IPv6 only are never synthesized.
//!
//! ## Library use
//!
//! The decision logic is ordinary Rust and usable on its own:
//!
//! ```
//! use lohost_dns::{EndpointRecord, is_reserved};
//!
//! assert!(is_reserved(Some(c"api.localhost")));
//! let record = EndpointRecord::synthesize(Some(c"8080"), None);
//! assert_eq!(record.port(), 8080);
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod async_start;
pub mod capture;
pub mod classify;
pub mod config;
pub mod error;
pub mod intercept;
pub mod interpose;
pub mod logging;
pub mod record;
pub mod util;

pub use async_start::{ASYNC_START_SYMBOL, AsyncStartFn, REAL_ASYNC_START};
pub use capture::CaptureSlot;
pub use classify::{LOCAL_SUFFIX, is_reserved};
pub use config::Config;
pub use error::{LohostError, Result};
pub use intercept::{GetAddrInfoFn, getaddrinfo_with};
pub use record::{AddrPayload, EndpointRecord, Hints, LOOPBACK};
