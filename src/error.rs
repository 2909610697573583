//! Error types.

use libc::c_int;
use thiserror::Error;

/// Result alias for interception operations.
pub type Result<T> = std::result::Result<T, LohostError>;

/// Errors raised while synthesizing or forwarding a lookup.
///
/// None of these cross the C boundary as panics; the exported entry points
/// report them through [`LohostError::eai_code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LohostError {
    /// The genuine resolver symbol could not be located.
    #[error("real symbol not found: {symbol}")]
    SymbolNotFound {
        /// The symbol that was looked up.
        symbol: &'static str,
    },

    /// `calloc` failed while building a synthetic record.
    #[error("failed to allocate synthetic addrinfo record")]
    Allocation,

    /// The real `getaddrinfo_async_start` has not been captured yet.
    #[error("real getaddrinfo_async_start has not been captured")]
    NotCaptured,
}

impl LohostError {
    /// Status code handed back to C callers for this error.
    #[must_use]
    pub const fn eai_code(&self) -> c_int {
        match self {
            Self::SymbolNotFound { .. } => libc::EAI_SYSTEM,
            Self::Allocation => libc::EAI_MEMORY,
            Self::NotCaptured => -1,
        }
    }
}
