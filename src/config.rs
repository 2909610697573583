//! Runtime configuration.

/// Environment variable that switches on diagnostic output to stderr.
pub const DEBUG_ENV: &str = "LOHOST_DEBUG";

/// Process-wide settings read once at load time.
///
/// # Example
///
/// ```
/// use lohost_dns::Config;
///
/// let config = Config::new().with_debug(true);
/// assert!(config.debug);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    /// Emit `tracing` diagnostics to stderr.
    pub debug: bool,
}

impl Config {
    /// Creates a config with diagnostics disabled.
    #[must_use]
    pub const fn new() -> Self {
        Self { debug: false }
    }

    /// Reads [`DEBUG_ENV`]. Any value, including an empty one, enables
    /// debug output; only absence keeps the shim silent.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key).is_some())
    }

    /// Overrides the debug flag.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn from_lookup(is_set: impl Fn(&str) -> bool) -> Self {
        Self {
            debug: is_set(DEBUG_ENV),
        }
    }
}
