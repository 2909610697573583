//! Diagnostic output.
//!
//! The shim only ever emits `tracing` events. A stderr subscriber is
//! installed when [`Config::debug`] is set; without it every event is
//! discarded.

use crate::config::Config;
use std::sync::Once;
use tracing::Level;

static INIT: Once = Once::new();

/// Builds the stderr subscriber, or `None` when diagnostics are off.
#[must_use]
pub fn subscriber(config: &Config) -> Option<impl tracing::Subscriber + Send + Sync + 'static> {
    config.debug.then(|| {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .without_time()
            .finish()
    })
}

/// Installs the stderr subscriber if `config` asks for it.
///
/// Only the first call has any effect. A subscriber that is already
/// registered is left in place.
pub fn init(config: &Config) {
    let config = *config;
    INIT.call_once(|| {
        let Some(sub) = subscriber(&config) else {
            return;
        };
        if tracing::subscriber::set_global_default(sub).is_err() {
            tracing::debug!("Global subscriber already set, keeping it");
        }
    });
}

/// Initializes from the environment. Cheap after the first call.
pub fn ensure_init() {
    if !INIT.is_completed() {
        init(&Config::from_env());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::subscriber::NoSubscriber;

    fn has_global_subscriber() -> bool {
        !tracing::dispatcher::get_default(|d| d.is::<NoSubscriber>())
    }

    #[test]
    fn silent_config_builds_nothing() {
        assert!(subscriber(&Config::new()).is_none());
    }

    #[test]
    fn debug_config_builds_a_working_subscriber() {
        let sub = subscriber(&Config::new().with_debug(true)).unwrap();
        tracing::subscriber::with_default(sub, || {
            assert!(tracing::enabled!(Level::DEBUG));
            assert!(!tracing::enabled!(Level::TRACE));
            tracing::debug!(node = "app.localhost", "emitted under test");
        });
    }

    #[test]
    fn later_init_does_not_replace_the_first() {
        init(&Config::new());
        assert!(INIT.is_completed());
        let before = has_global_subscriber();

        init(&Config::new().with_debug(true));
        ensure_init();
        assert_eq!(has_global_subscriber(), before);
    }
}
