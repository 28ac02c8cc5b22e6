//! Tracing bootstrap.
//!
//! Library crates only emit `tracing` events; the process entry point decides
//! where they go by calling [`init_tracing`] once.

use crate::config::LoggingSettings;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber built from `settings`.
///
/// `RUST_LOG` takes precedence over `settings.level` when set. Returns `false`
/// when a global subscriber was already installed, which is not an error.
pub fn init_tracing(settings: &LoggingSettings) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_str()));

    let installed = if settings.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::debug!(level = %settings.level, json = settings.json, "Tracing initialised");
    }
    installed
}

/// Install a subscriber that writes through the test harness capture.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("gantry=debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        init_test_tracing();
        // A subscriber is already installed, so this must report false rather than panic.
        assert!(!init_tracing(&LoggingSettings::default()));
    }
}
