//! Logging initialization
//!
//! Installs a `tracing-subscriber` fmt subscriber writing to stderr, filtered
//! by `RUST_LOG` (falling back to [`DEFAULT_DIRECTIVE`]), and bridges `log`
//! records into `tracing`. Safe to call more than once; only the first call
//! installs.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVE: &str = "punch=info";

/// Install the global subscriber with [`DEFAULT_DIRECTIVE`].
///
/// Returns `false` if a global subscriber was already set.
pub fn init() -> bool {
    init_with_directive(DEFAULT_DIRECTIVE)
}

/// Install the global subscriber, using `directive` when `RUST_LOG` is unset.
pub fn init_with_directive(directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    // Another logger may already own the `log` facade; tracing output still works.
    let _ = tracing_log::LogTracer::init();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_init_is_idempotent() {
        let first = init();
        // A second call never installs a second subscriber
        assert!(!init());
        tracing::info!(target: "punch_sdk", "logging initialized: {}", first);
    }
}
