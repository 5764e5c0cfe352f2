//! Subscriber setup for binaries and tests embedding fpcache.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `fpcache=debug`.
pub const LOG_ENV: &str = "FPCACHE_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Installs a fmt subscriber filtered by `FPCACHE_LOG` (default `warn`).
///
/// An unparsable filter falls back to the default. Returns `false` when a
/// global subscriber is already installed; that subscriber is left untouched.
pub fn init_tracing() -> bool {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directives) => match EnvFilter::try_new(&directives) {
            Ok(filter) => filter,
            Err(err) => {
                eprintln!("ignoring invalid {LOG_ENV} filter '{directives}': {err}");
                EnvFilter::new(DEFAULT_FILTER)
            }
        },
        Err(_) => EnvFilter::new(DEFAULT_FILTER),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
