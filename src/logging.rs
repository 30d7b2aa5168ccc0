//! Logging init for the CLI: structured `tracing` output on stderr.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "warn,linkgate=info";

/// Initialize logging to stderr. `verbose` lowers the crate's level to `debug`.
/// A second call is a no-op rather than a panic.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose { "warn,linkgate=debug" } else { DEFAULT_FILTER };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_err| return EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
