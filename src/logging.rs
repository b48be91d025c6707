//! Log setup for the import binary.
//!
//! Logs go to stderr so stdout carries only the script banners and echoed
//! script text.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::{ImportError, Result};

/// Map the `-v`/`-q` flags to a level: quiet wins, then 0=INFO, 1=DEBUG,
/// 2+=TRACE.
pub fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::INFO,
        (false, 1) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    }
}

/// Install the global subscriber. `RUST_LOG` directives take precedence over
/// the flag-derived level.
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for(verbose, quiet).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| ImportError::Configuration(format!("failed to initialize logging: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        let cases = [
            ((true, 0), LevelFilter::ERROR),
            ((true, 3), LevelFilter::ERROR),
            ((false, 0), LevelFilter::INFO),
            ((false, 1), LevelFilter::DEBUG),
            ((false, 2), LevelFilter::TRACE),
            ((false, 9), LevelFilter::TRACE),
        ];
        for ((quiet, verbose), expected) in cases {
            assert_eq!(level_for(verbose, quiet), expected, "quiet={quiet} verbose={verbose}");
        }
    }
}
