//! Utilities: logging setup.
//!
//! Key items:
//!   derive_level  -v / -q  -> level filter
//!   init_logging  tracing subscriber on stderr; `RUST_LOG` still wins

/// Logging helpers.
pub mod logging {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::EnvFilter;

    /// `-q` beats `-v`; each `-v` goes one level deeper.
    pub fn derive_level(verbose: u8, quiet: bool) -> LevelFilter {
        if quiet {
            return LevelFilter::ERROR;
        }
        match verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    pub fn env_filter(level: LevelFilter) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy()
    }

    /// Install the global subscriber. Logs go to stderr so stdout stays
    /// parseable with `-o json`.
    pub fn init_logging(level: LevelFilter) {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter(level))
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}

pub use logging::{derive_level, init_logging};
