//! Observability: tracing init.
//!
//! Uses config::ObservabilityConfig for PARLEY_QUIET, PARLEY_LOG_LEVEL, PARLEY_LOG_JSON.

use tracing_subscriber::{prelude::*, EnvFilter};

/// Tracing initialization mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingMode {
    /// Default: use PARLEY_LOG_LEVEL / PARLEY_QUIET from env
    Default,
    /// Chat: answers stream to the terminal, keep engine progress logs out of the way
    Chat,
}

/// Build the filter directive for the given mode and config values.
pub fn filter_directive(mode: TracingMode, quiet: bool, log_level: &str) -> String {
    let level = if quiet { "warn" } else { log_level };
    match mode {
        TracingMode::Default => level.to_string(),
        TracingMode::Chat => format!("{},parley_agent=warn", level),
    }
}

/// Initialize tracing. Call at process startup.
/// `RUST_LOG` overrides everything; when PARLEY_QUIET=1 only WARN and above are logged.
pub fn init_tracing(mode: TracingMode) {
    let cfg = crate::config::ObservabilityConfig::from_env();
    let level = filter_directive(mode, cfg.quiet, &cfg.log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
}
