//! Tracing subscriber setup.
//!
//! Logs always go to stderr: on the stdio transport stdout carries the
//! protocol stream and must not be interleaved with log lines.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::config::{LogFormat, LoggingConfig};

/// Build the level filter. `RUST_LOG` wins over the configured level,
/// and `verbose` wins over both.
pub fn build_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Plain stderr subscriber used before the configuration is known.
///
/// Scope it with `tracing::subscriber::with_default` around config loading;
/// the configured subscriber is installed afterwards with [`init`].
pub fn bootstrap(verbose: bool) -> impl tracing::Subscriber + Send + Sync {
    fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(build_filter(&LoggingConfig::default(), verbose))
        .finish()
}

/// Install the global subscriber. Calling this twice is a no-op.
pub fn init(config: &LoggingConfig, verbose: bool) {
    let filter = build_filter(config, verbose);

    let result = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr).with_current_span(false))
            .with(filter)
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_forces_debug() {
        let filter = build_filter(&LoggingConfig::default(), true);
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_bootstrap_subscriber_receives_config_loading_events() {
        let enabled = tracing::subscriber::with_default(bootstrap(true), || {
            tracing::enabled!(tracing::Level::DEBUG)
        });
        assert!(enabled);
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        init(&config, false);
        init(&config, false);
    }
}
