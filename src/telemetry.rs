use crate::error::{GatewayError, Result};
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG` overrides the default `info` level. Stdout stays free for the
/// audit report.
pub fn init_tracing(json: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true);

    let installed = if json {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| GatewayError::Telemetry(e.to_string()))
}
