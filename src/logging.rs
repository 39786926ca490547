//! Logging setup
//!
//! Installs a `tracing-subscriber` fmt subscriber. The filter comes from
//! `MODHOST_LOG`, then `RUST_LOG`, then the configured level. Installation
//! never replaces a subscriber the embedding process already set.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Environment variable holding a filter directive for this crate's host
pub const LOG_ENV_VAR: &str = "MODHOST_LOG";

fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init(config: &LoggingConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.is_ok()
}

static INIT: OnceCell<bool> = OnceCell::new();

/// [`init`] with the process-wide host's settings, at most once.
pub fn init_once() {
    INIT.get_or_init(|| init(&crate::host::host().config().logging));
}
