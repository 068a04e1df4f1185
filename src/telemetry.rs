//! Logging setup for the server binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::GatekeepError;

/// Install a fmt subscriber filtered by `RUST_LOG`, or `default_level` when unset.
pub fn init_tracing(default_level: &str) -> Result<(), GatekeepError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| GatekeepError::invalid_argument(format!("invalid log filter: {e}")))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| GatekeepError::internal(format!("failed to install tracing subscriber: {e}")))
}
