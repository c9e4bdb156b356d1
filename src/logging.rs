//! Tracing initialisation.
//!
//! The driver only emits `tracing` events; installing a subscriber is left to
//! the embedding application. [`init`] is provided for hosts that do not have
//! their own: it installs a fmt layer filtered by `RUST_LOG` when set, or by
//! the configured level otherwise.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::DriverConfig;
use crate::error::{CameraError, CameraResult};

/// Install a global subscriber for the configured level.
///
/// Calling this when a global subscriber is already installed is not an error.
pub fn init(config: &DriverConfig) -> CameraResult<()> {
    config.validate()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = fmt::layer()
        .with_thread_names(true)
        .with_target(true)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .or_else(|e| {
            if e.to_string()
                .contains("a global default trace dispatcher has already been set")
            {
                Ok(())
            } else {
                Err(CameraError::Logging(e.to_string()))
            }
        })
}
