//! Driver configuration using Figment
//!
//! Configuration is built from compiled-in defaults, overridden by environment
//! variables prefixed with `DHYANA_`:
//!
//! ```text
//! DHYANA_CAMERA_INDEX=1
//! DHYANA_TIMER_PERIOD_MS=5
//! DHYANA_LOG_LEVEL=debug
//! ```
//!
//! # Example
//!
//! ```no_run
//! use dhyana_camera::config::DriverConfig;
//!
//! let config = DriverConfig::load()?;
//! println!("Opening camera #{}", config.camera_index);
//! # Ok::<(), dhyana_camera::CameraError>(())
//! ```

use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CameraError, CameraResult};

/// Environment prefix for overrides.
pub const ENV_PREFIX: &str = "DHYANA_";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Runtime settings of the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Index of the camera to open among those enumerated by the SDK.
    #[serde(default)]
    pub camera_index: u32,
    /// Period of the software trigger timer used in internal trigger mode.
    #[serde(default = "default_timer_period_ms")]
    pub timer_period_ms: u64,
    /// Timeout handed to the driver's blocking frame wait.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u32,
    /// Interval at which `stop` re-issues the abort while the producer drains.
    #[serde(default = "default_abort_retry_ms")]
    pub abort_retry_ms: u64,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_timer_period_ms() -> u64 {
    1
}

fn default_wait_timeout_ms() -> u32 {
    1_000_000
}

fn default_abort_retry_ms() -> u64 {
    50
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            timer_period_ms: default_timer_period_ms(),
            wait_timeout_ms: default_wait_timeout_ms(),
            abort_retry_ms: default_abort_retry_ms(),
            log_level: default_log_level(),
        }
    }
}

impl DriverConfig {
    /// Load defaults overridden by `DHYANA_*` environment variables, then validate.
    pub fn load() -> CameraResult<Self> {
        Self::from_figment(Figment::from(Serialized::defaults(Self::default())))
    }

    /// Extract from a caller-provided base figment with the environment merged on top.
    pub fn from_figment(base: Figment) -> CameraResult<Self> {
        let config: Self = base
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(Box::new)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the driver cannot run with.
    pub fn validate(&self) -> CameraResult<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(CameraError::configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }
        if self.timer_period_ms == 0 {
            return Err(CameraError::configuration(
                "timer_period_ms must be greater than zero",
            ));
        }
        if self.abort_retry_ms == 0 {
            return Err(CameraError::configuration(
                "abort_retry_ms must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Software trigger period.
    pub fn timer_period(&self) -> Duration {
        Duration::from_millis(self.timer_period_ms)
    }

    /// Re-abort interval used while draining the producer.
    pub fn abort_retry(&self) -> Duration {
        Duration::from_millis(self.abort_retry_ms)
    }
}
