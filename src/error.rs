//! Error types for the Dhyana driver.
//!
//! `CameraError` is the single error type returned by every public operation.
//! It is built with `thiserror` and separates failures the caller can act on:
//!
//! - **`Initialization`**: the SDK or the device session could not be brought up.
//!   The component is unusable.
//! - **`Configuration`**: a setter refused its argument (unsupported binning,
//!   pixel depth, trigger mode, gain, negative frame count, temperature outside
//!   the device range...). Driver state is left untouched.
//! - **`Hardware`**: a call into the vendor driver failed. The message names the
//!   call; there is no finer-grained code. No retry is attempted here.
//! - **`WaitAborted`**: a blocking frame wait was cancelled by the abort primitive.
//! - **`InvalidState`**: a lifecycle call that does not fit the current state of
//!   the producer thread (start without prepare, start while capturing, use after
//!   destroy).

use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type CameraResult<T> = std::result::Result<T, CameraError>;

/// Errors raised by the camera driver.
#[derive(Error, Debug)]
pub enum CameraError {
    /// Driver or session could not be opened.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// A configuration value was rejected.
    #[error("Configuration rejected: {0}")]
    Configuration(String),

    /// A vendor driver call failed.
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// The in-flight frame wait was aborted.
    #[error("Frame wait aborted")]
    WaitAborted,

    /// Lifecycle call not allowed in the current acquisition state.
    #[error("Invalid acquisition state: {0}")]
    InvalidState(String),

    /// Layered configuration could not be extracted.
    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] Box<figment::Error>),

    /// The tracing subscriber could not be installed.
    #[error("Logging initialization error: {0}")]
    Logging(String),
}

impl CameraError {
    /// Shorthand for a failed driver call.
    pub fn hardware(msg: impl Into<String>) -> Self {
        Self::Hardware(msg.into())
    }

    /// Shorthand for a rejected configuration value.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether the error only reports that the frame wait was cancelled.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::WaitAborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CameraError::hardware("Unable to Read TUIDP_EXPOSURETM from the camera");
        assert_eq!(
            err.to_string(),
            "Hardware error: Unable to Read TUIDP_EXPOSURETM from the camera"
        );
    }

    #[test]
    fn test_configuration_error_display() {
        let err = CameraError::configuration("Binning values not supported");
        assert!(err.to_string().starts_with("Configuration rejected"));
    }

    #[test]
    fn test_abort_detection() {
        assert!(CameraError::WaitAborted.is_abort());
        assert!(!CameraError::hardware("wait failed").is_abort());
    }
}
