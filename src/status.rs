//! Externally visible camera status.
//!
//! `Fault` is sticky: once latched it survives every unforced transition and
//! can only be cleared with `force = true`. Nothing in this crate latches it on
//! its own; it exists for a supervising layer.

use std::fmt;

/// Lifecycle state reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraStatus {
    /// Idle, ready for a new acquisition.
    #[default]
    Ready,
    /// Waiting for the sensor to deliver a frame.
    Exposure,
    /// A frame has arrived and is being copied out.
    Readout,
    /// Unrecoverable condition latched by a supervisor.
    Fault,
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ready => "Ready",
            Self::Exposure => "Exposure",
            Self::Readout => "Readout",
            Self::Fault => "Fault",
        };
        f.write_str(name)
    }
}

/// Holder for the current status applying the sticky-fault rule.
///
/// Not synchronised on its own: it lives inside the acquisition state mutex.
#[derive(Debug, Clone, Default)]
pub struct StatusModel {
    status: CameraStatus,
}

impl StatusModel {
    /// Start in `Ready`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `status` unless `Fault` is latched and `force` is false.
    ///
    /// Returns whether the write happened.
    pub fn set(&mut self, status: CameraStatus, force: bool) -> bool {
        if force || self.status != CameraStatus::Fault {
            self.status = status;
            true
        } else {
            false
        }
    }

    /// Current status.
    pub fn get(&self) -> CameraStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_ready() {
        assert_eq!(StatusModel::new().get(), CameraStatus::Ready);
    }

    #[test]
    fn test_normal_transitions() {
        let mut model = StatusModel::new();
        assert!(model.set(CameraStatus::Exposure, false));
        assert!(model.set(CameraStatus::Readout, false));
        assert_eq!(model.get(), CameraStatus::Readout);
    }

    #[test]
    fn test_fault_is_sticky() {
        let mut model = StatusModel::new();
        model.set(CameraStatus::Fault, false);
        assert!(!model.set(CameraStatus::Ready, false));
        assert!(!model.set(CameraStatus::Exposure, false));
        assert_eq!(model.get(), CameraStatus::Fault);
    }

    #[test]
    fn test_forced_transition_clears_fault() {
        let mut model = StatusModel::new();
        model.set(CameraStatus::Fault, false);
        assert!(model.set(CameraStatus::Ready, true));
        assert_eq!(model.get(), CameraStatus::Ready);
    }
}
