//! Acquisition parameters and their validation.
//!
//! Plain value types for trigger selection, gain and the trigger-output ports.
//! Driver-side numbering lives in the `raw()` helpers so that the hardware
//! adapter and the mock agree on it.

use std::time::Duration;

use crate::error::{CameraError, CameraResult};

/// Exposure time bounds in seconds.
pub const EXPOSURE_TIME_RANGE: (f64, f64) = (0.0, 10.0);
/// Latency time bounds in seconds.
pub const LATENCY_TIME_RANGE: (f64, f64) = (0.0, 10.0);

/// Trigger modes known to the host framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    /// Internal trigger, paced by the software trigger timer.
    #[default]
    IntTrig,
    /// Internal trigger, one software start per frame.
    IntTrigMult,
    /// One external trigger for the whole sequence.
    ExtTrigSingle,
    /// One external trigger per frame, exposure timed by the camera.
    ExtTrigMult,
    /// External gate: exposure lasts as long as the trigger pulse.
    ExtGate,
    /// External start/stop pair.
    ExtStartStop,
    /// External trigger on readout.
    ExtTrigReadout,
}

impl TriggerMode {
    /// Whether this driver can run in the mode.
    pub fn is_supported(self) -> bool {
        matches!(self, Self::IntTrig | Self::ExtTrigMult | Self::ExtGate)
    }

    /// Whether exposures are started by the software trigger timer.
    pub fn is_internal(self) -> bool {
        self == Self::IntTrig
    }

    /// Capture command issued at prepare time.
    pub fn capture_mode(self) -> CameraResult<CaptureMode> {
        match self {
            Self::IntTrig => Ok(CaptureMode::SoftwareTrigger),
            Self::ExtTrigMult | Self::ExtGate => Ok(CaptureMode::StandardTrigger),
            other => Err(unsupported_trigger(other)),
        }
    }

    /// Trigger attribute pushed to the driver when the mode is selected.
    pub fn trigger_attr(self) -> CameraResult<TriggerAttr> {
        let (capture, exposure) = match self {
            Self::IntTrig => (CaptureMode::SoftwareTrigger, ExposureMode::Timed),
            Self::ExtTrigMult => (CaptureMode::StandardTrigger, ExposureMode::Timed),
            Self::ExtGate => (CaptureMode::StandardTrigger, ExposureMode::TriggerWidth),
            other => return Err(unsupported_trigger(other)),
        };
        Ok(TriggerAttr {
            capture,
            exposure,
            edge: TucamTriggerEdge::Rising,
            frames: 1,
            delay: Duration::ZERO,
        })
    }
}

fn unsupported_trigger(mode: TriggerMode) -> CameraError {
    CameraError::configuration(format!("Trigger mode {mode:?} is not supported"))
}

/// Capture command flavours of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Exposures start on software trigger calls.
    SoftwareTrigger,
    /// Exposures start on the external trigger input.
    StandardTrigger,
}

impl CaptureMode {
    /// Driver value (`TUCCM_*`).
    pub fn raw(self) -> i32 {
        match self {
            Self::StandardTrigger => TucamTriggerMode::Standard.raw(),
            Self::SoftwareTrigger => TucamTriggerMode::Software.raw(),
        }
    }
}

/// How the exposure duration is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureMode {
    /// Exposure time property.
    Timed,
    /// Width of the trigger pulse.
    TriggerWidth,
}

impl ExposureMode {
    /// Driver value (`TUCTE_*`).
    pub fn raw(self) -> i32 {
        match self {
            Self::Timed => 0,
            Self::TriggerWidth => 1,
        }
    }
}

/// Trigger configuration handed to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerAttr {
    /// Capture flavour.
    pub capture: CaptureMode,
    /// Exposure source.
    pub exposure: ExposureMode,
    /// Active edge of the trigger input.
    pub edge: TucamTriggerEdge,
    /// Frames per trigger.
    pub frames: u32,
    /// Delay between trigger and exposure.
    pub delay: Duration,
}

/// Vendor trigger mode preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TucamTriggerMode {
    /// Free running sequence.
    Sequence,
    /// Standard external trigger.
    #[default]
    Standard,
    /// Synchronous external trigger.
    Synchronous,
    /// Global reset external trigger.
    Global,
    /// Software trigger.
    Software,
}

impl TucamTriggerMode {
    /// Driver value (`TUCCM_*`).
    pub fn raw(self) -> i32 {
        match self {
            Self::Sequence => 0,
            Self::Standard => 1,
            Self::Synchronous => 2,
            Self::Global => 3,
            Self::Software => 4,
        }
    }
}

/// Active edge of the trigger input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TucamTriggerEdge {
    /// Rising edge.
    #[default]
    Rising,
    /// Falling edge.
    Falling,
}

impl TucamTriggerEdge {
    /// Driver value (`TUCTD_*`).
    pub fn raw(self) -> i32 {
        match self {
            Self::Rising => 0,
            Self::Falling => 1,
        }
    }
}

/// Global gain setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalGain {
    /// High dynamic range.
    Hdr,
    /// High gain.
    High,
    /// Low gain.
    Low,
}

impl GlobalGain {
    /// Numeric code used by the driver and the host.
    pub fn code(self) -> u32 {
        match self {
            Self::Hdr => 0,
            Self::High => 1,
            Self::Low => 2,
        }
    }
}

impl TryFrom<u32> for GlobalGain {
    type Error = CameraError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Hdr),
            1 => Ok(Self::High),
            2 => Ok(Self::Low),
            other => Err(CameraError::configuration(format!(
                "Gain {other} not available. Available gain values are: 0: HDR, 1: HIGH, 2: LOW"
            ))),
        }
    }
}

/// Number of trigger-output ports on the camera.
pub const OUTPUT_PORT_COUNT: usize = 3;

/// Signal routed to a trigger-output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSignal {
    /// Start of exposure.
    ExposureStart,
    /// Global exposure window.
    GlobalExposure,
    /// End of readout.
    ReadEnd,
}

impl OutputSignal {
    /// Driver value (`TUCTS_*`).
    pub fn raw(self) -> i32 {
        match self {
            Self::ExposureStart => 0,
            Self::GlobalExposure => 1,
            Self::ReadEnd => 2,
        }
    }

    /// Inverse of [`raw`](Self::raw).
    pub fn from_raw(raw: i32) -> CameraResult<Self> {
        match raw {
            0 => Ok(Self::ExposureStart),
            1 => Ok(Self::GlobalExposure),
            2 => Ok(Self::ReadEnd),
            other => Err(CameraError::hardware(format!(
                "Unknown output signal {other} reported by the camera"
            ))),
        }
    }
}

/// Polarity of a trigger-output pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEdge {
    /// Active high.
    Rising,
    /// Active low.
    Falling,
}

impl SignalEdge {
    /// Driver value.
    pub fn raw(self) -> i32 {
        match self {
            Self::Rising => 0,
            Self::Falling => 1,
        }
    }

    /// Inverse of [`raw`](Self::raw).
    pub fn from_raw(raw: i32) -> CameraResult<Self> {
        match raw {
            0 => Ok(Self::Rising),
            1 => Ok(Self::Falling),
            other => Err(CameraError::hardware(format!(
                "Unknown output signal edge {other} reported by the camera"
            ))),
        }
    }
}

/// Configuration of one trigger-output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSignalConfig {
    /// Routed signal.
    pub signal: OutputSignal,
    /// Pulse polarity.
    pub edge: SignalEdge,
    /// Delay before the pulse.
    pub delay: Duration,
    /// Pulse width.
    pub width: Duration,
}

impl Default for OutputSignalConfig {
    fn default() -> Self {
        Self {
            signal: OutputSignal::ReadEnd,
            edge: SignalEdge::Rising,
            delay: Duration::ZERO,
            width: Duration::from_millis(5),
        }
    }
}

impl OutputSignalConfig {
    /// Delay and width in whole microseconds, as the device takes them.
    pub fn micros(&self) -> CameraResult<(i32, i32)> {
        Ok((
            to_micros("delay", self.delay)?,
            to_micros("width", self.width)?,
        ))
    }
}

fn to_micros(what: &str, value: Duration) -> CameraResult<i32> {
    i32::try_from(value.as_micros()).map_err(|_| {
        CameraError::configuration(format!(
            "Output signal {what} of {value:?} exceeds the device range of {} µs",
            i32::MAX
        ))
    })
}

/// Validate a trigger-output port index.
pub fn check_output_port(port: usize) -> CameraResult<usize> {
    if port < OUTPUT_PORT_COUNT {
        Ok(port)
    } else {
        Err(CameraError::configuration(format!(
            "Unable to configure output signal port {port}: valid ports are 0 to {}",
            OUTPUT_PORT_COUNT - 1
        )))
    }
}

/// Validate a requested frame count; 0 means unlimited.
pub fn check_nb_frames(nb_frames: i64) -> CameraResult<u64> {
    u64::try_from(nb_frames).map_err(|_| {
        CameraError::configuration(format!(
            "Number of frames to acquire must not be negative (got {nb_frames})"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_trigger_modes() {
        let supported = [TriggerMode::IntTrig, TriggerMode::ExtTrigMult, TriggerMode::ExtGate];
        for mode in supported {
            assert!(mode.is_supported());
            assert!(mode.trigger_attr().is_ok());
        }
        let unsupported = [
            TriggerMode::IntTrigMult,
            TriggerMode::ExtTrigSingle,
            TriggerMode::ExtStartStop,
            TriggerMode::ExtTrigReadout,
        ];
        for mode in unsupported {
            assert!(!mode.is_supported());
            assert!(mode.capture_mode().is_err());
        }
    }

    #[test]
    fn test_capture_mode_by_trigger() {
        assert_eq!(
            TriggerMode::IntTrig.capture_mode().unwrap(),
            CaptureMode::SoftwareTrigger
        );
        assert_eq!(
            TriggerMode::ExtTrigMult.capture_mode().unwrap(),
            CaptureMode::StandardTrigger
        );
        assert_eq!(
            TriggerMode::ExtGate.capture_mode().unwrap(),
            CaptureMode::StandardTrigger
        );
    }

    #[test]
    fn test_gate_uses_trigger_width() {
        let attr = TriggerMode::ExtGate.trigger_attr().unwrap();
        assert_eq!(attr.exposure, ExposureMode::TriggerWidth);
        assert_eq!(attr.frames, 1);
        assert_eq!(attr.edge, TucamTriggerEdge::Rising);
    }

    #[test]
    fn test_gain_enumeration() {
        assert_eq!(GlobalGain::try_from(0).unwrap(), GlobalGain::Hdr);
        assert_eq!(GlobalGain::try_from(2).unwrap().code(), 2);
        assert!(GlobalGain::try_from(3).is_err());
    }

    #[test]
    fn test_nb_frames_validation() {
        assert_eq!(check_nb_frames(0).unwrap(), 0);
        assert_eq!(check_nb_frames(25).unwrap(), 25);
        assert!(matches!(
            check_nb_frames(-1),
            Err(CameraError::Configuration(_))
        ));
    }

    #[test]
    fn test_output_port_bounds() {
        assert!(check_output_port(0).is_ok());
        assert!(check_output_port(2).is_ok());
        assert!(check_output_port(3).is_err());
    }

    #[test]
    fn test_output_signal_micros() {
        let config = OutputSignalConfig {
            delay: Duration::from_nanos(2_500),
            ..OutputSignalConfig::default()
        };
        assert_eq!(config.micros().unwrap(), (2, 5_000));

        let too_wide = OutputSignalConfig {
            width: Duration::from_secs(3_600),
            ..OutputSignalConfig::default()
        };
        assert!(matches!(
            too_wide.micros(),
            Err(CameraError::Configuration(_))
        ));
    }
}
