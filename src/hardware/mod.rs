//! Vendor driver abstraction.
//!
//! `TucamAdapter` covers the subset of the TUCAM driver the camera needs:
//! frame buffer and capture control, the blocking frame wait with its abort,
//! software trigger, properties, capabilities, info strings, ROI and the
//! trigger-output ports.
//!
//! An adapter instance *is* an open device session: it is opened by its
//! constructor and closed on drop. Two implementations exist:
//!
//! - [`mock::MockTucamAdapter`] simulates a camera for tests and development.
//! - `tucam::TucamSdk` calls the real driver (feature `tucam_hardware`).

pub mod mock;
#[cfg(feature = "tucam_hardware")]
pub mod tucam;

use crate::detector::Roi;
use crate::error::CameraResult;
use crate::params::{CaptureMode, OutputSignalConfig, TriggerAttr};

/// Description of the frame returned by a successful wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    /// Driver frame counter.
    pub index: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Payload size in bytes.
    pub size: usize,
}

/// Floating point properties (`TUIDP_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyId {
    /// Exposure time in milliseconds.
    ExposureTime,
    /// Sensor temperature; setting it selects the cooling target.
    Temperature,
    /// Global gain code.
    GlobalGain,
}

/// Integer capabilities (`TUIDC_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityId {
    /// Cooling fan gear.
    FanGear,
}

/// Read-only device information (`TUIDI_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoId {
    /// Camera model name.
    CameraModel,
    /// Driver API version.
    ApiVersion,
    /// Firmware version.
    FirmwareVersion,
}

/// Allowed span of a property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// Factory default.
    pub default: f64,
}

/// Value returned by an info query: numeric and textual parts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InfoValue {
    /// Numeric part.
    pub value: i32,
    /// Text part, empty when the driver reports none.
    pub text: String,
}

/// Open session on one Dhyana camera.
///
/// All methods take `&self`: the producer thread blocks in
/// [`wait_for_frame`](Self::wait_for_frame) while control calls such as
/// [`abort_wait`](Self::abort_wait) arrive from other threads, so
/// implementations must synchronise internally.
pub trait TucamAdapter: Send + Sync {
    /// Allocate the driver-side frame buffer.
    fn alloc_buffer(&self) -> CameraResult<()>;

    /// Release the driver-side frame buffer.
    fn release_buffer(&self) -> CameraResult<()>;

    /// Start capture in the given mode.
    fn start_capture(&self, mode: CaptureMode) -> CameraResult<()>;

    /// Stop capture.
    fn stop_capture(&self) -> CameraResult<()>;

    /// Block until the next frame is available.
    ///
    /// Returns [`CameraError::WaitAborted`](crate::CameraError::WaitAborted)
    /// when [`abort_wait`](Self::abort_wait) cancels the wait.
    fn wait_for_frame(&self) -> CameraResult<FrameDescriptor>;

    /// Copy the payload of the last frame into `dest`; returns bytes written.
    fn read_frame(&self, dest: &mut [u8]) -> CameraResult<usize>;

    /// Cancel a blocking frame wait, in progress or about to start.
    fn abort_wait(&self) -> CameraResult<()>;

    /// Fire one software trigger.
    fn software_trigger(&self) -> CameraResult<()>;

    /// Configure the trigger input.
    fn set_trigger(&self, attr: TriggerAttr) -> CameraResult<()>;

    /// Read a property.
    fn property(&self, id: PropertyId) -> CameraResult<f64>;

    /// Write a property.
    fn set_property(&self, id: PropertyId, value: f64) -> CameraResult<()>;

    /// Allowed range of a property.
    fn property_range(&self, id: PropertyId) -> CameraResult<PropertyRange>;

    /// Read a capability.
    fn capability(&self, id: CapabilityId) -> CameraResult<i32>;

    /// Write a capability.
    fn set_capability(&self, id: CapabilityId, value: i32) -> CameraResult<()>;

    /// Query device information.
    fn info(&self, id: InfoId) -> CameraResult<InfoValue>;

    /// Current hardware ROI.
    fn roi(&self) -> CameraResult<Roi>;

    /// Program the hardware ROI.
    fn set_roi(&self, roi: Roi) -> CameraResult<()>;

    /// Read back a trigger-output port.
    fn trigger_out(&self, port: usize) -> CameraResult<OutputSignalConfig>;

    /// Program a trigger-output port.
    fn set_trigger_out(&self, port: usize, config: OutputSignalConfig) -> CameraResult<()>;
}
