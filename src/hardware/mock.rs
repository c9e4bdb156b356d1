//! Mock TUCAM driver
//!
//! Simulates an open Dhyana session for testing without physical hardware.
//!
//! # Behaviour
//!
//! - Software-trigger capture produces one frame per `software_trigger` call.
//!   Triggers arriving while a frame is already pending are dropped, as on the
//!   real sensor.
//! - Standard-trigger capture produces frames on its own every
//!   `frame_period` (default 2 ms), standing in for an external trigger source.
//! - `abort_wait` is sticky: once issued, every wait fails with
//!   `WaitAborted` until capture is started again. `with_lossy_abort` drops
//!   the first aborts instead, like an abort issued before the wait begins.
//! - Frame payloads are a 16-bit little-endian ramp offset by the frame index.
//! - Cooling is instant: the reported temperature follows the target at once.
//!
//! # Example
//!
//! ```
//! use dhyana_camera::hardware::mock::MockTucamAdapter;
//! use dhyana_camera::hardware::TucamAdapter;
//! use dhyana_camera::params::CaptureMode;
//!
//! let sdk = MockTucamAdapter::new();
//! sdk.alloc_buffer()?;
//! sdk.start_capture(CaptureMode::SoftwareTrigger)?;
//! sdk.software_trigger()?;
//! let frame = sdk.wait_for_frame()?;
//! assert_eq!(frame.index, 0);
//! # Ok::<(), dhyana_camera::CameraError>(())
//! ```

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::{
    CapabilityId, FrameDescriptor, InfoId, InfoValue, PropertyId, PropertyRange, TucamAdapter,
};
use crate::buffer::{FrameBufferManager, FrameInfo};
use crate::detector::{Roi, SENSOR_HEIGHT, SENSOR_WIDTH};
use crate::error::{CameraError, CameraResult};
use crate::params::{CaptureMode, OutputSignalConfig, TriggerAttr, OUTPUT_PORT_COUNT};

const BYTES_PER_PIXEL: usize = 2;

/// Model name reported by the mock.
pub const MOCK_MODEL: &str = "Dhyana 95 (simulated)";
/// API version text reported by the mock.
pub const MOCK_API_VERSION: &str = "1.0.0.0";
/// Firmware version value reported by the mock.
pub const MOCK_FIRMWARE_VERSION: i32 = 0x0102;

/// Call counters, for assertions on resource pairing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    /// `alloc_buffer` calls.
    pub allocations: u32,
    /// `release_buffer` calls.
    pub releases: u32,
    /// `start_capture` calls.
    pub capture_starts: u32,
    /// `stop_capture` calls.
    pub capture_stops: u32,
    /// Accepted `software_trigger` calls.
    pub software_triggers: u64,
    /// `abort_wait` calls.
    pub aborts: u32,
    /// Frames handed out by `wait_for_frame`.
    pub frames_delivered: u64,
}

struct MockState {
    buffer_allocated: bool,
    capture: Option<CaptureMode>,
    trigger_pending: bool,
    aborted: bool,
    lost_aborts: u32,
    failing_waits: u32,
    next_index: u32,
    last_frame: Option<FrameDescriptor>,
    next_auto_frame: Instant,
    properties: HashMap<PropertyId, f64>,
    fan_gear: i32,
    trigger: Option<TriggerAttr>,
    roi: Roi,
    ports: [OutputSignalConfig; OUTPUT_PORT_COUNT],
    stats: MockStats,
}

/// Simulated Dhyana session.
pub struct MockTucamAdapter {
    state: Mutex<MockState>,
    cond: Condvar,
    frame_period: Duration,
}

impl MockTucamAdapter {
    /// Open a full-frame simulated camera.
    pub fn new() -> Self {
        Self::with_roi(Roi::full_frame())
    }

    /// Open a simulated camera with a preset ROI, to keep test frames small.
    pub fn with_roi(roi: Roi) -> Self {
        let properties = HashMap::from([
            (PropertyId::ExposureTime, 10.0),
            (PropertyId::Temperature, 50.0),
            (PropertyId::GlobalGain, 0.0),
        ]);
        Self {
            state: Mutex::new(MockState {
                buffer_allocated: false,
                capture: None,
                trigger_pending: false,
                aborted: false,
                lost_aborts: 0,
                failing_waits: 0,
                next_index: 0,
                last_frame: None,
                next_auto_frame: Instant::now(),
                properties,
                fan_gear: 0,
                trigger: None,
                roi,
                ports: [OutputSignalConfig::default(); OUTPUT_PORT_COUNT],
                stats: MockStats::default(),
            }),
            cond: Condvar::new(),
            frame_period: Duration::from_millis(2),
        }
    }

    /// Enumerate `camera_count` devices and open the first one.
    pub fn open(camera_count: u32) -> CameraResult<Self> {
        if camera_count == 0 {
            return Err(CameraError::Initialization(
                "No camera found".to_owned(),
            ));
        }
        tracing::info!(camera_count, "Mock TUCAM session opened");
        Ok(Self::new())
    }

    /// Period between frames in standard-trigger capture.
    #[must_use]
    pub fn with_frame_period(mut self, period: Duration) -> Self {
        self.frame_period = period;
        self
    }

    /// Ignore the first `count` calls to `abort_wait`. They are still counted.
    #[must_use]
    pub fn with_lossy_abort(self, count: u32) -> Self {
        self.state.lock().lost_aborts = count;
        self
    }

    /// Make the next `count` frame waits fail with a hardware error.
    pub fn fail_next_waits(&self, count: u32) {
        self.state.lock().failing_waits = count;
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> MockStats {
        self.state.lock().stats
    }

    /// Capture mode currently running, if any.
    pub fn capture_mode(&self) -> Option<CaptureMode> {
        self.state.lock().capture
    }

    /// Whether the driver frame buffer is allocated.
    pub fn buffer_allocated(&self) -> bool {
        self.state.lock().buffer_allocated
    }

    /// Last trigger configuration written.
    pub fn trigger(&self) -> Option<TriggerAttr> {
        self.state.lock().trigger
    }

    fn frame_size(roi: &Roi) -> usize {
        roi.size.width as usize * roi.size.height as usize * BYTES_PER_PIXEL
    }

    fn deliver(state: &mut MockState) -> FrameDescriptor {
        let frame = FrameDescriptor {
            index: state.next_index,
            width: state.roi.size.width,
            height: state.roi.size.height,
            size: Self::frame_size(&state.roi),
        };
        state.next_index = state.next_index.wrapping_add(1);
        state.last_frame = Some(frame);
        state.stats.frames_delivered += 1;
        frame
    }
}

impl Default for MockTucamAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TucamAdapter for MockTucamAdapter {
    fn alloc_buffer(&self) -> CameraResult<()> {
        let mut state = self.state.lock();
        if state.buffer_allocated {
            return Err(CameraError::hardware("TUCAM_Buf_Alloc: buffer already allocated"));
        }
        state.buffer_allocated = true;
        state.stats.allocations += 1;
        Ok(())
    }

    fn release_buffer(&self) -> CameraResult<()> {
        let mut state = self.state.lock();
        if !state.buffer_allocated {
            return Err(CameraError::hardware("TUCAM_Buf_Release: no buffer allocated"));
        }
        state.buffer_allocated = false;
        state.last_frame = None;
        state.stats.releases += 1;
        Ok(())
    }

    fn start_capture(&self, mode: CaptureMode) -> CameraResult<()> {
        let mut state = self.state.lock();
        if !state.buffer_allocated {
            return Err(CameraError::hardware("TUCAM_Cap_Start: no buffer allocated"));
        }
        if state.capture.is_some() {
            return Err(CameraError::hardware("TUCAM_Cap_Start: capture already running"));
        }
        state.capture = Some(mode);
        state.aborted = false;
        state.trigger_pending = false;
        state.next_auto_frame = Instant::now() + self.frame_period;
        state.stats.capture_starts += 1;
        tracing::debug!(?mode, "Mock capture started");
        Ok(())
    }

    fn stop_capture(&self) -> CameraResult<()> {
        let mut state = self.state.lock();
        if state.capture.take().is_none() {
            return Err(CameraError::hardware("TUCAM_Cap_Stop: capture not running"));
        }
        state.stats.capture_stops += 1;
        self.cond.notify_all();
        Ok(())
    }

    fn wait_for_frame(&self) -> CameraResult<FrameDescriptor> {
        let mut state = self.state.lock();
        loop {
            if state.aborted {
                return Err(CameraError::WaitAborted);
            }
            let Some(mode) = state.capture else {
                return Err(CameraError::hardware("TUCAM_Buf_WaitForFrame: capture not running"));
            };
            if state.failing_waits > 0 {
                state.failing_waits -= 1;
                return Err(CameraError::hardware("TUCAM_Buf_WaitForFrame: timeout"));
            }

            match mode {
                CaptureMode::SoftwareTrigger => {
                    if state.trigger_pending {
                        state.trigger_pending = false;
                        return Ok(Self::deliver(&mut state));
                    }
                    self.cond.wait(&mut state);
                }
                CaptureMode::StandardTrigger => {
                    let now = Instant::now();
                    if now >= state.next_auto_frame {
                        state.next_auto_frame = now + self.frame_period;
                        return Ok(Self::deliver(&mut state));
                    }
                    let deadline = state.next_auto_frame;
                    self.cond.wait_until(&mut state, deadline);
                }
            }
        }
    }

    fn read_frame(&self, dest: &mut [u8]) -> CameraResult<usize> {
        let state = self.state.lock();
        let frame = state
            .last_frame
            .ok_or_else(|| CameraError::hardware("No frame available to read"))?;
        if dest.len() < frame.size {
            return Err(CameraError::hardware(format!(
                "Frame of {} bytes does not fit a {} byte buffer",
                frame.size,
                dest.len()
            )));
        }

        for (i, px) in dest[..frame.size].chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let value = (i as u32).wrapping_add(frame.index) as u16;
            px.copy_from_slice(&value.to_le_bytes());
        }
        Ok(frame.size)
    }

    fn abort_wait(&self) -> CameraResult<()> {
        let mut state = self.state.lock();
        state.stats.aborts += 1;
        if state.lost_aborts > 0 {
            state.lost_aborts -= 1;
            return Ok(());
        }
        state.aborted = true;
        self.cond.notify_all();
        Ok(())
    }

    fn software_trigger(&self) -> CameraResult<()> {
        let mut state = self.state.lock();
        if state.capture != Some(CaptureMode::SoftwareTrigger) {
            return Err(CameraError::hardware(
                "TUCAM_Cap_DoSoftwareTrigger: not in software trigger capture",
            ));
        }
        state.trigger_pending = true;
        state.stats.software_triggers += 1;
        self.cond.notify_all();
        Ok(())
    }

    fn set_trigger(&self, attr: TriggerAttr) -> CameraResult<()> {
        self.state.lock().trigger = Some(attr);
        Ok(())
    }

    fn property(&self, id: PropertyId) -> CameraResult<f64> {
        let state = self.state.lock();
        let value = state.properties.get(&id).copied().unwrap_or_default();
        match id {
            PropertyId::Temperature => {
                let range = self.property_range(id)?;
                Ok(value - range.max / 2.0)
            }
            _ => Ok(value),
        }
    }

    fn set_property(&self, id: PropertyId, value: f64) -> CameraResult<()> {
        let range = self.property_range(id)?;
        if value < range.min || value > range.max {
            return Err(CameraError::hardware(format!(
                "TUCAM_Prop_SetValue: {value} outside [{}, {}] for {id:?}",
                range.min, range.max
            )));
        }
        self.state.lock().properties.insert(id, value);
        Ok(())
    }

    fn property_range(&self, id: PropertyId) -> CameraResult<PropertyRange> {
        let (min, max, default) = match id {
            PropertyId::ExposureTime => (0.0, 10_000.0, 10.0),
            PropertyId::Temperature => (0.0, 100.0, 50.0),
            PropertyId::GlobalGain => (0.0, 2.0, 0.0),
        };
        Ok(PropertyRange { min, max, default })
    }

    fn capability(&self, id: CapabilityId) -> CameraResult<i32> {
        match id {
            CapabilityId::FanGear => Ok(self.state.lock().fan_gear),
        }
    }

    fn set_capability(&self, id: CapabilityId, value: i32) -> CameraResult<()> {
        match id {
            CapabilityId::FanGear => {
                if !(0..=6).contains(&value) {
                    return Err(CameraError::hardware(format!(
                        "TUCAM_Capa_SetValue: fan gear {value} not supported"
                    )));
                }
                self.state.lock().fan_gear = value;
                Ok(())
            }
        }
    }

    fn info(&self, id: InfoId) -> CameraResult<InfoValue> {
        let value = match id {
            InfoId::CameraModel => InfoValue {
                value: 0,
                text: MOCK_MODEL.to_owned(),
            },
            InfoId::ApiVersion => InfoValue {
                value: 0,
                text: MOCK_API_VERSION.to_owned(),
            },
            InfoId::FirmwareVersion => InfoValue {
                value: MOCK_FIRMWARE_VERSION,
                text: String::new(),
            },
        };
        Ok(value)
    }

    fn roi(&self) -> CameraResult<Roi> {
        Ok(self.state.lock().roi)
    }

    fn set_roi(&self, roi: Roi) -> CameraResult<()> {
        if !roi.is_active()
            || roi.x + roi.size.width > SENSOR_WIDTH
            || roi.y + roi.size.height > SENSOR_HEIGHT
        {
            return Err(CameraError::hardware(format!(
                "TUCAM_Cap_SetROI: {roi} does not fit the sensor"
            )));
        }
        self.state.lock().roi = roi;
        Ok(())
    }

    fn trigger_out(&self, port: usize) -> CameraResult<OutputSignalConfig> {
        self.state
            .lock()
            .ports
            .get(port)
            .copied()
            .ok_or_else(|| CameraError::hardware(format!("TUCAM_Cap_GetTriggerOut: no port {port}")))
    }

    fn set_trigger_out(&self, port: usize, config: OutputSignalConfig) -> CameraResult<()> {
        let (delay, width) = config.micros()?;
        let mut state = self.state.lock();
        let slot = state
            .ports
            .get_mut(port)
            .ok_or_else(|| CameraError::hardware(format!("TUCAM_Cap_SetTriggerOut: no port {port}")))?;
        *slot = OutputSignalConfig {
            delay: Duration::from_micros(delay.unsigned_abs().into()),
            width: Duration::from_micros(width.unsigned_abs().into()),
            ..config
        };
        Ok(())
    }
}

/// In-memory host buffer manager for tests.
///
/// Holds `slots` buffers reused round-robin and records every notification.
pub struct MockFrameBuffer {
    slots: Vec<Vec<u8>>,
    frames: Vec<FrameInfo>,
    start_timestamp: Option<DateTime<Utc>>,
    stop_after: Option<u64>,
}

impl MockFrameBuffer {
    /// `slots` buffers of `slot_size` bytes each.
    pub fn new(slots: usize, slot_size: usize) -> Self {
        Self {
            slots: vec![vec![0; slot_size]; slots.max(1)],
            frames: Vec::new(),
            start_timestamp: None,
            stop_after: None,
        }
    }

    /// Answer "no more frames" once `count` frames have been received.
    #[must_use]
    pub fn stop_after(mut self, count: u64) -> Self {
        self.stop_after = Some(count);
        self
    }

    /// Notifications received so far.
    pub fn frames(&self) -> &[FrameInfo] {
        &self.frames
    }

    /// Timestamp recorded by the last start.
    pub fn start_timestamp(&self) -> Option<DateTime<Utc>> {
        self.start_timestamp
    }

    /// Contents of the slot that holds frame `acq_frame_nb`.
    pub fn slot(&self, acq_frame_nb: u64) -> &[u8] {
        &self.slots[(acq_frame_nb % self.slots.len() as u64) as usize]
    }

    /// Forget previous notifications.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl FrameBufferManager for MockFrameBuffer {
    fn set_start_timestamp(&mut self, at: DateTime<Utc>) {
        self.start_timestamp = Some(at);
    }

    fn frame_buffer(&mut self, acq_frame_nb: u64) -> &mut [u8] {
        let n = self.slots.len() as u64;
        &mut self.slots[(acq_frame_nb % n) as usize]
    }

    fn new_frame_ready(&mut self, info: FrameInfo) -> bool {
        self.frames.push(info);
        self.stop_after
            .map_or(true, |limit| (self.frames.len() as u64) < limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> MockTucamAdapter {
        MockTucamAdapter::with_roi(Roi::new(0, 0, 8, 4))
    }

    #[test]
    fn test_open_without_camera_fails() {
        assert!(matches!(
            MockTucamAdapter::open(0),
            Err(CameraError::Initialization(_))
        ));
        assert!(MockTucamAdapter::open(1).is_ok());
    }

    #[test]
    fn test_software_trigger_produces_one_frame() {
        let sdk = small();
        sdk.alloc_buffer().unwrap();
        sdk.start_capture(CaptureMode::SoftwareTrigger).unwrap();
        sdk.software_trigger().unwrap();

        let frame = sdk.wait_for_frame().unwrap();
        assert_eq!(frame.size, 8 * 4 * 2);

        let mut buf = vec![0u8; frame.size];
        assert_eq!(sdk.read_frame(&mut buf).unwrap(), frame.size);
        assert_eq!(u16::from_le_bytes([buf[2], buf[3]]), 1);
    }

    #[test]
    fn test_abort_unblocks_waiter() {
        let sdk = std::sync::Arc::new(small());
        sdk.alloc_buffer().unwrap();
        sdk.start_capture(CaptureMode::SoftwareTrigger).unwrap();

        let waiter = {
            let sdk = std::sync::Arc::clone(&sdk);
            std::thread::spawn(move || sdk.wait_for_frame())
        };
        std::thread::sleep(Duration::from_millis(20));
        sdk.abort_wait().unwrap();

        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(CameraError::WaitAborted)));
    }

    #[test]
    fn test_abort_cleared_by_next_capture() {
        let sdk = small();
        sdk.alloc_buffer().unwrap();
        sdk.start_capture(CaptureMode::StandardTrigger).unwrap();
        sdk.abort_wait().unwrap();
        assert!(sdk.wait_for_frame().is_err());

        sdk.stop_capture().unwrap();
        sdk.start_capture(CaptureMode::StandardTrigger).unwrap();
        assert!(sdk.wait_for_frame().is_ok());
    }

    #[test]
    fn test_lossy_abort_drops_first_calls() {
        let sdk = small().with_lossy_abort(1);
        sdk.alloc_buffer().unwrap();
        sdk.start_capture(CaptureMode::StandardTrigger).unwrap();

        sdk.abort_wait().unwrap();
        assert!(sdk.wait_for_frame().is_ok());
        sdk.abort_wait().unwrap();
        assert!(matches!(sdk.wait_for_frame(), Err(CameraError::WaitAborted)));
        assert_eq!(sdk.stats().aborts, 2);
    }

    #[test]
    fn test_read_into_short_buffer_fails() {
        let sdk = small();
        sdk.alloc_buffer().unwrap();
        sdk.start_capture(CaptureMode::StandardTrigger).unwrap();
        sdk.wait_for_frame().unwrap();
        let mut buf = vec![0u8; 4];
        assert!(sdk.read_frame(&mut buf).is_err());
    }

    #[test]
    fn test_injected_wait_failures() {
        let sdk = small();
        sdk.alloc_buffer().unwrap();
        sdk.start_capture(CaptureMode::StandardTrigger).unwrap();
        sdk.fail_next_waits(2);
        assert!(sdk.wait_for_frame().is_err());
        assert!(sdk.wait_for_frame().is_err());
        assert!(sdk.wait_for_frame().is_ok());
    }

    #[test]
    fn test_frame_buffer_stop_request() {
        let mut host = MockFrameBuffer::new(2, 16).stop_after(2);
        let info = |n| FrameInfo {
            acq_frame_nb: n,
            hw_index: 0,
            size: 16,
        };
        assert!(host.new_frame_ready(info(0)));
        assert!(!host.new_frame_ready(info(1)));
        assert_eq!(host.frames().len(), 2);
    }
}
