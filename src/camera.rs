//! Top-level Dhyana camera component.
//!
//! `Camera` ties the vendor session, the acquisition controller and the
//! locally remembered settings together and exposes them to the host as a
//! synchronous API. Every method takes `&self`; lifecycle calls are expected to
//! come from a single controlling thread, getters may be called from anywhere.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use parking_lot::Mutex;
//! use dhyana_camera::detector::Roi;
//! use dhyana_camera::hardware::mock::{MockFrameBuffer, MockTucamAdapter};
//! use dhyana_camera::{Camera, DriverConfig, SharedBufferManager, TriggerMode};
//!
//! let sdk = Arc::new(MockTucamAdapter::with_roi(Roi::new(0, 0, 16, 16)));
//! let host = Arc::new(Mutex::new(MockFrameBuffer::new(4, 16 * 16 * 2)));
//! let buffers: SharedBufferManager = host.clone();
//! let camera = Camera::new(sdk, buffers, &DriverConfig::default())?;
//!
//! camera.set_trig_mode(TriggerMode::ExtTrigMult)?;
//! camera.set_nb_frames(5)?;
//! camera.prepare_acq()?;
//! camera.start_acq()?;
//! while camera.is_acq_running() {
//!     std::thread::sleep(Duration::from_millis(1));
//! }
//! camera.stop_acq()?;
//! assert_eq!(host.lock().frames().len(), 5);
//! # Ok::<(), dhyana_camera::CameraError>(())
//! ```

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::acquisition::{AcquisitionController, AcquisitionRequest};
use crate::buffer::SharedBufferManager;
use crate::config::DriverConfig;
use crate::detector::{Bin, ImageType, Roi, Size, DETECTOR_TYPE, PIXEL_SIZE_X_UM, PIXEL_SIZE_Y_UM};
use crate::error::{CameraError, CameraResult};
use crate::hardware::{CapabilityId, InfoId, PropertyId, TucamAdapter};
use crate::params::{
    check_nb_frames, check_output_port, GlobalGain, OutputSignalConfig, TriggerMode,
    TucamTriggerEdge, TucamTriggerMode, EXPOSURE_TIME_RANGE, LATENCY_TIME_RANGE, OUTPUT_PORT_COUNT,
};
use crate::status::CameraStatus;

/// Settings remembered on the host side.
#[derive(Debug, Clone)]
struct Settings {
    trig_mode: TriggerMode,
    tucam_trigger_mode: TucamTriggerMode,
    tucam_trigger_edge: TucamTriggerEdge,
    nb_frames: u64,
    latency: Duration,
    image_type: ImageType,
    bin: Bin,
    temperature_target: f64,
    output_signals: [OutputSignalConfig; OUTPUT_PORT_COUNT],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trig_mode: TriggerMode::IntTrig,
            tucam_trigger_mode: TucamTriggerMode::default(),
            tucam_trigger_edge: TucamTriggerEdge::default(),
            nb_frames: 1,
            latency: Duration::ZERO,
            image_type: ImageType::Bpp16,
            bin: Bin::UNBINNED,
            temperature_target: 0.0,
            output_signals: [OutputSignalConfig::default(); OUTPUT_PORT_COUNT],
        }
    }
}

/// A Dhyana camera bound to an open driver session and a host buffer manager.
pub struct Camera {
    sdk: Arc<dyn TucamAdapter>,
    acquisition: AcquisitionController,
    settings: Mutex<Settings>,
}

impl Camera {
    /// Build the camera on an already open session.
    ///
    /// Spawns the producer thread and applies the default trigger mode.
    pub fn new(
        sdk: Arc<dyn TucamAdapter>,
        buffers: SharedBufferManager,
        config: &DriverConfig,
    ) -> CameraResult<Self> {
        let acquisition = AcquisitionController::new(Arc::clone(&sdk), buffers, config)?;
        let camera = Self {
            sdk,
            acquisition,
            settings: Mutex::new(Settings::default()),
        };
        camera.set_trig_mode(TriggerMode::IntTrig)?;

        match camera.detector_model() {
            Ok(model) => tracing::info!(%model, "Camera ready"),
            Err(e) => tracing::warn!(error = %e, "Camera ready, model unknown"),
        }
        Ok(camera)
    }

    /// Open the physical camera selected by `config.camera_index`.
    #[cfg(feature = "tucam_hardware")]
    pub fn open(buffers: SharedBufferManager, config: &DriverConfig) -> CameraResult<Self> {
        let sdk = Arc::new(crate::hardware::tucam::TucamSdk::open(config)?);
        Self::new(sdk, buffers, config)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Arm the camera for the configured trigger mode.
    pub fn prepare_acq(&self) -> CameraResult<()> {
        let t0 = Instant::now();
        let mode = self.settings.lock().trig_mode;
        self.acquisition.prepare(mode)?;
        tracing::debug!(?mode, elapsed_ms = t0.elapsed().as_millis() as u64, "prepareAcq");
        Ok(())
    }

    /// Start acquiring with the configured frame count and latency.
    pub fn start_acq(&self) -> CameraResult<()> {
        let t0 = Instant::now();
        let request = {
            let settings = self.settings.lock();
            AcquisitionRequest {
                nb_frames: settings.nb_frames,
                latency: settings.latency,
            }
        };
        self.acquisition.start(request)?;
        tracing::debug!(elapsed_ms = t0.elapsed().as_millis() as u64, "startAcq");
        Ok(())
    }

    /// Stop the current acquisition and release the capture session.
    pub fn stop_acq(&self) -> CameraResult<()> {
        let t0 = Instant::now();
        self.acquisition.stop()?;
        tracing::debug!(elapsed_ms = t0.elapsed().as_millis() as u64, "stopAcq");
        Ok(())
    }

    /// Same as [`stop_acq`](Self::stop_acq).
    pub fn reset(&self) -> CameraResult<()> {
        self.stop_acq()
    }

    /// Stop the producer thread for good. Called by `Drop`.
    pub fn destroy(&self) -> CameraResult<()> {
        self.acquisition.destroy()
    }

    // ---------------------------------------------------------------------
    // Status
    // ---------------------------------------------------------------------

    /// Current status.
    pub fn status(&self) -> CameraStatus {
        self.acquisition.status()
    }

    /// Write the status; `Fault` is only replaced when `force` is set.
    pub fn set_status(&self, status: CameraStatus, force: bool) -> bool {
        self.acquisition.set_status(status, force)
    }

    /// Whether the producer thread is inside a run.
    pub fn is_acq_running(&self) -> bool {
        self.acquisition.is_running()
    }

    /// Frames acquired since the last start.
    pub fn nb_hw_acquired_frames(&self) -> u64 {
        self.acquisition.acquired_frames()
    }

    /// Frame rate of the current or last run.
    pub fn fps(&self) -> f64 {
        self.acquisition.fps()
    }

    // ---------------------------------------------------------------------
    // Trigger
    // ---------------------------------------------------------------------

    /// Whether `mode` can be used.
    pub fn check_trig_mode(&self, mode: TriggerMode) -> bool {
        mode.is_supported()
    }

    /// Select the trigger mode and configure the driver trigger input.
    pub fn set_trig_mode(&self, mode: TriggerMode) -> CameraResult<()> {
        let attr = mode.trigger_attr()?;
        self.sdk.set_trigger(attr)?;
        self.settings.lock().trig_mode = mode;
        tracing::debug!(?mode, "Trigger mode set");
        Ok(())
    }

    /// Selected trigger mode.
    pub fn trig_mode(&self) -> TriggerMode {
        self.settings.lock().trig_mode
    }

    /// Remember the vendor trigger mode preference.
    pub fn set_tucam_trigger_mode(&self, mode: TucamTriggerMode) {
        self.settings.lock().tucam_trigger_mode = mode;
    }

    /// Vendor trigger mode preference.
    pub fn tucam_trigger_mode(&self) -> TucamTriggerMode {
        self.settings.lock().tucam_trigger_mode
    }

    /// Remember the vendor trigger edge preference.
    pub fn set_tucam_trigger_edge(&self, edge: TucamTriggerEdge) {
        self.settings.lock().tucam_trigger_edge = edge;
    }

    /// Vendor trigger edge preference.
    pub fn tucam_trigger_edge(&self) -> TucamTriggerEdge {
        self.settings.lock().tucam_trigger_edge
    }

    // ---------------------------------------------------------------------
    // Timing and frames
    // ---------------------------------------------------------------------

    /// Exposure time in seconds, as reported by the driver.
    pub fn exp_time(&self) -> CameraResult<f64> {
        let ms = self.sdk.property(PropertyId::ExposureTime)?;
        Ok(ms / 1000.0)
    }

    /// Set the exposure time in seconds.
    pub fn set_exp_time(&self, seconds: f64) -> CameraResult<()> {
        check_range("Exposure time", seconds, EXPOSURE_TIME_RANGE)?;
        self.sdk.set_property(PropertyId::ExposureTime, seconds * 1000.0)
    }

    /// Latency between frames in seconds.
    pub fn lat_time(&self) -> f64 {
        self.settings.lock().latency.as_secs_f64()
    }

    /// Set the latency between frames in seconds.
    pub fn set_lat_time(&self, seconds: f64) -> CameraResult<()> {
        check_range("Latency time", seconds, LATENCY_TIME_RANGE)?;
        self.settings.lock().latency = Duration::from_secs_f64(seconds);
        Ok(())
    }

    /// Allowed exposure time span in seconds.
    pub fn exposure_time_range(&self) -> (f64, f64) {
        EXPOSURE_TIME_RANGE
    }

    /// Allowed latency span in seconds.
    pub fn latency_time_range(&self) -> (f64, f64) {
        LATENCY_TIME_RANGE
    }

    /// Set the number of frames of the next run; 0 means unlimited.
    pub fn set_nb_frames(&self, nb_frames: i64) -> CameraResult<()> {
        let nb_frames = check_nb_frames(nb_frames)?;
        self.settings.lock().nb_frames = nb_frames;
        Ok(())
    }

    /// Number of frames of the next run.
    pub fn nb_frames(&self) -> u64 {
        self.settings.lock().nb_frames
    }

    // ---------------------------------------------------------------------
    // Detector information
    // ---------------------------------------------------------------------

    /// Pixel depth of delivered images.
    pub fn image_type(&self) -> ImageType {
        self.settings.lock().image_type
    }

    /// Select the pixel depth; only 16 bits is accepted.
    pub fn set_image_type(&self, image_type: ImageType) -> CameraResult<()> {
        let image_type = image_type.check()?;
        self.settings.lock().image_type = image_type;
        Ok(())
    }

    /// Detector family.
    pub fn detector_type(&self) -> &'static str {
        DETECTOR_TYPE
    }

    /// Camera model as reported by the driver.
    pub fn detector_model(&self) -> CameraResult<String> {
        Ok(self.sdk.info(InfoId::CameraModel)?.text)
    }

    /// Full sensor size.
    pub fn detector_image_size(&self) -> Size {
        Size::sensor()
    }

    /// Pixel pitch in micrometres (x, y).
    pub fn pixel_size(&self) -> (f64, f64) {
        (PIXEL_SIZE_X_UM, PIXEL_SIZE_Y_UM)
    }

    // ---------------------------------------------------------------------
    // Binning and ROI
    // ---------------------------------------------------------------------

    /// Validate a binning request.
    pub fn check_bin(&self, bin: Bin) -> CameraResult<Bin> {
        bin.check()
    }

    /// Apply a binning; only 1x1 is accepted.
    pub fn set_bin(&self, bin: Bin) -> CameraResult<()> {
        let bin = bin.check()?;
        self.settings.lock().bin = bin;
        Ok(())
    }

    /// Current binning.
    pub fn bin(&self) -> Bin {
        self.settings.lock().bin
    }

    /// Any ROI is accepted as requested.
    pub fn check_roi(&self, roi: Roi) -> Roi {
        roi
    }

    /// Program the ROI; an inactive ROI selects the full sensor.
    pub fn set_roi(&self, roi: Roi) -> CameraResult<()> {
        let hw_roi = roi.or_full_frame();
        self.sdk.set_roi(hw_roi)?;
        tracing::debug!(roi = %hw_roi, "ROI set");
        Ok(())
    }

    /// ROI currently programmed in the driver.
    pub fn roi(&self) -> CameraResult<Roi> {
        self.sdk.roi()
    }

    // ---------------------------------------------------------------------
    // Cooling, fan, gain, versions
    // ---------------------------------------------------------------------

    /// Set the cooling target, expressed relative to the device midpoint.
    pub fn set_temperature_target(&self, temperature: f64) -> CameraResult<()> {
        let range = self.sdk.property_range(PropertyId::Temperature)?;
        let (min, max) = (range.min as i64, range.max as i64);
        tracing::debug!(min, max, "Temperature range");

        let middle = max / 2;
        let raw = temperature as i64 + middle;
        if raw < min || raw > max {
            return Err(CameraError::configuration(format!(
                "Unable to set the Temperature Target: it is out of range [{},{}]",
                min - middle,
                max - middle
            )));
        }

        self.sdk.set_property(PropertyId::Temperature, raw as f64)?;
        self.settings.lock().temperature_target = temperature;
        Ok(())
    }

    /// Last cooling target written.
    pub fn temperature_target(&self) -> f64 {
        self.settings.lock().temperature_target
    }

    /// Current sensor temperature.
    pub fn temperature(&self) -> CameraResult<f64> {
        self.sdk.property(PropertyId::Temperature)
    }

    /// Set the fan gear.
    pub fn set_fan_speed(&self, speed: u32) -> CameraResult<()> {
        let gear = i32::try_from(speed)
            .map_err(|_| CameraError::configuration(format!("Fan speed {speed} out of range")))?;
        self.sdk.set_capability(CapabilityId::FanGear, gear)
    }

    /// Current fan gear.
    pub fn fan_speed(&self) -> CameraResult<u32> {
        let gear = self.sdk.capability(CapabilityId::FanGear)?;
        Ok(gear.max(0) as u32)
    }

    /// Select the global gain: 0 HDR, 1 HIGH, 2 LOW.
    pub fn set_global_gain(&self, gain: u32) -> CameraResult<()> {
        let gain = GlobalGain::try_from(gain)?;
        self.sdk
            .set_property(PropertyId::GlobalGain, f64::from(gain.code()))
    }

    /// Current global gain code.
    pub fn global_gain(&self) -> CameraResult<u32> {
        let value = self.sdk.property(PropertyId::GlobalGain)?;
        Ok(value.max(0.0) as u32)
    }

    /// Driver API version.
    pub fn tucam_version(&self) -> CameraResult<String> {
        Ok(self.sdk.info(InfoId::ApiVersion)?.text)
    }

    /// Firmware version.
    pub fn firmware_version(&self) -> CameraResult<String> {
        Ok(self.sdk.info(InfoId::FirmwareVersion)?.value.to_string())
    }

    // ---------------------------------------------------------------------
    // Trigger outputs
    // ---------------------------------------------------------------------

    /// Program trigger-output `port` and cache what the camera reports back.
    pub fn set_output_signal(&self, port: usize, config: OutputSignalConfig) -> CameraResult<()> {
        let port = check_output_port(port)?;
        config.micros()?;
        self.sdk
            .set_trigger_out(port, config)
            .map_err(|e| CameraError::hardware(format!("Unable to set Output signal port {port}: {e}")))?;
        let applied = self
            .sdk
            .trigger_out(port)
            .map_err(|e| CameraError::hardware(format!("Unable to get Output signal port {port}: {e}")))?;
        self.settings.lock().output_signals[port] = applied;
        Ok(())
    }

    /// Cached configuration of trigger-output `port`.
    pub fn output_signal(&self, port: usize) -> CameraResult<OutputSignalConfig> {
        let port = check_output_port(port)?;
        Ok(self.settings.lock().output_signals[port])
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            tracing::error!(error = %e, "Camera teardown failed");
        }
    }
}

fn check_range(what: &str, value: f64, (min, max): (f64, f64)) -> CameraResult<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(CameraError::configuration(format!(
            "{what} {value} s outside [{min}, {max}] s"
        )))
    }
}
