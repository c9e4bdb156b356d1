//! Camera settings against the simulated driver.

use dhyana_camera::detector::{Bin, ImageType, Roi, Size};
use dhyana_camera::hardware::mock::{
    MockFrameBuffer, MockTucamAdapter, MOCK_API_VERSION, MOCK_FIRMWARE_VERSION, MOCK_MODEL,
};
use dhyana_camera::params::{
    ExposureMode, OutputSignal, OutputSignalConfig, SignalEdge, TucamTriggerEdge, TucamTriggerMode,
};
use dhyana_camera::{Camera, CameraError, CameraStatus, DriverConfig, SharedBufferManager, TriggerMode};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn camera() -> (Camera, Arc<MockTucamAdapter>) {
    let sdk = Arc::new(MockTucamAdapter::with_roi(Roi::new(0, 0, 8, 8)));
    let buffers: SharedBufferManager = Arc::new(Mutex::new(MockFrameBuffer::new(2, 128)));
    let camera =
        Camera::new(sdk.clone(), buffers, &DriverConfig::default()).expect("Failed to create camera");
    (camera, sdk)
}

#[test]
fn test_exposure_round_trip() {
    let (camera, _sdk) = camera();
    camera.set_exp_time(1.5).unwrap();
    assert!((camera.exp_time().unwrap() - 1.5).abs() < 1e-9);
    assert_eq!(camera.exposure_time_range(), (0.0, 10.0));

    assert!(matches!(
        camera.set_exp_time(12.0),
        Err(CameraError::Configuration(_))
    ));
    assert!(camera.set_exp_time(-0.1).is_err());
    assert!((camera.exp_time().unwrap() - 1.5).abs() < 1e-9);
}

#[test]
fn test_latency_is_kept_locally() {
    let (camera, _sdk) = camera();
    camera.set_lat_time(0.125).unwrap();
    assert!((camera.lat_time() - 0.125).abs() < 1e-9);
    assert!(camera.set_lat_time(10.5).is_err());
    assert!((camera.lat_time() - 0.125).abs() < 1e-9);
    assert_eq!(camera.latency_time_range(), (0.0, 10.0));
}

#[test]
fn test_negative_frame_count_rejected() {
    let (camera, _sdk) = camera();
    camera.set_nb_frames(12).unwrap();
    assert!(matches!(
        camera.set_nb_frames(-1),
        Err(CameraError::Configuration(_))
    ));
    assert_eq!(camera.nb_frames(), 12);
    camera.set_nb_frames(0).unwrap();
    assert_eq!(camera.nb_frames(), 0);
}

#[test]
fn test_binning_rejection_keeps_previous_value() {
    let (camera, _sdk) = camera();
    assert!(camera.check_bin(Bin::new(2, 2)).is_err());
    assert!(matches!(
        camera.set_bin(Bin::new(4, 4)),
        Err(CameraError::Configuration(_))
    ));
    assert_eq!(camera.bin(), Bin::UNBINNED);
    camera.set_bin(Bin::new(1, 1)).unwrap();
}

#[test]
fn test_roi_check_is_verbatim() {
    let (camera, _sdk) = camera();
    let roi = Roi::new(3, 5, 7, 11);
    assert_eq!(camera.check_roi(roi), roi);
    assert_eq!(camera.check_roi(Roi::default()), Roi::default());
}

#[test]
fn test_image_type_only_16_bits() {
    let (camera, _sdk) = camera();
    assert_eq!(camera.image_type(), ImageType::Bpp16);
    assert!(camera.set_image_type(ImageType::Bpp8).is_err());
    assert!(camera.set_image_type(ImageType::Bpp32).is_err());
    camera.set_image_type(ImageType::Bpp16).unwrap();
    assert_eq!(camera.image_type(), ImageType::Bpp16);
}

#[test]
fn test_detector_description() {
    let (camera, _sdk) = camera();
    assert_eq!(camera.detector_type(), "Tucsen - Dhyana");
    assert_eq!(camera.detector_model().unwrap(), MOCK_MODEL);
    assert_eq!(camera.detector_image_size(), Size::new(2048, 2048));
    assert_eq!(camera.pixel_size(), (11.0, 11.0));
}

#[test]
fn test_versions() {
    let (camera, _sdk) = camera();
    assert_eq!(camera.tucam_version().unwrap(), MOCK_API_VERSION);
    assert_eq!(
        camera.firmware_version().unwrap(),
        MOCK_FIRMWARE_VERSION.to_string()
    );
}

#[test]
fn test_trigger_modes() {
    let (camera, sdk) = camera();
    assert!(camera.check_trig_mode(TriggerMode::ExtTrigMult));
    assert!(!camera.check_trig_mode(TriggerMode::ExtStartStop));

    camera.set_trig_mode(TriggerMode::ExtGate).unwrap();
    assert_eq!(camera.trig_mode(), TriggerMode::ExtGate);
    assert_eq!(sdk.trigger().unwrap().exposure, ExposureMode::TriggerWidth);

    assert!(camera.set_trig_mode(TriggerMode::IntTrigMult).is_err());
    assert_eq!(camera.trig_mode(), TriggerMode::ExtGate);
}

#[test]
fn test_vendor_trigger_preferences_are_stored() {
    let (camera, _sdk) = camera();
    assert_eq!(camera.tucam_trigger_mode(), TucamTriggerMode::Standard);
    camera.set_tucam_trigger_mode(TucamTriggerMode::Synchronous);
    camera.set_tucam_trigger_edge(TucamTriggerEdge::Falling);
    assert_eq!(camera.tucam_trigger_mode(), TucamTriggerMode::Synchronous);
    assert_eq!(camera.tucam_trigger_edge(), TucamTriggerEdge::Falling);
}

#[test]
fn test_global_gain() {
    let (camera, _sdk) = camera();
    camera.set_global_gain(2).unwrap();
    assert_eq!(camera.global_gain().unwrap(), 2);
    assert!(matches!(
        camera.set_global_gain(3),
        Err(CameraError::Configuration(_))
    ));
    assert_eq!(camera.global_gain().unwrap(), 2);
}

#[test]
fn test_fan_speed() {
    let (camera, _sdk) = camera();
    camera.set_fan_speed(3).unwrap();
    assert_eq!(camera.fan_speed().unwrap(), 3);
    assert!(matches!(
        camera.set_fan_speed(42),
        Err(CameraError::Hardware(_))
    ));
}

#[test]
fn test_temperature() {
    let (camera, _sdk) = camera();
    camera.set_temperature_target(-5.0).unwrap();
    assert_eq!(camera.temperature_target(), -5.0);
    assert!((camera.temperature().unwrap() + 5.0).abs() < 1e-9);
    assert!(matches!(
        camera.set_temperature_target(-51.0),
        Err(CameraError::Configuration(_))
    ));
}

#[test]
fn test_output_signal_ports() {
    let (camera, _sdk) = camera();
    for port in 0..3 {
        assert_eq!(camera.output_signal(port).unwrap(), OutputSignalConfig::default());
    }

    let config = OutputSignalConfig {
        signal: OutputSignal::ExposureStart,
        edge: SignalEdge::Falling,
        delay: Duration::from_millis(2),
        width: Duration::from_millis(10),
    };
    camera.set_output_signal(1, config).unwrap();
    assert_eq!(camera.output_signal(1).unwrap(), config);
    assert_eq!(camera.output_signal(0).unwrap(), OutputSignalConfig::default());

    assert!(matches!(
        camera.set_output_signal(3, config),
        Err(CameraError::Configuration(_))
    ));
    assert!(camera.output_signal(3).is_err());
}

#[test]
fn test_output_signal_beyond_device_range_rejected() {
    let (camera, _sdk) = camera();
    let config = OutputSignalConfig {
        width: Duration::from_secs(3_600),
        ..OutputSignalConfig::default()
    };
    assert!(matches!(
        camera.set_output_signal(0, config),
        Err(CameraError::Configuration(_))
    ));
    assert_eq!(camera.output_signal(0).unwrap(), OutputSignalConfig::default());
}

#[test]
fn test_fault_is_sticky_until_forced() {
    let (camera, _sdk) = camera();
    assert!(camera.set_status(CameraStatus::Fault, false));
    assert!(!camera.set_status(CameraStatus::Ready, false));
    assert_eq!(camera.status(), CameraStatus::Fault);

    assert!(camera.set_status(CameraStatus::Ready, true));
    assert_eq!(camera.status(), CameraStatus::Ready);
}

#[test]
fn test_stop_forces_ready() {
    let (camera, _sdk) = camera();
    camera.set_status(CameraStatus::Fault, false);
    camera.reset().unwrap();
    assert_eq!(camera.status(), CameraStatus::Ready);
}
