//! Subscriber installation. Kept in its own test binary because it sets the
//! process-wide default subscriber.

use dhyana_camera::{logging, CameraError, DriverConfig};

#[test]
fn test_init_is_repeatable_and_validates() {
    let config = DriverConfig {
        log_level: "debug".to_owned(),
        ..DriverConfig::default()
    };
    logging::init(&config).expect("first init");
    logging::init(&config).expect("second init is a no-op");

    let bad = DriverConfig {
        log_level: "chatty".to_owned(),
        ..DriverConfig::default()
    };
    assert!(matches!(
        logging::init(&bad),
        Err(CameraError::Configuration(_))
    ));
}
