//! Driver for Tucsen Dhyana scientific cameras.
//!
//! This library drives a Dhyana camera through the TUCAM driver and delivers
//! frames into buffers owned by a host acquisition framework. It provides the
//! acquisition lifecycle (prepare, start, stop, destroy) backed by a dedicated
//! producer thread, the externally visible status model, the software trigger
//! timer used in internal trigger mode and the scalar camera settings.
//!
//! The vendor driver is reached through the [`hardware::TucamAdapter`] trait.
//! The real binding is compiled with the `tucam_hardware` feature; without it
//! only the simulated adapter in [`hardware::mock`] is available.

pub mod acquisition;
pub mod buffer;
pub mod camera;
pub mod config;
pub mod detector;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod params;
pub mod status;
pub mod timer;

pub use buffer::{FrameBufferManager, FrameInfo, SharedBufferManager};
pub use camera::Camera;
pub use config::DriverConfig;
pub use error::{CameraError, CameraResult};
pub use params::TriggerMode;
pub use status::CameraStatus;
