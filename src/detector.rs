//! Detector geometry and fixed sensor description.

use std::fmt;

use crate::error::{CameraError, CameraResult};

/// Sensor width in pixels.
pub const SENSOR_WIDTH: u32 = 2048;
/// Sensor height in pixels.
pub const SENSOR_HEIGHT: u32 = 2048;
/// Physical pixel width in micrometres.
pub const PIXEL_SIZE_X_UM: f64 = 11.0;
/// Physical pixel height in micrometres.
pub const PIXEL_SIZE_Y_UM: f64 = 11.0;
/// Detector type string reported to the host.
pub const DETECTOR_TYPE: &str = "Tucsen - Dhyana";

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a size.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Full sensor size.
    pub const fn sensor() -> Self {
        Self::new(SENSOR_WIDTH, SENSOR_HEIGHT)
    }

    /// Whether either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Region of interest: top-left corner plus size.
///
/// A ROI with an empty size is inactive and stands for the full frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Roi {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Extent.
    pub size: Size,
}

impl Roi {
    /// Create a ROI.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            size: Size::new(width, height),
        }
    }

    /// ROI covering the whole sensor.
    pub const fn full_frame() -> Self {
        Self::new(0, 0, SENSOR_WIDTH, SENSOR_HEIGHT)
    }

    /// Whether the ROI restricts the image.
    pub fn is_active(&self) -> bool {
        !self.size.is_empty()
    }

    /// The ROI itself if active, the full frame otherwise.
    pub fn or_full_frame(self) -> Self {
        if self.is_active() {
            self
        } else {
            Self::full_frame()
        }
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{},{}>-<{}x{}>",
            self.x, self.y, self.size.width, self.size.height
        )
    }
}

/// Hardware binning factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bin {
    /// Horizontal factor.
    pub x: u32,
    /// Vertical factor.
    pub y: u32,
}

impl Bin {
    /// No binning.
    pub const UNBINNED: Self = Self { x: 1, y: 1 };

    /// Create a binning.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Only 1x1 is supported by the driver.
    pub fn check(self) -> CameraResult<Self> {
        if self == Self::UNBINNED {
            Ok(self)
        } else {
            Err(CameraError::configuration(format!(
                "Binning values not supported = {}x{}",
                self.x, self.y
            )))
        }
    }
}

impl Default for Bin {
    fn default() -> Self {
        Self::UNBINNED
    }
}

/// Pixel depth of delivered images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    /// 8 bits per pixel.
    Bpp8,
    /// 12 bits per pixel.
    Bpp12,
    /// 16 bits per pixel.
    Bpp16,
    /// 32 bits per pixel.
    Bpp32,
}

impl ImageType {
    /// Bits per pixel.
    pub fn depth(self) -> u32 {
        match self {
            Self::Bpp8 => 8,
            Self::Bpp12 => 12,
            Self::Bpp16 => 16,
            Self::Bpp32 => 32,
        }
    }

    /// Only 16-bit images are produced.
    pub fn check(self) -> CameraResult<Self> {
        match self {
            Self::Bpp16 => Ok(self),
            other => Err(CameraError::configuration(format!(
                "This pixel format of the camera is not managed ({} bits), only 16 bits cameras are managed",
                other.depth()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_roi_expands_to_full_frame() {
        let roi = Roi::default();
        assert!(!roi.is_active());
        assert_eq!(roi.or_full_frame(), Roi::new(0, 0, 2048, 2048));
    }

    #[test]
    fn test_active_roi_is_kept() {
        let roi = Roi::new(100, 200, 512, 256);
        assert!(roi.is_active());
        assert_eq!(roi.or_full_frame(), roi);
        assert_eq!(roi.to_string(), "<100,200>-<512x256>");
    }

    #[test]
    fn test_only_unbinned_accepted() {
        assert_eq!(Bin::new(1, 1).check().unwrap(), Bin::UNBINNED);
        assert!(Bin::new(2, 2).check().is_err());
        assert!(Bin::new(1, 2).check().is_err());
    }

    #[test]
    fn test_only_16_bit_accepted() {
        assert_eq!(ImageType::Bpp16.check().unwrap(), ImageType::Bpp16);
        for rejected in [ImageType::Bpp8, ImageType::Bpp12, ImageType::Bpp32] {
            assert!(matches!(
                rejected.check(),
                Err(CameraError::Configuration(_))
            ));
        }
    }
}
