//! Nuchal translucency endpoints and the pixel → millimetre conversion.
//!
//! The NT width is the minor axis of the fitted ellipse: its endpoints sit at
//! `minor_axis / 2` from the centre along `angle + 90°`.

use std::fmt;

use crate::ellipse::FittedEllipse;

/// The two ends of the NT measurement, symmetric about the ellipse centre.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NtEndpointPair {
    /// `center + (dx, dy)`.
    pub first: [f64; 2],
    /// `center − (dx, dy)`.
    pub second: [f64; 2],
}

impl NtEndpointPair {
    /// Euclidean distance between the endpoints, in pixels.
    pub fn distance_px(&self) -> f64 {
        (self.first[0] - self.second[0]).hypot(self.first[1] - self.second[1])
    }

    /// `[[x, y], [x, y]]` as sent to the annotation front end.
    pub fn to_wire(&self) -> [[f64; 2]; 2] {
        [self.first, self.second]
    }
}

/// Endpoints of the minor axis of `ellipse`.
///
/// Total: zero-size or unrotated ellipses give coincident or axis-aligned points.
pub fn nt_endpoints(ellipse: &FittedEllipse) -> NtEndpointPair {
    let (sin, cos) = (ellipse.angle + 90.0).to_radians().sin_cos();
    let half = ellipse.minor_axis / 2.0;
    let (dx, dy) = (half * cos, half * sin);
    NtEndpointPair {
        first: [ellipse.center_x + dx, ellipse.center_y + dy],
        second: [ellipse.center_x - dx, ellipse.center_y - dy],
    }
}

/// Invalid pixel calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationError {
    /// Pixel size must be finite and strictly positive.
    InvalidPixelSize(f64),
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPixelSize(v) => {
                write!(f, "pixel size must be positive and finite, got {v} mm")
            }
        }
    }
}

impl std::error::Error for CalibrationError {}

/// Physical size of one image pixel, entered by the clinician.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PixelCalibration {
    /// Millimetres per pixel.
    pub pixel_size_mm: f64,
}

impl Default for PixelCalibration {
    fn default() -> Self {
        Self {
            pixel_size_mm: 0.18,
        }
    }
}

impl PixelCalibration {
    pub fn new(pixel_size_mm: f64) -> Result<Self, CalibrationError> {
        let cal = Self { pixel_size_mm };
        cal.validate()?;
        Ok(cal)
    }

    /// Check a calibration that arrived through deserialisation.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.pixel_size_mm.is_finite() && self.pixel_size_mm > 0.0 {
            Ok(())
        } else {
            Err(CalibrationError::InvalidPixelSize(self.pixel_size_mm))
        }
    }

    pub fn to_mm(&self, distance_px: f64) -> f64 {
        distance_px * self.pixel_size_mm
    }

    pub fn measure(&self, endpoints: &NtEndpointPair) -> NtMeasurement {
        let distance_px = endpoints.distance_px();
        NtMeasurement {
            endpoints: *endpoints,
            distance_px,
            distance_mm: self.to_mm(distance_px),
            pixel_size_mm: self.pixel_size_mm,
        }
    }
}

/// A completed NT measurement.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NtMeasurement {
    pub endpoints: NtEndpointPair,
    pub distance_px: f64,
    pub distance_mm: f64,
    /// Calibration the millimetre value was computed with.
    pub pixel_size_mm: f64,
}
