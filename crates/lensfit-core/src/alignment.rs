//! Head-tilt alignment check.
//!
//! Measures the roll of the forehead-to-chin axis against the frame's
//! vertical. A frame is usable for measurement only while the roll stays
//! within the configured threshold.

use crate::calibration::MAX_TILT_DEGREES;
use crate::landmarks::{LandmarkSet, Point};
use crate::measurement::round2;

/// Outcome of the alignment check for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub aligned: bool,
    /// Signed roll in degrees, rounded to 2 decimals; positive when the chin
    /// sits right of the forehead.
    pub tilt_degrees: f64,
}

/// Signed angle, in degrees, between the forehead-to-chin axis and the vertical.
pub fn tilt_degrees(forehead: Point, chin: Point) -> f64 {
    (chin.x - forehead.x).atan2(chin.y - forehead.y).to_degrees()
}

/// Classify a frame against [`MAX_TILT_DEGREES`].
pub fn validate(landmarks: &LandmarkSet) -> Alignment {
    validate_with_threshold(landmarks, MAX_TILT_DEGREES)
}

/// Classify a frame against an explicit threshold. The boundary is inclusive
/// and applies to the rounded tilt, the value a captured record carries.
pub fn validate_with_threshold(landmarks: &LandmarkSet, max_tilt_degrees: f64) -> Alignment {
    let tilt = round2(tilt_degrees(landmarks.forehead(), landmarks.chin()));
    Alignment {
        aligned: tilt.abs() <= max_tilt_degrees,
        tilt_degrees: tilt,
    }
}
