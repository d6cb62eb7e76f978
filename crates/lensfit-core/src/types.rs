use serde::{Deserialize, Serialize};

/// Naso-pupillary distances: nasal midline to each pupil, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dnp {
    pub left_mm: f64,
    pub right_mm: f64,
}

/// Vertical offset of each pupil below the orbit reference line, in pixels.
///
/// Negative values mean the pupil sits above the line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpticalHeight {
    pub left_px: f64,
    pub right_px: f64,
}

/// Everything the measurement engine derives from one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub dnp: Dnp,
    pub optical_height: OpticalHeight,
    /// Camera-to-face estimate from the fixed reference head width.
    pub distance_estimate_cm: f64,
}

/// Operator-entered ground-truth DNP values, typically from a pupillometer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectedReference {
    pub left_mm: f64,
    pub right_mm: f64,
}

impl CorrectedReference {
    pub fn is_finite(&self) -> bool {
        self.left_mm.is_finite() && self.right_mm.is_finite()
    }
}
