//! Calibration constants.
//!
//! These are fixed values, not derived from a per-session reference object
//! or the camera's focal length. Measurements are only as accurate as these
//! constants are for the camera and subject at hand.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Millimetres per pixel, assuming a 96 DPI display-space pixel.
pub const SCALE_MM_PER_PX: f64 = 0.2646;

/// Average adult head width used for the distance estimate.
pub const REFERENCE_HEAD_WIDTH_MM: f64 = 150.0;

/// Largest head tilt, in degrees, at which a frame still counts as aligned.
pub const MAX_TILT_DEGREES: f64 = 5.0;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("failed to read calibration profile {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("bad calibration TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("calibration value `{field}` must be finite and positive, got {value}")]
    Invalid { field: &'static str, value: f64 },
}

/// Constants the measurement pipeline runs with.
///
/// A TOML profile may override any subset of fields:
///
/// ```toml
/// scale_mm_per_px = 0.2646
/// reference_head_width_mm = 150.0
/// max_tilt_degrees = 5.0
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Calibration {
    pub scale_mm_per_px: f64,
    pub reference_head_width_mm: f64,
    pub max_tilt_degrees: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            scale_mm_per_px: SCALE_MM_PER_PX,
            reference_head_width_mm: REFERENCE_HEAD_WIDTH_MM,
            max_tilt_degrees: MAX_TILT_DEGREES,
        }
    }
}

impl Calibration {
    /// Parse a TOML profile; missing fields keep their defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, CalibrationError> {
        let calibration: Self = toml::from_str(src)?;
        calibration.check()?;
        Ok(calibration)
    }

    /// Load a TOML profile from disk.
    pub fn load(path: &Path) -> Result<Self, CalibrationError> {
        let src = std::fs::read_to_string(path).map_err(|source| CalibrationError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let calibration = Self::from_toml_str(&src)?;
        tracing::info!(
            path = %path.display(),
            scale_mm_per_px = calibration.scale_mm_per_px,
            reference_head_width_mm = calibration.reference_head_width_mm,
            max_tilt_degrees = calibration.max_tilt_degrees,
            "loaded calibration profile"
        );
        Ok(calibration)
    }

    fn check(&self) -> Result<(), CalibrationError> {
        for (field, value) in [
            ("scale_mm_per_px", self.scale_mm_per_px),
            ("reference_head_width_mm", self.reference_head_width_mm),
            ("max_tilt_degrees", self.max_tilt_degrees),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CalibrationError::Invalid { field, value });
            }
        }
        Ok(())
    }
}
