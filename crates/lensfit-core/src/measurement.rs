//! Measurement engine: landmark geometry to physical quantities.
//!
//! All sub-measurements work on normalized coordinates and are scaled by
//! the frame dimensions at the end. Outputs are rounded to two decimals,
//! half away from zero.

use crate::calibration::Calibration;
use crate::landmarks::LandmarkSet;
use crate::types::{Dnp, Measurement, OpticalHeight};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("frame has no area: {width}x{height}")]
    EmptyFrame { width: u32, height: u32 },
    #[error("degenerate face width: {face_width_px} px between temples")]
    DegenerateFaceWidth { face_width_px: f64 },
    #[error("{quantity} is not finite")]
    NonFinite { quantity: &'static str },
}

/// Round to two decimals, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Distances from the nasal midline to each pupil, in millimetres.
pub fn dnp(landmarks: &LandmarkSet, frame_width_px: u32, scale_mm_per_px: f64) -> Dnp {
    let midline_x = landmarks.midline_x();
    let width = f64::from(frame_width_px);
    Dnp {
        left_mm: (midline_x - landmarks.left_pupil().x) * width * scale_mm_per_px,
        right_mm: (landmarks.right_pupil().x - midline_x) * width * scale_mm_per_px,
    }
}

/// Pupil offsets from the orbit reference line, in pixels.
pub fn optical_height(landmarks: &LandmarkSet, frame_height_px: u32) -> OpticalHeight {
    let reference_y = landmarks.frame_reference_y();
    let height = f64::from(frame_height_px);
    OpticalHeight {
        left_px: (landmarks.left_pupil().y - reference_y) * height,
        right_px: (landmarks.right_pupil().y - reference_y) * height,
    }
}

/// Temple-to-temple width of the face, in pixels.
pub fn face_width_px(landmarks: &LandmarkSet, frame_width_px: u32) -> f64 {
    (landmarks.right_temple().x - landmarks.left_temple().x) * f64::from(frame_width_px)
}

/// Distance estimate from a face width. Non-positive widths are rejected.
pub fn distance_estimate_cm(
    face_width_px: f64,
    reference_head_width_mm: f64,
) -> Result<f64, GeometryError> {
    if face_width_px <= 0.0 || !face_width_px.is_finite() {
        return Err(GeometryError::DegenerateFaceWidth { face_width_px });
    }
    Ok(reference_head_width_mm / face_width_px)
}

/// Run the engine with the default calibration.
pub fn measure(
    landmarks: &LandmarkSet,
    frame_width_px: u32,
    frame_height_px: u32,
) -> Result<Measurement, GeometryError> {
    measure_with(landmarks, frame_width_px, frame_height_px, &Calibration::default())
}

/// Run the engine. Never yields `NaN` or infinite values.
pub fn measure_with(
    landmarks: &LandmarkSet,
    frame_width_px: u32,
    frame_height_px: u32,
    calibration: &Calibration,
) -> Result<Measurement, GeometryError> {
    if frame_width_px == 0 || frame_height_px == 0 {
        return Err(GeometryError::EmptyFrame {
            width: frame_width_px,
            height: frame_height_px,
        });
    }

    let distance = distance_estimate_cm(
        face_width_px(landmarks, frame_width_px),
        calibration.reference_head_width_mm,
    )?;
    let raw_dnp = dnp(landmarks, frame_width_px, calibration.scale_mm_per_px);
    let raw_height = optical_height(landmarks, frame_height_px);

    let measurement = Measurement {
        dnp: Dnp {
            left_mm: finite("dnp.left_mm", raw_dnp.left_mm)?,
            right_mm: finite("dnp.right_mm", raw_dnp.right_mm)?,
        },
        optical_height: OpticalHeight {
            left_px: finite("optical_height.left_px", raw_height.left_px)?,
            right_px: finite("optical_height.right_px", raw_height.right_px)?,
        },
        distance_estimate_cm: finite("distance_estimate_cm", distance)?,
    };

    tracing::trace!(?measurement, "frame measured");
    Ok(measurement)
}

fn finite(quantity: &'static str, value: f64) -> Result<f64, GeometryError> {
    let rounded = round2(value);
    if rounded.is_finite() {
        Ok(rounded)
    } else {
        Err(GeometryError::NonFinite { quantity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::REFERENCE_HEAD_WIDTH_MM;
    use crate::landmarks::*;

    const W: u32 = 480;
    const H: u32 = 640;

    /// The reference scenario: pupils at 0.30/0.70, midline 0.50,
    /// orbit line 0.40, temples at 0.20/0.80.
    fn scenario() -> Vec<Point> {
        let mut pts = vec![Point::new(0.5, 0.5); LANDMARK_COUNT];
        pts[LEFT_PUPIL] = Point::new(0.30, 0.45);
        pts[RIGHT_PUPIL] = Point::new(0.70, 0.45);
        pts[NASAL_BRIDGE[0]] = Point::new(0.49, 0.50);
        pts[NASAL_BRIDGE[1]] = Point::new(0.51, 0.55);
        pts[ORBIT_LEFT] = Point::new(0.22, 0.40);
        pts[ORBIT_RIGHT] = Point::new(0.78, 0.40);
        pts[TEMPLE_LEFT] = Point::new(0.20, 0.38);
        pts[TEMPLE_RIGHT] = Point::new(0.80, 0.38);
        pts[FOREHEAD] = Point::new(0.50, 0.10);
        pts[CHIN] = Point::new(0.50, 0.90);
        pts
    }

    fn set(pts: &[Point]) -> LandmarkSet {
        LandmarkSet::from_points(pts).unwrap()
    }

    #[test]
    fn test_reference_scenario() {
        let m = measure(&set(&scenario()), W, H).unwrap();
        assert_eq!(m.dnp.right_mm, 25.40);
        assert_eq!(m.dnp.left_mm, 25.40);
        assert_eq!(m.optical_height.left_px, 32.00);
        assert_eq!(m.optical_height.right_px, 32.00);
        assert_eq!(m.distance_estimate_cm, 0.52);
    }

    #[test]
    fn test_face_width_scenario() {
        let w = face_width_px(&set(&scenario()), W);
        assert!((w - 288.0).abs() < 1e-9, "face width = {w}");
    }

    #[test]
    fn test_symmetric_pupils_give_equal_dnp() {
        for offset in [0.05, 0.11, 0.2, 0.25] {
            let mut pts = scenario();
            pts[LEFT_PUPIL].x = 0.5 - offset;
            pts[RIGHT_PUPIL].x = 0.5 + offset;
            let m = measure(&set(&pts), W, H).unwrap();
            assert_eq!(m.dnp.left_mm, m.dnp.right_mm, "offset {offset}");
        }
    }

    #[test]
    fn test_asymmetric_pupils() {
        let mut pts = scenario();
        pts[RIGHT_PUPIL].x = 0.75;
        let m = measure(&set(&pts), W, H).unwrap();
        // 0.25 * 480 * 0.2646 = 31.752
        assert_eq!(m.dnp.right_mm, 31.75);
        assert_eq!(m.dnp.left_mm, 25.40);
    }

    #[test]
    fn test_pupil_above_reference_line_is_negative() {
        let mut pts = scenario();
        pts[LEFT_PUPIL].y = 0.35;
        let m = measure(&set(&pts), W, H).unwrap();
        assert_eq!(m.optical_height.left_px, -32.00);
    }

    #[test]
    fn test_distance_decreases_with_face_width() {
        let mut previous = f64::INFINITY;
        for width in [10.0, 50.0, 96.0, 192.0, 288.0, 400.0] {
            let d = distance_estimate_cm(width, REFERENCE_HEAD_WIDTH_MM).unwrap();
            assert!(d < previous, "width {width}: {d} !< {previous}");
            previous = d;
        }

        let near = |left: f64, right: f64| {
            let mut pts = scenario();
            pts[TEMPLE_LEFT].x = left;
            pts[TEMPLE_RIGHT].x = right;
            measure(&set(&pts), W, H).unwrap().distance_estimate_cm
        };
        assert!(near(0.4, 0.6) > near(0.3, 0.7));
        assert!(near(0.3, 0.7) > near(0.2, 0.8));
    }

    #[test]
    fn test_zero_face_width_is_geometry_error() {
        let mut pts = scenario();
        pts[TEMPLE_LEFT].x = 0.5;
        pts[TEMPLE_RIGHT].x = 0.5;
        assert_eq!(
            measure(&set(&pts), W, H).unwrap_err(),
            GeometryError::DegenerateFaceWidth { face_width_px: 0.0 }
        );
    }

    #[test]
    fn test_swapped_temples_is_geometry_error() {
        let mut pts = scenario();
        pts[TEMPLE_LEFT].x = 0.8;
        pts[TEMPLE_RIGHT].x = 0.2;
        assert!(matches!(
            measure(&set(&pts), W, H),
            Err(GeometryError::DegenerateFaceWidth { .. })
        ));
    }

    #[test]
    fn test_empty_frame_is_geometry_error() {
        assert_eq!(
            measure(&set(&scenario()), 0, H).unwrap_err(),
            GeometryError::EmptyFrame {
                width: 0,
                height: H,
            }
        );
    }

    #[test]
    fn test_custom_calibration() {
        let calibration = Calibration {
            scale_mm_per_px: 0.5,
            reference_head_width_mm: 144.0,
            ..Calibration::default()
        };
        let m = measure_with(&set(&scenario()), W, H, &calibration).unwrap();
        // 0.2 * 480 * 0.5 = 48
        assert_eq!(m.dnp.left_mm, 48.0);
        assert_eq!(m.distance_estimate_cm, 0.5);
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(25.4016), 25.40);
        assert_eq!(round2(0.0), 0.0);
    }
}
