//! Face Mesh landmark sets, validated on ingress.
//!
//! A detector hands us loosely-typed point lists; everything downstream works
//! on [`LandmarkSet`], a fixed 468-point array that is only constructed once
//! every coordinate has been checked.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of points in the canonical Face Mesh topology.
pub const LANDMARK_COUNT: usize = 468;

/// Point count emitted when iris refinement is enabled (468 + 10 iris points).
pub const REFINED_LANDMARK_COUNT: usize = 478;

// --- Semantic indices into the canonical topology ---
pub const LEFT_PUPIL: usize = 33;
pub const RIGHT_PUPIL: usize = 263;
pub const NASAL_BRIDGE: [usize; 2] = [1, 2];
/// Orbit points whose mean y is the horizontal frame reference line.
pub const ORBIT_LEFT: usize = 234;
pub const ORBIT_RIGHT: usize = 454;
pub const TEMPLE_LEFT: usize = 127;
pub const TEMPLE_RIGHT: usize = 356;
pub const FOREHEAD: usize = 10;
pub const CHIN: usize = 152;

/// A landmark in normalized frame coordinates.
///
/// `x` and `y` are fractions of the frame width and height. `z` is the
/// detector's relative depth and is not range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LandmarkError {
    #[error("expected {LANDMARK_COUNT} or {REFINED_LANDMARK_COUNT} landmarks, got {actual}")]
    WrongLength { actual: usize },
    #[error("landmark {index} has a non-finite coordinate")]
    NonFinite { index: usize },
    #[error("landmark {index} is outside the frame: ({x}, {y})")]
    OutOfRange { index: usize, x: f64, y: f64 },
}

/// A validated, fixed-length set of Face Mesh landmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Box<[Point; LANDMARK_COUNT]>,
}

impl LandmarkSet {
    /// Validate raw detector output.
    ///
    /// Accepts the canonical 468 points or the 478-point refined layout, whose
    /// iris tail is checked and then dropped. Any other length, any non-finite
    /// coordinate, or any `x`/`y` outside `[0, 1]` rejects the whole set.
    pub fn from_points(points: &[Point]) -> Result<Self, LandmarkError> {
        if points.len() != LANDMARK_COUNT && points.len() != REFINED_LANDMARK_COUNT {
            return Err(LandmarkError::WrongLength {
                actual: points.len(),
            });
        }

        for (index, p) in points.iter().enumerate() {
            if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                return Err(LandmarkError::NonFinite { index });
            }
            if !(0.0..=1.0).contains(&p.x) || !(0.0..=1.0).contains(&p.y) {
                return Err(LandmarkError::OutOfRange {
                    index,
                    x: p.x,
                    y: p.y,
                });
            }
        }

        let mut canonical = Box::new([Point::default(); LANDMARK_COUNT]);
        canonical.copy_from_slice(&points[..LANDMARK_COUNT]);
        Ok(Self { points: canonical })
    }

    pub fn left_pupil(&self) -> Point {
        self.points[LEFT_PUPIL]
    }

    pub fn right_pupil(&self) -> Point {
        self.points[RIGHT_PUPIL]
    }

    /// Horizontal position of the nasal midline (mean of the two bridge points).
    pub fn midline_x(&self) -> f64 {
        (self.points[NASAL_BRIDGE[0]].x + self.points[NASAL_BRIDGE[1]].x) / 2.0
    }

    /// Vertical position of the orbit reference line.
    pub fn frame_reference_y(&self) -> f64 {
        (self.points[ORBIT_LEFT].y + self.points[ORBIT_RIGHT].y) / 2.0
    }

    pub fn left_temple(&self) -> Point {
        self.points[TEMPLE_LEFT]
    }

    pub fn right_temple(&self) -> Point {
        self.points[TEMPLE_RIGHT]
    }

    pub fn forehead(&self) -> Point {
        self.points[FOREHEAD]
    }

    pub fn chin(&self) -> Point {
        self.points[CHIN]
    }

    pub fn points(&self) -> &[Point; LANDMARK_COUNT] {
        &self.points
    }
}

impl TryFrom<&[Point]> for LandmarkSet {
    type Error = LandmarkError;

    fn try_from(points: &[Point]) -> Result<Self, Self::Error> {
        Self::from_points(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centered(len: usize) -> Vec<Point> {
        vec![Point::new(0.5, 0.5); len]
    }

    #[test]
    fn test_accepts_canonical_length() {
        let set = LandmarkSet::from_points(&centered(LANDMARK_COUNT)).unwrap();
        assert_eq!(set.points().len(), LANDMARK_COUNT);
    }

    #[test]
    fn test_accepts_refined_length_and_drops_iris() {
        let mut pts = centered(REFINED_LANDMARK_COUNT);
        pts[LEFT_PUPIL] = Point::new(0.3, 0.4);
        let set = LandmarkSet::from_points(&pts).unwrap();
        assert_eq!(set.points().len(), LANDMARK_COUNT);
        assert_eq!(set.left_pupil(), Point::new(0.3, 0.4));
    }

    #[test]
    fn test_rejects_wrong_length() {
        for len in [0, 10, 467, 469, 477, 479] {
            let err = LandmarkSet::from_points(&centered(len)).unwrap_err();
            assert_eq!(err, LandmarkError::WrongLength { actual: len });
        }
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut pts = centered(LANDMARK_COUNT);
        pts[200].y = f64::NAN;
        assert_eq!(
            LandmarkSet::from_points(&pts).unwrap_err(),
            LandmarkError::NonFinite { index: 200 }
        );

        let mut pts = centered(LANDMARK_COUNT);
        pts[7].z = f64::INFINITY;
        assert_eq!(
            LandmarkSet::from_points(&pts).unwrap_err(),
            LandmarkError::NonFinite { index: 7 }
        );
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut pts = centered(LANDMARK_COUNT);
        pts[12].x = 1.2;
        assert!(matches!(
            LandmarkSet::from_points(&pts),
            Err(LandmarkError::OutOfRange { index: 12, .. })
        ));
    }

    #[test]
    fn test_negative_depth_is_fine() {
        let mut pts = centered(LANDMARK_COUNT);
        pts[0].z = -0.08;
        assert!(LandmarkSet::from_points(&pts).is_ok());
    }

    #[test]
    fn test_derived_reference_points() {
        let mut pts = centered(LANDMARK_COUNT);
        pts[NASAL_BRIDGE[0]].x = 0.48;
        pts[NASAL_BRIDGE[1]].x = 0.52;
        pts[ORBIT_LEFT].y = 0.40;
        pts[ORBIT_RIGHT].y = 0.44;
        let set = LandmarkSet::try_from(pts.as_slice()).unwrap();
        assert!((set.midline_x() - 0.50).abs() < 1e-12);
        assert!((set.frame_reference_y() - 0.42).abs() < 1e-12);
    }

    #[test]
    fn test_point_deserializes_without_depth() {
        let p: Point = serde_json::from_str(r#"{"x":0.25,"y":0.75}"#).unwrap();
        assert_eq!(p, Point::new(0.25, 0.75));
    }
}
