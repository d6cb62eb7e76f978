//! Per-frame outcomes and the operator-facing feedback they map to.

use crate::record::{MeasurementRecord, SnapshotRequest};
use crate::state::CaptureState;
use lensfit_core::{GeometryError, LandmarkError};

/// What the session did with one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The gate was not armed; the frame was not inspected.
    Ignored { state: CaptureState },
    /// Another frame or operator call held the session; the frame was discarded.
    Dropped,
    /// The provider reported no face.
    NoFace,
    /// Wrong point count or bad coordinates. Diagnostic only.
    Malformed(LandmarkError),
    /// Geometry made the measurement undefined; treated like no face.
    Degenerate(GeometryError),
    Misaligned { tilt_degrees: f64 },
    /// The gate accepted this frame and disarmed.
    Captured {
        record: MeasurementRecord,
        snapshot: SnapshotRequest,
    },
}

impl FrameOutcome {
    /// Feedback to show the operator, if the outcome warrants any.
    pub fn feedback(&self) -> Option<Feedback> {
        match self {
            Self::Ignored { .. } | Self::Dropped => None,
            Self::NoFace | Self::Malformed(_) | Self::Degenerate(_) => Some(Feedback::NoFace),
            Self::Misaligned { .. } => Some(Feedback::Misaligned),
            Self::Captured { .. } => Some(Feedback::Captured),
        }
    }

    pub fn is_captured(&self) -> bool {
        matches!(self, Self::Captured { .. })
    }
}

/// Status classification surfaced to the UI.
///
/// The wording from `Display` is presentation only; callers should match on
/// the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    /// Initial prompt while waiting to arm.
    Prompt,
    NoFace,
    Misaligned,
    Captured,
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Prompt => "Face the camera in good lighting",
            Self::NoFace => "No face detected",
            Self::Misaligned => "Face tilted, please align",
            Self::Captured => "Measurement captured",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_map_to_no_face() {
        let outcomes = [
            FrameOutcome::NoFace,
            FrameOutcome::Malformed(LandmarkError::WrongLength { actual: 3 }),
            FrameOutcome::Degenerate(GeometryError::DegenerateFaceWidth { face_width_px: 0.0 }),
        ];
        for o in outcomes {
            assert_eq!(o.feedback(), Some(Feedback::NoFace), "{o:?}");
        }
    }

    #[test]
    fn test_silent_outcomes() {
        assert_eq!(FrameOutcome::Dropped.feedback(), None);
        let ignored = FrameOutcome::Ignored {
            state: CaptureState::Idle,
        };
        assert_eq!(ignored.feedback(), None);
    }

    #[test]
    fn test_misaligned_feedback() {
        let o = FrameOutcome::Misaligned { tilt_degrees: 9.5 };
        assert_eq!(o.feedback(), Some(Feedback::Misaligned));
        assert!(!o.is_captured());
        assert_eq!(Feedback::Misaligned.to_string(), "Face tilted, please align");
    }
}
