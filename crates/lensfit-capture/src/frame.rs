//! Frame type and the on-disk record format for landmark streams.

use lensfit_core::Point;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One frame as delivered by the landmark provider.
#[derive(Debug, Clone)]
pub struct LandmarkFrame {
    /// Raw detector output; `None` when no face was found.
    /// Not yet validated, so the length and ranges may be wrong.
    pub landmarks: Option<Vec<Point>>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
    /// Image file backing this frame, if the recording kept one.
    pub image: Option<PathBuf>,
}

impl LandmarkFrame {
    pub fn has_face(&self) -> bool {
        self.landmarks.is_some()
    }

    /// Landmarks as a slice, the shape the session callback consumes.
    pub fn landmark_slice(&self) -> Option<&[Point]> {
        self.landmarks.as_deref()
    }
}

/// One line of a recorded NDJSON stream.
///
/// ```json
/// {"landmarks": [{"x": 0.5, "y": 0.4, "z": -0.01}, ...], "width": 640, "height": 480}
/// {"landmarks": null}
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameRecord {
    #[serde(default)]
    pub landmarks: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
}

impl FrameRecord {
    /// Turn a record into a frame, filling missing dimensions from the canvas.
    pub fn into_frame(self, canvas: (u32, u32), sequence: u32) -> LandmarkFrame {
        LandmarkFrame {
            landmarks: self.landmarks,
            width: self.width.unwrap_or(canvas.0),
            height: self.height.unwrap_or(canvas.1),
            timestamp: std::time::Instant::now(),
            sequence,
            image: self.image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_face() {
        let rec: FrameRecord = serde_json::from_str(r#"{"landmarks": null}"#).unwrap();
        let frame = rec.into_frame((640, 480), 7);
        assert!(!frame.has_face());
        assert!(frame.landmark_slice().is_none());
        assert_eq!((frame.width, frame.height), (640, 480));
        assert_eq!(frame.sequence, 7);
    }

    #[test]
    fn test_record_missing_landmarks_key_is_no_face() {
        let rec: FrameRecord = serde_json::from_str("{}").unwrap();
        assert!(rec.landmarks.is_none());
    }

    #[test]
    fn test_record_dimensions_override_canvas() {
        let rec: FrameRecord = serde_json::from_str(
            r#"{"landmarks": [{"x": 0.1, "y": 0.2}], "width": 480, "height": 640, "image": "f.jpg"}"#,
        )
        .unwrap();
        let frame = rec.into_frame((640, 480), 0);
        assert_eq!((frame.width, frame.height), (480, 640));
        assert_eq!(frame.landmark_slice().map(<[Point]>::len), Some(1));
        assert_eq!(frame.image, Some(PathBuf::from("f.jpg")));
    }

    #[test]
    fn test_record_serializes_compactly() {
        let rec = FrameRecord::default();
        assert_eq!(serde_json::to_string(&rec).unwrap(), r#"{"landmarks":null}"#);
    }
}
