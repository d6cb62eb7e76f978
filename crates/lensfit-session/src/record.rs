use chrono::{DateTime, Utc};
use lensfit_core::Measurement;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Instant;
use uuid::Uuid;

/// A measurement accepted by the capture gate.
///
/// Only the session constructs records, and only from an aligned frame.
/// The computed fields are read-only for the record's whole lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    id: Uuid,
    measurement: Measurement,
    tilt_degrees: f64,
    timestamp: Instant,
    captured_at: DateTime<Utc>,
    frame_width: u32,
    frame_height: u32,
    frame_index: u64,
}

impl MeasurementRecord {
    pub(crate) fn capture(
        measurement: Measurement,
        tilt_degrees: f64,
        frame_width: u32,
        frame_height: u32,
        frame_index: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            measurement,
            tilt_degrees,
            timestamp: Instant::now(),
            captured_at: Utc::now(),
            frame_width,
            frame_height,
            frame_index,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    /// Head tilt of the captured frame, rounded to two decimals.
    pub fn tilt_degrees(&self) -> f64 {
        self.tilt_degrees
    }

    /// Monotonic capture time.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Wall-clock capture time, used when the record is persisted.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.frame_width, self.frame_height)
    }

    /// Index of the captured frame among all frames the session has seen.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

/// Opaque reference to the stored image of the captured frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotRef(String);

impl SnapshotRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Content address of the snapshot bytes: `sha256:<hex digest>`.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(format!("sha256:{}", hex::encode(Sha256::digest(data))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SnapshotRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Emitted with every capture: the caller should grab the frame image and
/// hand back a [`SnapshotRef`] before the record is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub record_id: Uuid,
    pub frame_index: u64,
    pub width: u32,
    pub height: u32,
}
