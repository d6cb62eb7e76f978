//! Result packaging and handoff to the measurement store.

use crate::record::{MeasurementRecord, SnapshotRef};
use crate::store::{Ack, MeasurementStore, StoreError};
use chrono::{DateTime, Utc};
use lensfit_core::{CorrectedReference, Dnp, OpticalHeight};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The immutable record handed to a [`MeasurementStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalRecord {
    pub id: Uuid,
    pub dnp: Dnp,
    pub optical_height: OpticalHeight,
    pub distance_estimate_cm: f64,
    pub tilt_degrees: f64,
    /// Capture time, not save time.
    pub captured_at: DateTime<Utc>,
    pub frame_width: u32,
    pub frame_height: u32,
    pub corrected_reference: Option<CorrectedReference>,
    pub snapshot_ref: SnapshotRef,
}

/// Merge a captured record with its snapshot and optional operator correction.
///
/// Builds a new value; `record` itself is left untouched.
pub fn package(
    record: &MeasurementRecord,
    snapshot_ref: &SnapshotRef,
    corrected_reference: Option<&CorrectedReference>,
) -> FinalRecord {
    let m = record.measurement();
    let (frame_width, frame_height) = record.frame_size();
    FinalRecord {
        id: record.id(),
        dnp: m.dnp,
        optical_height: m.optical_height,
        distance_estimate_cm: m.distance_estimate_cm,
        tilt_degrees: record.tilt_degrees(),
        captured_at: record.captured_at(),
        frame_width,
        frame_height,
        corrected_reference: corrected_reference.copied(),
        snapshot_ref: snapshot_ref.clone(),
    }
}

/// Persist a packaged record. A single attempt; failures go back to the caller.
pub fn handoff<S: MeasurementStore + ?Sized>(
    store: &S,
    record: &FinalRecord,
) -> Result<Ack, StoreError> {
    match store.persist(record) {
        Ok(ack) => {
            tracing::info!(
                id = %ack.record_id,
                snapshot = %record.snapshot_ref,
                "measurement stored"
            );
            Ok(ack)
        }
        Err(e) => {
            tracing::warn!(id = %record.id, error = %e, "measurement store rejected record");
            Err(e)
        }
    }
}
