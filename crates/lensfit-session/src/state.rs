//! Capture state machine.
//!
//! ```text
//! Idle --arm--> Armed --aligned frame--> Captured --review--> Reviewing --save--> Saved --> Idle
//!                 ^  \__ no face / malformed / misaligned: stay Armed
//! reset from Armed, Captured or Reviewing returns to Idle and discards the record.
//! ```
//!
//! Exactly one record is produced per arming: the capturing frame disarms
//! the gate in the same step that creates the record.

use crate::feedback::FrameOutcome;
use crate::packager::{self, FinalRecord};
use crate::record::{MeasurementRecord, SnapshotRef, SnapshotRequest};
use crate::store::{Ack, MeasurementStore, StoreError};
use lensfit_core::alignment::validate_with_threshold;
use lensfit_core::measurement::measure_with;
use lensfit_core::{Calibration, CorrectedReference, LandmarkSet, Point};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Armed,
    Captured,
    Reviewing,
    /// Passed through after a successful handoff, then straight to `Idle`.
    Saved,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("cannot {operation} while {state:?}")]
    InvalidTransition {
        operation: &'static str,
        state: CaptureState,
    },
    #[error("no snapshot attached to the captured record")]
    MissingSnapshot,
    #[error("corrected reference values must be finite")]
    InvalidReference,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a successful save.
#[derive(Debug, Clone)]
pub struct SaveReceipt {
    pub ack: Ack,
    pub record: FinalRecord,
}

/// Everything attached to the record between capture and save.
#[derive(Debug)]
struct PendingCapture {
    record: MeasurementRecord,
    snapshot: Option<SnapshotRef>,
    /// Operator corrections in entry order; the latest one is saved.
    corrections: Vec<CorrectedReference>,
}

/// Single-owner capture session. See [`crate::SharedSession`] for
/// cross-thread use.
#[derive(Debug)]
pub struct CaptureSession {
    state: CaptureState,
    calibration: Calibration,
    pending: Option<PendingCapture>,
    frames_seen: u64,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new(Calibration::default())
    }
}

impl CaptureSession {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            state: CaptureState::Idle,
            calibration,
            pending: None,
            frames_seen: 0,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// The in-progress record, from capture until save or reset.
    pub fn record(&self) -> Option<&MeasurementRecord> {
        self.pending.as_ref().map(|p| &p.record)
    }

    /// Latest operator correction for the in-progress record.
    pub fn corrected_reference(&self) -> Option<&CorrectedReference> {
        self.pending.as_ref().and_then(|p| p.corrections.last())
    }

    /// All corrections entered for the in-progress record, oldest first.
    pub fn corrections(&self) -> &[CorrectedReference] {
        self.pending
            .as_ref()
            .map(|p| p.corrections.as_slice())
            .unwrap_or(&[])
    }

    pub fn snapshot_ref(&self) -> Option<&SnapshotRef> {
        self.pending.as_ref().and_then(|p| p.snapshot.as_ref())
    }

    /// `Idle -> Armed`. Arming an armed gate is a no-op.
    pub fn arm(&mut self) -> Result<(), SessionError> {
        match self.state {
            CaptureState::Idle => {
                self.transition(CaptureState::Armed);
                Ok(())
            }
            CaptureState::Armed => Ok(()),
            state => Err(SessionError::InvalidTransition {
                operation: "arm",
                state,
            }),
        }
    }

    /// Return to `Idle` from any state, discarding the in-progress record.
    pub fn reset(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::info!(id = %pending.record.id(), "discarding unsaved measurement");
        }
        if self.state != CaptureState::Idle {
            self.transition(CaptureState::Idle);
        }
    }

    /// Per-frame callback. `None` means the provider found no face.
    ///
    /// Frames are only inspected while armed. Malformed sets are rejected
    /// before they reach the engine and never change the state.
    pub fn on_frame(
        &mut self,
        landmarks: Option<&[Point]>,
        frame_width_px: u32,
        frame_height_px: u32,
    ) -> FrameOutcome {
        let frame_index = self.frames_seen;
        self.frames_seen += 1;

        if self.state != CaptureState::Armed {
            return FrameOutcome::Ignored { state: self.state };
        }

        let Some(points) = landmarks else {
            return FrameOutcome::NoFace;
        };

        let set = match LandmarkSet::from_points(points) {
            Ok(set) => set,
            Err(e) => {
                tracing::debug!(frame = frame_index, error = %e, "malformed landmark set");
                return FrameOutcome::Malformed(e);
            }
        };

        let alignment = validate_with_threshold(&set, self.calibration.max_tilt_degrees);
        if !alignment.aligned {
            tracing::trace!(frame = frame_index, tilt = alignment.tilt_degrees, "misaligned frame");
            return FrameOutcome::Misaligned {
                tilt_degrees: alignment.tilt_degrees,
            };
        }

        let measurement =
            match measure_with(&set, frame_width_px, frame_height_px, &self.calibration) {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(frame = frame_index, error = %e, "degenerate geometry");
                    return FrameOutcome::Degenerate(e);
                }
            };

        let record = MeasurementRecord::capture(
            measurement,
            alignment.tilt_degrees,
            frame_width_px,
            frame_height_px,
            frame_index,
        );
        let snapshot = SnapshotRequest {
            record_id: record.id(),
            frame_index,
            width: frame_width_px,
            height: frame_height_px,
        };

        tracing::info!(
            id = %record.id(),
            frame = frame_index,
            dnp_left_mm = measurement.dnp.left_mm,
            dnp_right_mm = measurement.dnp.right_mm,
            tilt = record.tilt_degrees(),
            "measurement captured"
        );

        self.pending = Some(PendingCapture {
            record: record.clone(),
            snapshot: None,
            corrections: Vec::new(),
        });
        self.transition(CaptureState::Captured);

        FrameOutcome::Captured { record, snapshot }
    }

    /// Fulfil the snapshot request for the in-progress record.
    pub fn attach_snapshot(&mut self, snapshot: SnapshotRef) -> Result<(), SessionError> {
        let state = self.state;
        match (&mut self.pending, state) {
            (Some(pending), CaptureState::Captured | CaptureState::Reviewing) => {
                tracing::debug!(id = %pending.record.id(), %snapshot, "snapshot attached");
                pending.snapshot = Some(snapshot);
                Ok(())
            }
            _ => Err(SessionError::InvalidTransition {
                operation: "attach a snapshot",
                state,
            }),
        }
    }

    /// `Captured | Reviewing -> Reviewing`, appending an operator correction
    /// when one is given.
    pub fn review(&mut self, reference: Option<CorrectedReference>) -> Result<(), SessionError> {
        if !matches!(self.state, CaptureState::Captured | CaptureState::Reviewing) {
            return Err(SessionError::InvalidTransition {
                operation: "review",
                state: self.state,
            });
        }
        if reference.is_some_and(|r| !r.is_finite()) {
            return Err(SessionError::InvalidReference);
        }

        if let (Some(pending), Some(reference)) = (self.pending.as_mut(), reference) {
            tracing::info!(
                id = %pending.record.id(),
                left_mm = reference.left_mm,
                right_mm = reference.right_mm,
                "corrected reference entered"
            );
            pending.corrections.push(reference);
        }
        if self.state != CaptureState::Reviewing {
            self.transition(CaptureState::Reviewing);
        }
        Ok(())
    }

    /// `Reviewing -> Saved -> Idle`.
    ///
    /// Packages the record and hands it to `store` once. On failure the
    /// session stays in `Reviewing` with the record intact, so the operator
    /// can retry.
    pub fn save<S: MeasurementStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> Result<SaveReceipt, SessionError> {
        let pending = match (&self.pending, self.state) {
            (Some(pending), CaptureState::Reviewing) => pending,
            (_, state) => {
                return Err(SessionError::InvalidTransition {
                    operation: "save",
                    state,
                })
            }
        };
        let snapshot = pending.snapshot.as_ref().ok_or(SessionError::MissingSnapshot)?;

        let record = packager::package(&pending.record, snapshot, pending.corrections.last());
        let ack = packager::handoff(store, &record)?;

        self.transition(CaptureState::Saved);
        self.pending = None;
        self.transition(CaptureState::Idle);

        Ok(SaveReceipt { ack, record })
    }

    fn transition(&mut self, to: CaptureState) {
        tracing::debug!(from = ?self.state, to = ?to, "capture state changed");
        self.state = to;
    }
}
