//! lensfit-session — Capture lifecycle around the measurement engine.
//!
//! A [`CaptureSession`] arms on request, turns the first aligned frame into
//! a [`MeasurementRecord`], and holds it through operator review until it is
//! packaged and handed to a [`MeasurementStore`]. [`SharedSession`] makes the
//! same machine safe to drive from a provider thread and a UI thread at once.

pub mod feedback;
pub mod packager;
pub mod record;
pub mod shared;
pub mod state;
pub mod store;

pub use feedback::{Feedback, FrameOutcome};
pub use packager::{package, FinalRecord};
pub use record::{MeasurementRecord, SnapshotRef, SnapshotRequest};
pub use shared::SharedSession;
pub use state::{CaptureSession, CaptureState, SaveReceipt, SessionError};
pub use store::{Ack, MeasurementStore, MemoryStore, StoreError};
