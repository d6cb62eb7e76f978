//! Thread-safe handle around a [`CaptureSession`].
//!
//! The provider thread calls [`SharedSession::on_frame`]; operator calls come
//! from elsewhere. Everything runs under one mutex, so the Armed -> Captured
//! step can only be taken by one frame. Frames never wait for the lock: if the
//! session is busy the frame is dropped rather than queued.

use crate::feedback::FrameOutcome;
use crate::record::SnapshotRef;
use crate::state::{CaptureSession, CaptureState, SaveReceipt, SessionError};
use crate::store::MeasurementStore;
use lensfit_core::{CorrectedReference, Point};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

/// Clone-safe handle to a capture session.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<CaptureSession>>,
}

impl SharedSession {
    pub fn new(session: CaptureSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Deliver a frame, or drop it if the session is busy.
    pub fn on_frame(
        &self,
        landmarks: Option<&[Point]>,
        frame_width_px: u32,
        frame_height_px: u32,
    ) -> FrameOutcome {
        match self.inner.try_lock() {
            Ok(mut session) => session.on_frame(landmarks, frame_width_px, frame_height_px),
            Err(TryLockError::Poisoned(poisoned)) => {
                poisoned
                    .into_inner()
                    .on_frame(landmarks, frame_width_px, frame_height_px)
            }
            Err(TryLockError::WouldBlock) => {
                tracing::trace!("session busy; frame dropped");
                FrameOutcome::Dropped
            }
        }
    }

    pub fn arm(&self) -> Result<(), SessionError> {
        self.lock().arm()
    }

    pub fn reset(&self) {
        self.lock().reset()
    }

    pub fn attach_snapshot(&self, snapshot: SnapshotRef) -> Result<(), SessionError> {
        self.lock().attach_snapshot(snapshot)
    }

    pub fn review(&self, reference: Option<CorrectedReference>) -> Result<(), SessionError> {
        self.lock().review(reference)
    }

    pub fn save<S: MeasurementStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<SaveReceipt, SessionError> {
        self.lock().save(store)
    }

    pub fn state(&self) -> CaptureState {
        self.lock().state()
    }

    /// Run `f` with the session locked. Frames arriving meanwhile are dropped.
    pub fn with<R>(&self, f: impl FnOnce(&mut CaptureSession) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, CaptureSession> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
