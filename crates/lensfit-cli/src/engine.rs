use lensfit_capture::{FrameSource, SourceError};
use lensfit_session::{FrameOutcome, SessionError, SharedSession};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("frame source error: {0}")]
    Source(#[from] SourceError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("failed to spawn provider thread: {0}")]
    Spawn(std::io::Error),
    #[error("provider thread panicked")]
    Panicked,
    #[error("provider task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// One delivered frame and what the session made of it.
pub struct FrameEvent {
    pub sequence: u32,
    pub image: Option<PathBuf>,
    pub outcome: FrameOutcome,
    /// The provider armed the gate right after this frame.
    pub armed: bool,
}

/// Operator-side handle to the provider thread.
pub struct ProviderHandle {
    events: mpsc::UnboundedReceiver<FrameEvent>,
    thread: std::thread::JoinHandle<Result<usize, EngineError>>,
}

impl ProviderHandle {
    /// Next frame event, or `None` once the source is exhausted.
    pub async fn next_event(&mut self) -> Option<FrameEvent> {
        self.events.recv().await
    }

    /// Stop listening and wait for the provider thread. Returns the number of
    /// frames it delivered.
    pub async fn shutdown(self) -> Result<usize, EngineError> {
        drop(self.events);
        let thread = self.thread;
        let joined = tokio::task::spawn_blocking(move || thread.join()).await?;
        joined.map_err(|_| EngineError::Panicked)?
    }
}

/// Spawn the landmark provider on a dedicated OS thread.
///
/// The thread pulls frames from `source` and pushes each one through the
/// session's frame callback, then reports the outcome. With `arm_after`
/// set, the thread arms the gate once that many frames have been delivered,
/// before it reads the next one. It stops when the source runs dry, fails, or
/// the handle stops listening.
pub fn spawn_provider<S>(
    mut source: S,
    session: SharedSession,
    arm_after: Option<usize>,
) -> Result<ProviderHandle, EngineError>
where
    S: FrameSource + 'static,
{
    // Unbounded: frames are processed on delivery, events only report on them.
    let (tx, rx) = mpsc::unbounded_channel::<FrameEvent>();

    let thread = std::thread::Builder::new()
        .name("lensfit-provider".into())
        .spawn(move || -> Result<usize, EngineError> {
            tracing::info!("provider thread started");
            let mut delivered = 0usize;
            while let Some(frame) = source.next_frame()? {
                let outcome = session.on_frame(frame.landmark_slice(), frame.width, frame.height);
                delivered += 1;
                let armed = arm_after == Some(delivered);
                if armed {
                    session.arm()?;
                    tracing::debug!(delivered, "gate armed by provider");
                }
                let event = FrameEvent {
                    sequence: frame.sequence,
                    image: frame.image,
                    outcome,
                    armed,
                };
                if tx.send(event).is_err() {
                    tracing::debug!("event receiver closed; stopping provider");
                    break;
                }
            }
            tracing::info!(delivered, "provider thread exiting");
            Ok(delivered)
        })
        .map_err(EngineError::Spawn)?;

    Ok(ProviderHandle { events: rx, thread })
}
