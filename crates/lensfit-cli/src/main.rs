use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lensfit_capture::{FrameSource, LandmarkFrame, ReplaySource};
use lensfit_core::alignment::validate_with_threshold;
use lensfit_core::measurement::measure_with;
use lensfit_core::{Calibration, CorrectedReference, LandmarkSet};
use lensfit_session::{
    CaptureSession, Feedback, FrameOutcome, MeasurementRecord, SharedSession, SnapshotRef,
    SnapshotRequest,
};
use lensfit_store::SqliteStore;
use std::path::{Path, PathBuf};
use uuid::Uuid;

mod config;
mod engine;

use config::Config;

#[derive(Parser)]
#[command(name = "lensfit", about = "Eyeglass-fitting measurements from facial landmarks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a landmark recording, capture one measurement and store it
    Measure {
        /// NDJSON landmark recording, one frame per line
        recording: PathBuf,
        /// Operator-measured left DNP in mm
        #[arg(long, requires = "right_ref")]
        left_ref: Option<f64>,
        /// Operator-measured right DNP in mm
        #[arg(long, requires = "left_ref")]
        right_ref: Option<f64>,
        /// Arm the gate only after this many frames have been delivered
        #[arg(long, default_value_t = 0)]
        arm_after: usize,
    },
    /// Classify every frame of a recording without capturing
    Check {
        /// NDJSON landmark recording, one frame per line
        recording: PathBuf,
    },
    /// List stored measurements
    List,
    /// Show one stored measurement
    Show {
        /// Measurement ID
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Measure {
            recording,
            left_ref,
            right_ref,
            arm_after,
        } => {
            let reference = match (left_ref, right_ref) {
                (Some(left_mm), Some(right_mm)) => Some(CorrectedReference { left_mm, right_mm }),
                _ => None,
            };
            measure(&config, &recording, reference, arm_after).await?;
        }
        Commands::Check { recording } => check(&config, &recording)?,
        Commands::List => {
            let store = SqliteStore::open(&config.db_path)?;
            let rows: Vec<_> = store
                .list()?
                .into_iter()
                .map(|s| serde_json::json!({ "stored_at": s.stored_at, "record": s.record }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Commands::Show { id } => {
            let store = SqliteStore::open(&config.db_path)?;
            let Some(stored) = store.get(id)? else {
                bail!("no measurement with id {id}");
            };
            println!(
                "{}",
                serde_json::to_string_pretty(
                    &serde_json::json!({ "stored_at": stored.stored_at, "record": stored.record })
                )?
            );
        }
    }

    Ok(())
}

/// What the provider captured, plus the frame image it came with.
struct Capture {
    record: MeasurementRecord,
    request: SnapshotRequest,
    image: Option<PathBuf>,
}

async fn measure(
    config: &Config,
    recording: &Path,
    reference: Option<CorrectedReference>,
    arm_after: usize,
) -> Result<()> {
    let calibration = config.calibration()?;
    let store = SqliteStore::open(&config.db_path)?;
    let source = ReplaySource::open(recording, config.canvas())?.with_fps(config.replay_fps);

    let session = SharedSession::new(CaptureSession::new(calibration));
    let (captured, frames) = run_capture(source, &session, arm_after).await?;
    let Some(capture) = captured else {
        bail!("recording ended after {frames} frames without an aligned face");
    };
    let frame_index = capture.request.frame_index;
    tracing::info!(id = %capture.record.id(), frame = frame_index, "capture complete");

    let snapshot = match capture.image {
        Some(path) => {
            let data = std::fs::read(&path)
                .with_context(|| format!("reading snapshot {}", path.display()))?;
            let snapshot_ref = SnapshotRef::from_bytes(&data);
            store.put_snapshot(&snapshot_ref, &data)?;
            snapshot_ref
        }
        None => SnapshotRef::new(format!("{}#{frame_index}", recording.display())),
    };
    session.attach_snapshot(snapshot)?;
    session.review(reference)?;

    let receipt = session.save(&store)?;
    println!("{}", serde_json::to_string_pretty(&receipt.record)?);
    Ok(())
}

/// Feed `source` through the session until one frame is captured or the
/// source runs dry. A nonzero `arm_after` leaves the gate to the provider,
/// which arms it once that many frames have gone by.
async fn run_capture<S>(
    source: S,
    session: &SharedSession,
    arm_after: usize,
) -> Result<(Option<Capture>, usize)>
where
    S: FrameSource + 'static,
{
    if arm_after == 0 {
        session.arm()?;
        println!("{}", Feedback::Prompt);
    }

    let mut provider =
        engine::spawn_provider(source, session.clone(), (arm_after > 0).then_some(arm_after))?;
    let mut last_feedback = None;
    let mut captured = None;

    while let Some(event) = provider.next_event().await {
        if let Some(feedback) = event.outcome.feedback() {
            if last_feedback != Some(feedback) {
                println!("{feedback}");
                last_feedback = Some(feedback);
            }
        }
        if event.armed {
            println!("{}", Feedback::Prompt);
        }
        match event.outcome {
            FrameOutcome::Captured { record, snapshot } => {
                captured = Some(Capture {
                    record,
                    request: snapshot,
                    image: event.image,
                });
                break;
            }
            FrameOutcome::Malformed(e) => {
                tracing::debug!(seq = event.sequence, error = %e, "skipped malformed frame");
            }
            _ => {}
        }
    }
    let frames = provider.shutdown().await?;
    Ok((captured, frames))
}

fn check(config: &Config, recording: &Path) -> Result<()> {
    let calibration = config.calibration()?;
    let mut source = ReplaySource::open(recording, config.canvas())?;

    while let Some(frame) = source.next_frame()? {
        println!("{}", classify(&frame, &calibration));
    }

    Ok(())
}

/// One `check` output line for a frame.
fn classify(frame: &LandmarkFrame, calibration: &Calibration) -> serde_json::Value {
    let set = match frame.landmark_slice().map(LandmarkSet::from_points) {
        None => return serde_json::json!({ "sequence": frame.sequence, "status": "no_face" }),
        Some(Err(e)) => {
            return serde_json::json!({
                "sequence": frame.sequence,
                "status": "malformed",
                "error": e.to_string(),
            })
        }
        Some(Ok(set)) => set,
    };

    let alignment = validate_with_threshold(&set, calibration.max_tilt_degrees);
    if !alignment.aligned {
        return serde_json::json!({
            "sequence": frame.sequence,
            "status": "misaligned",
            "tilt_degrees": alignment.tilt_degrees,
        });
    }

    match measure_with(&set, frame.width, frame.height, calibration) {
        Ok(m) => serde_json::json!({
            "sequence": frame.sequence,
            "status": "aligned",
            "tilt_degrees": alignment.tilt_degrees,
            "measurement": m,
        }),
        Err(e) => serde_json::json!({
            "sequence": frame.sequence,
            "status": "degenerate",
            "error": e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lensfit_core::landmarks::*;
    use lensfit_core::Point;
    use lensfit_session::CaptureState;
    use std::io::Cursor;

    fn aligned_points() -> Vec<Point> {
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

    fn frame(landmarks: Option<Vec<Point>>) -> LandmarkFrame {
        let line = serde_json::json!({ "landmarks": landmarks }).to_string();
        ReplaySource::new(Cursor::new(line.into_bytes()), (480, 640))
            .next_frame()
            .unwrap()
            .unwrap()
    }

    fn recording(frames: usize) -> ReplaySource<Cursor<Vec<u8>>> {
        let line = serde_json::json!({ "landmarks": aligned_points() }).to_string();
        let body = vec![line; frames].join("\n");
        ReplaySource::new(Cursor::new(body.into_bytes()), (480, 640))
    }

    #[tokio::test]
    async fn test_delayed_arm_captures_first_frame_after_arm_point() {
        for _ in 0..20 {
            let session = SharedSession::new(CaptureSession::default());
            let (captured, frames) = run_capture(recording(8), &session, 5).await.unwrap();

            let capture = captured.expect("a frame after the arm point is captured");
            assert_eq!(capture.request.frame_index, 5);
            assert!(capture.image.is_none());
            assert!(frames >= 6);
            assert_eq!(session.state(), CaptureState::Captured);
        }
    }

    #[tokio::test]
    async fn test_immediate_arm_captures_first_frame() {
        let session = SharedSession::new(CaptureSession::default());
        let (captured, _) = run_capture(recording(3), &session, 0).await.unwrap();
        assert_eq!(captured.unwrap().request.frame_index, 0);
    }

    #[tokio::test]
    async fn test_arm_point_past_end_captures_nothing() {
        let session = SharedSession::new(CaptureSession::default());
        let (captured, frames) = run_capture(recording(3), &session, 5).await.unwrap();
        assert!(captured.is_none());
        assert_eq!(frames, 3);
        assert_eq!(session.state(), CaptureState::Idle);
    }

    #[test]
    fn test_classify_statuses() {
        let calibration = Calibration::default();

        let line = classify(&frame(None), &calibration);
        assert_eq!(line["status"], "no_face");

        let line = classify(&frame(Some(vec![Point::new(0.5, 0.5)])), &calibration);
        assert_eq!(line["status"], "malformed");

        let mut tilted = aligned_points();
        tilted[CHIN] = Point::new(0.60, 0.90);
        let line = classify(&frame(Some(tilted)), &calibration);
        assert_eq!(line["status"], "misaligned");
        assert_eq!(line["tilt_degrees"], 7.13);

        let mut narrow = aligned_points();
        narrow[TEMPLE_RIGHT] = Point::new(0.20, 0.38);
        let line = classify(&frame(Some(narrow)), &calibration);
        assert_eq!(line["status"], "degenerate");

        let line = classify(&frame(Some(aligned_points())), &calibration);
        assert_eq!(line["status"], "aligned");
        assert_eq!(line["tilt_degrees"], 0.0);
        assert_eq!(line["measurement"]["dnp"]["left_mm"], 25.4);
        assert_eq!(line["measurement"]["distance_estimate_cm"], 0.52);
    }
}
