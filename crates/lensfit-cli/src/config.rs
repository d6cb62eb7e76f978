use lensfit_core::calibration::CalibrationError;
use lensfit_core::Calibration;
use std::path::PathBuf;

/// CLI configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite measurement database.
    pub db_path: PathBuf,
    /// Optional TOML calibration profile overriding the built-in constants.
    pub calibration_path: Option<PathBuf>,
    /// Canvas width assumed for frames that do not carry their own size.
    pub frame_width: u32,
    /// Canvas height assumed for frames that do not carry their own size.
    pub frame_height: u32,
    /// Replay pacing in frames per second; 0 replays unpaced.
    pub replay_fps: u32,
}

impl Config {
    /// Load configuration from `LENSFIT_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("lensfit");

        let db_path = std::env::var("LENSFIT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("measurements.db"));

        Self {
            db_path,
            calibration_path: std::env::var("LENSFIT_CALIBRATION").ok().map(PathBuf::from),
            frame_width: env_u32("LENSFIT_FRAME_WIDTH", 640),
            frame_height: env_u32("LENSFIT_FRAME_HEIGHT", 480),
            replay_fps: env_u32("LENSFIT_REPLAY_FPS", 30),
        }
    }

    pub fn canvas(&self) -> (u32, u32) {
        (self.frame_width, self.frame_height)
    }

    /// The calibration profile, or the built-in constants when none is set.
    pub fn calibration(&self) -> Result<Calibration, CalibrationError> {
        match &self.calibration_path {
            Some(path) => Calibration::load(path),
            None => Ok(Calibration::default()),
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
