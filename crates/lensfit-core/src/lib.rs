//! lensfit-core — Optical measurements from facial landmarks.
//!
//! Validates Face Mesh landmark sets, rejects tilted heads, and converts
//! the remaining frames into DNP, optical-center height and a camera
//! distance estimate using fixed calibration constants.

pub mod alignment;
pub mod calibration;
pub mod landmarks;
pub mod measurement;
pub mod types;

pub use alignment::{validate, Alignment};
pub use calibration::Calibration;
pub use landmarks::{LandmarkError, LandmarkSet, Point};
pub use measurement::{measure, GeometryError};
pub use types::{CorrectedReference, Dnp, Measurement, OpticalHeight};
