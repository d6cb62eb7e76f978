//! lensfit-capture — Frame delivery from a landmark provider.
//!
//! Abstracts the detector behind a pull-based [`FrameSource`] and ships a
//! replay source for recorded NDJSON landmark streams.

pub mod frame;
pub mod source;

pub use frame::{FrameRecord, LandmarkFrame};
pub use source::{FrameSource, ReplaySource, SourceError};
