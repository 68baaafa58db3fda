//! Local-file media pipeline.
//!
//! Implements [`deck_core::MediaPipeline`] for `file://` URIs:
//! 1. **Decode**: a background thread uses Symphonia to decode into interleaved `f32`.
//! 2. **Resample**: when the device rate differs, a background thread runs Rubato.
//! 3. **Output**: the CPAL callback drains the queue without blocking, applies volume,
//!    and counts played frames for position queries.

pub mod clock;
pub mod config;
pub mod decode;
pub mod device;
pub mod output;
pub mod pipeline;
pub mod queue;
pub mod resample;

pub use config::PlaybackConfig;
pub use pipeline::{LocalPipeline, LocalPipelineFactory};
