//! Media pipeline capability consumed by the controller.

use std::fmt;
use std::time::Duration;

use anyhow::Result;

/// Target state commanded on a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// Stopped; all resources released, position reset.
    Null,
    /// Prerolled but not advancing.
    Paused,
    /// Rendering audio.
    Playing,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Null => "null",
            PipelineState::Paused => "paused",
            PipelineState::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// Flags attached to an absolute seek.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeekFlags {
    /// Discard buffered/in-flight data so the new position takes effect immediately.
    pub flush: bool,
}

impl SeekFlags {
    pub const FLUSH: SeekFlags = SeekFlags { flush: true };
    pub const NONE: SeekFlags = SeekFlags { flush: false };
}

/// One playback engine instance bound to a single media source.
///
/// Seeks are absolute and always at normal (1.0) rate. Releasing the pipeline is
/// dropping it; owners command [`PipelineState::Null`] first.
pub trait MediaPipeline {
    /// Command a state transition. Completion is not awaited.
    fn set_state(&mut self, state: PipelineState) -> Result<()>;

    /// Set the output gain, `0.0..=1.0`.
    fn set_volume(&mut self, fraction: f64);

    /// Seek to an absolute position from the start of the media.
    fn seek_absolute(&mut self, position: Duration, flags: SeekFlags) -> Result<()>;

    /// Current playback position, if the pipeline can answer.
    fn query_position(&self) -> Option<Duration>;

    /// Total media duration, if known.
    fn query_duration(&self) -> Option<Duration>;
}

/// Constructs pipelines bound to a URI.
pub trait PipelineFactory {
    type Pipeline: MediaPipeline;

    /// Build a new pipeline for `uri`. The returned pipeline starts in [`PipelineState::Null`].
    fn open(&mut self, uri: &str) -> Result<Self::Pipeline>;
}

impl<P: MediaPipeline + ?Sized> MediaPipeline for Box<P> {
    fn set_state(&mut self, state: PipelineState) -> Result<()> {
        (**self).set_state(state)
    }

    fn set_volume(&mut self, fraction: f64) {
        (**self).set_volume(fraction)
    }

    fn seek_absolute(&mut self, position: Duration, flags: SeekFlags) -> Result<()> {
        (**self).seek_absolute(position, flags)
    }

    fn query_position(&self) -> Option<Duration> {
        (**self).query_position()
    }

    fn query_duration(&self) -> Option<Duration> {
        (**self).query_duration()
    }
}
