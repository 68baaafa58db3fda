//! Playback state controller for deck-player.
//!
//! The controller turns discrete UI actions (open, play/pause, seek, restart, volume)
//! into commands on a [`MediaPipeline`] and pushes the resulting display state into a
//! [`UiSink`]. Both collaborators are traits so the controller can be driven by the
//! local audio backend or by test doubles.

pub mod media;
pub mod session;
pub mod sink;
pub mod uri;

pub use media::{MediaPipeline, PipelineFactory, PipelineState, SeekFlags};
pub use session::{DEFAULT_VOLUME_PERCENT, PlaybackSession, PlaybackState};
pub use sink::{PlayPauseIcon, UiSink, volume_label};
