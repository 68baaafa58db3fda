//! The playback session: one owned pipeline, a play/pause flag, and the volume value.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::media::{MediaPipeline, PipelineFactory, PipelineState, SeekFlags};
use crate::sink::{PlayPauseIcon, UiSink, volume_label};
use crate::uri::{display_name, file_uri_from_path};

/// Volume shown at startup, in percent.
pub const DEFAULT_VOLUME_PERCENT: f64 = 50.0;

/// Two-state transport flag mirrored into the play/pause icon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
}

impl PlaybackState {
    fn pipeline_state(self) -> PipelineState {
        match self {
            PlaybackState::Playing => PipelineState::Playing,
            PlaybackState::Paused => PipelineState::Paused,
        }
    }

    fn icon(self) -> PlayPauseIcon {
        match self {
            PlaybackState::Playing => PlayPauseIcon::Pause,
            PlaybackState::Paused => PlayPauseIcon::Play,
        }
    }
}

/// Mutable state behind every UI action.
///
/// At most one pipeline is alive at a time: [`open_file`](Self::open_file) stops and
/// drops the previous pipeline before asking the factory for a new one. Transport
/// commands are no-ops while no pipeline exists.
pub struct PlaybackSession<F: PipelineFactory, S: UiSink> {
    factory: F,
    sink: S,
    pipeline: Option<F::Pipeline>,
    is_playing: bool,
    volume_percent: f64,
}

impl<F: PipelineFactory, S: UiSink> PlaybackSession<F, S> {
    pub fn new(factory: F, sink: S) -> Self {
        Self {
            factory,
            sink,
            pipeline: None,
            is_playing: false,
            volume_percent: 0.0,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn has_pipeline(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn volume_percent(&self) -> f64 {
        self.volume_percent
    }

    /// Replace the current pipeline with one bound to `path` and start playing it.
    ///
    /// On error the session is left without a pipeline.
    pub fn open_file(&mut self, path: &Path) -> Result<()> {
        let uri = file_uri_from_path(path)?;
        self.release_pipeline();

        let mut pipeline = self
            .factory
            .open(&uri)
            .with_context(|| format!("open pipeline for {uri}"))?;
        pipeline.set_volume(self.volume_percent / 100.0);
        self.pipeline = Some(pipeline);
        tracing::info!(uri = %uri, "pipeline created");

        self.sink.set_file_label(&display_name(path));
        self.apply_playback_state(PlaybackState::Playing);
        Ok(())
    }

    /// Flip between playing and paused.
    pub fn toggle_play_pause(&mut self) {
        if self.pipeline.is_none() {
            return;
        }
        let next = if self.is_playing {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        };
        self.apply_playback_state(next);
    }

    /// Command `state` on the pipeline and mirror it into the flag and the icon.
    pub fn apply_playback_state(&mut self, state: PlaybackState) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        if let Err(e) = pipeline.set_state(state.pipeline_state()) {
            tracing::warn!("set pipeline state {} failed: {e:#}", state.pipeline_state());
        }
        self.is_playing = state == PlaybackState::Playing;
        self.sink.set_play_pause_icon(state.icon());
    }

    /// Flushing seek back to the start. Leaves the play/pause flag alone.
    pub fn restart(&mut self) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        if let Err(e) = pipeline.seek_absolute(Duration::ZERO, SeekFlags::FLUSH) {
            tracing::warn!("restart seek failed: {e:#}");
        }
    }

    /// Move the position by `delta_secs`.
    ///
    /// The seek is applied only when the target lies strictly inside `(0, duration)`;
    /// anything else, including failed position/duration queries, is dropped.
    pub fn seek_relative(&mut self, delta_secs: i64) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        let (Some(position), Some(duration)) =
            (pipeline.query_position(), pipeline.query_duration())
        else {
            return;
        };
        let Some(target) = relative_seek_target(position, duration, delta_secs) else {
            tracing::debug!(
                position_ms = position.as_millis() as u64,
                duration_ms = duration.as_millis() as u64,
                delta_secs,
                "seek out of range dropped"
            );
            return;
        };
        if let Err(e) = pipeline.seek_absolute(target, SeekFlags::FLUSH) {
            tracing::warn!("seek failed: {e:#}");
        }
    }

    /// Record and forward a volume change from the slider.
    ///
    /// The slider owns the `0..=100` domain; no clamping happens here.
    pub fn set_volume(&mut self, percent: f64) {
        self.volume_percent = percent;
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.set_volume(percent / 100.0);
        }
        self.sink.set_volume_label(&volume_label(percent));
    }

    /// Show the startup volume. Does not consult any system mixer.
    pub fn initial_volume_display(&mut self) {
        self.set_volume(DEFAULT_VOLUME_PERCENT);
    }

    /// Current position, for progress display.
    pub fn position(&self) -> Option<Duration> {
        self.pipeline.as_ref().and_then(|p| p.query_position())
    }

    /// Media duration, for progress display.
    pub fn duration(&self) -> Option<Duration> {
        self.pipeline.as_ref().and_then(|p| p.query_duration())
    }

    /// Stop and release the pipeline, if any.
    pub fn shutdown(&mut self) {
        self.release_pipeline();
    }

    fn release_pipeline(&mut self) {
        if let Some(mut old) = self.pipeline.take() {
            if let Err(e) = old.set_state(PipelineState::Null) {
                tracing::warn!("stop pipeline failed: {e:#}");
            }
            drop(old);
            tracing::debug!("pipeline released");
        }
        self.is_playing = false;
    }
}

impl<F: PipelineFactory, S: UiSink> Drop for PlaybackSession<F, S> {
    fn drop(&mut self) {
        self.release_pipeline();
    }
}

/// Target of a relative seek, or `None` when it falls outside `(0, duration)`.
pub fn relative_seek_target(
    position: Duration,
    duration: Duration,
    delta_secs: i64,
) -> Option<Duration> {
    let target = position.as_nanos() as i128 + i128::from(delta_secs) * 1_000_000_000;
    if target <= 0 || target >= duration.as_nanos() as i128 {
        return None;
    }
    u64::try_from(target).ok().map(Duration::from_nanos)
}
