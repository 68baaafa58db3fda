//! [`MediaPipeline`] over a local file.
//!
//! Each play/seek spins up a *run* (see [`run`]): a thread that owns the output stream
//! and the decode/resample stages for one contiguous stretch of playback. Pausing flips
//! the run's paused flag; seeking cancels the run and starts another at the target.

mod run;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use anyhow::Result;
use deck_core::uri::path_from_file_uri;
use deck_core::{MediaPipeline, PipelineFactory, PipelineState, SeekFlags};

use crate::config::PlaybackConfig;
use crate::decode::{ProbedSource, SourceInfo, probe_file};
use run::{RunHandle, RunRequest, start_run};

/// What a state change or seek does to the playback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunAction {
    /// Cancel the run; the next start is from the beginning.
    Stop,
    /// Flip the live run's pause flag.
    SetPaused(bool),
    /// Replace any finished run with a new one from `resume_at`.
    Start { paused: bool },
    /// Remember the offset for the next start.
    Record,
    /// Cancel the run and start another at the seek target.
    Restart { paused: bool },
}

fn plan_state(target: PipelineState, run_live: bool) -> RunAction {
    let paused = target == PipelineState::Paused;
    match target {
        PipelineState::Null => RunAction::Stop,
        _ if run_live => RunAction::SetPaused(paused),
        _ => RunAction::Start { paused },
    }
}

fn plan_seek(current: PipelineState) -> RunAction {
    match current {
        PipelineState::Null => RunAction::Record,
        PipelineState::Paused => RunAction::Restart { paused: true },
        PipelineState::Playing => RunAction::Restart { paused: false },
    }
}

/// Builds [`LocalPipeline`]s for `file://` URIs.
#[derive(Clone, Debug, Default)]
pub struct LocalPipelineFactory {
    pub config: PlaybackConfig,
    /// Output device name filter; `None` uses the host default.
    pub device: Option<String>,
}

impl LocalPipelineFactory {
    pub fn new(config: PlaybackConfig, device: Option<String>) -> Self {
        Self { config, device }
    }
}

impl PipelineFactory for LocalPipelineFactory {
    type Pipeline = LocalPipeline;

    fn open(&mut self, uri: &str) -> Result<LocalPipeline> {
        let path = path_from_file_uri(uri)?;
        LocalPipeline::open(path, self.config.clone(), self.device.clone())
    }
}

/// Playback of one local file.
pub struct LocalPipeline {
    path: PathBuf,
    info: SourceInfo,
    config: PlaybackConfig,
    device: Option<String>,
    state: PipelineState,
    volume_percent: Arc<AtomicU8>,
    /// Where the next run starts.
    resume_at: Duration,
    /// Probe result from `open`, reused by the first run.
    probed: Option<ProbedSource>,
    run: Option<RunHandle>,
}

impl LocalPipeline {
    /// Probe `path` and return a stopped pipeline for it.
    pub fn open(path: PathBuf, config: PlaybackConfig, device: Option<String>) -> Result<Self> {
        let probed = probe_file(&path)?;
        let info = probed.info.clone();
        tracing::info!(
            path = ?path,
            rate_hz = info.spec.rate,
            channels = info.spec.channels.count(),
            codec = info.codec.as_deref().unwrap_or("unknown"),
            duration_ms = info.duration.map(|d| d.as_millis() as u64),
            "source probed"
        );
        Ok(Self {
            path,
            info,
            config,
            device,
            state: PipelineState::Null,
            volume_percent: Arc::new(AtomicU8::new(100)),
            resume_at: Duration::ZERO,
            probed: Some(probed),
            run: None,
        })
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Current volume, `0..=100`.
    pub fn volume_percent(&self) -> u8 {
        self.volume_percent.load(Ordering::Relaxed)
    }

    fn stop_run(&mut self) {
        if let Some(run) = self.run.take() {
            run.cancel();
        }
    }

    fn spawn_run(&mut self, start: Duration, paused: bool, config: PlaybackConfig) -> Result<()> {
        let source = match self.probed.take() {
            Some(source) if start.is_zero() => source,
            _ => probe_file(&self.path)?,
        };
        self.run = Some(start_run(RunRequest {
            source,
            path: self.path.clone(),
            start,
            config,
            device: self.device.clone(),
            paused,
            volume_percent: self.volume_percent.clone(),
        }));
        Ok(())
    }

    fn clamp_to_duration(&self, position: Duration) -> Duration {
        match self.info.duration {
            Some(total) => position.min(total),
            None => position,
        }
    }
}

impl MediaPipeline for LocalPipeline {
    fn set_state(&mut self, state: PipelineState) -> Result<()> {
        tracing::debug!(from = %self.state, to = %state, "pipeline state change");
        let live = self.run.as_ref().is_some_and(|r| !r.is_finished());
        match plan_state(state, live) {
            RunAction::Stop => {
                self.stop_run();
                self.resume_at = Duration::ZERO;
            }
            RunAction::SetPaused(paused) => {
                if let Some(run) = &self.run {
                    run.set_paused(paused);
                }
            }
            RunAction::Start { paused } => {
                self.stop_run();
                self.spawn_run(self.resume_at, paused, self.config.clone())?;
            }
            RunAction::Record | RunAction::Restart { .. } => {}
        }
        self.state = state;
        Ok(())
    }

    fn set_volume(&mut self, fraction: f64) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).round() as u8;
        self.volume_percent.store(percent, Ordering::Relaxed);
    }

    fn seek_absolute(&mut self, position: Duration, flags: SeekFlags) -> Result<()> {
        let target = self.clamp_to_duration(position);
        tracing::debug!(
            target_ms = target.as_millis() as u64,
            flush = flags.flush,
            "seek"
        );
        self.resume_at = target;
        match plan_seek(self.state) {
            RunAction::Restart { paused } => {
                // Buffered audio is always discarded: the run is replaced.
                self.stop_run();
                self.spawn_run(target, paused, self.config.for_seek())
            }
            _ => Ok(()),
        }
    }

    fn query_position(&self) -> Option<Duration> {
        if self.state == PipelineState::Null {
            return None;
        }
        let position = self.run.as_ref().map(|r| r.position())?;
        Some(self.clamp_to_duration(position))
    }

    fn query_duration(&self) -> Option<Duration> {
        self.info.duration
    }
}

impl Drop for LocalPipeline {
    fn drop(&mut self) {
        self.stop_run();
    }
}
