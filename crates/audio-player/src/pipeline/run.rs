//! One playback run: decode → (resample) → output from a start offset until the
//! source drains or the run is cancelled.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use cpal::traits::StreamTrait;

use crate::clock::PlaybackClock;
use crate::config::PlaybackConfig;
use crate::decode::{self, ProbedSource};
use crate::output::{self, OutputControls};
use crate::queue::{SampleQueue, capacity_for};
use crate::{device, resample};

/// Everything a run thread needs, moved into it at spawn.
pub(crate) struct RunRequest {
    pub source: ProbedSource,
    pub path: PathBuf,
    pub start: Duration,
    pub config: PlaybackConfig,
    pub device: Option<String>,
    pub paused: bool,
    pub volume_percent: Arc<std::sync::atomic::AtomicU8>,
}

/// Handle to a running playback thread.
pub(crate) struct RunHandle {
    cancel: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    clock: Arc<PlaybackClock>,
    start: Duration,
    join: JoinHandle<()>,
}

impl RunHandle {
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Rendered position, or the start offset until the output rate is known.
    pub fn position(&self) -> Duration {
        self.clock.position().unwrap_or(self.start)
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel and wait for the run thread to exit.
    pub fn cancel(self) {
        self.cancel.store(true, Ordering::Relaxed);
        let _ = self.join.join();
    }
}

/// Spawn a playback run.
pub(crate) fn start_run(req: RunRequest) -> RunHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let paused = Arc::new(AtomicBool::new(req.paused));
    let clock = Arc::new(PlaybackClock::new());
    let start = req.start;

    let controls = OutputControls {
        paused: paused.clone(),
        volume_percent: req.volume_percent.clone(),
        clock: clock.clone(),
        refill_max_frames: req.config.refill_max_frames,
        drained: Arc::new(AtomicBool::new(false)),
    };
    let cancel_for_thread = cancel.clone();
    let join = thread::spawn(move || {
        let path = req.path.clone();
        if let Err(e) = play_one(req, controls, &cancel_for_thread) {
            tracing::warn!(path = ?path, "playback error: {e:#}");
        }
    });

    RunHandle {
        cancel,
        paused,
        clock,
        start,
        join,
    }
}

fn play_one(req: RunRequest, controls: OutputControls, cancel: &AtomicBool) -> Result<()> {
    let host = cpal::default_host();
    let device = device::pick_device(&host, req.device.as_deref())?;
    let src_spec = req.source.info.spec;
    let config = device::pick_output_config(&device, src_spec.rate)?;
    let mut stream_config: cpal::StreamConfig = config.clone().into();
    if let Some(buf) = device::pick_buffer_size(&config) {
        stream_config.buffer_size = buf;
    }
    let dst_rate = stream_config.sample_rate;

    tracing::info!(
        src_rate_hz = src_spec.rate,
        dst_rate_hz = dst_rate,
        channels = src_spec.channels.count(),
        start_ms = req.start.as_millis() as u64,
        "playback run starting"
    );

    let channels = src_spec.channels.count();
    let srcq = Arc::new(SampleQueue::new(
        channels,
        capacity_for(src_spec.rate, channels, req.config.buffer_seconds),
    ));
    let decoder = decode::spawn_decoder(req.source, req.start, srcq.clone(), req.path);

    let mut resampler = None;
    let result = (|| -> Result<()> {
        let dstq = if src_spec.rate == dst_rate {
            tracing::debug!(rate_hz = dst_rate, "resample skipped");
            srcq.clone()
        } else {
            let stage = resample::start_resampler(
                srcq.clone(),
                src_spec.rate,
                dst_rate,
                resample::ResampleConfig {
                    chunk_frames: req.config.chunk_frames,
                    buffer_seconds: req.config.buffer_seconds,
                },
            )?;
            resampler = Some((stage.join, stage.output.clone()));
            stage.output
        };

        controls.clock.start_at(dst_rate, req.start);
        let stream = output::build_output_stream(
            &device,
            &stream_config,
            config.sample_format(),
            &dstq,
            controls.clone(),
        )?;
        stream.play().context("start output stream")?;

        if dstq.wait_drained_or_cancel(cancel) {
            let timeout = drain_timeout(
                &stream_config.buffer_size,
                req.config.refill_max_frames,
                dst_rate,
            );
            if wait_output_drained(&controls.drained, &controls.paused, cancel, timeout) {
                tracing::info!("playback run finished");
            } else {
                tracing::debug!(
                    timeout_ms = timeout.as_millis() as u64,
                    "output tail not confirmed"
                );
            }
        } else {
            controls.paused.store(true, Ordering::Relaxed);
            dstq.flush();
        }
        drop(stream);
        Ok(())
    })();

    // Unblocks the decoder (and resampler) on every exit path.
    srcq.flush();
    let _ = decoder.join();
    if let Some((join, out)) = resampler {
        out.flush();
        let _ = join.join();
    }
    result
}

/// Device buffer size assumed when the backend picks it.
const DEFAULT_DEVICE_BUFFER_FRAMES: u64 = 16_384;

/// Upper bound on the time the output needs to play what it already took.
fn drain_timeout(buffer: &cpal::BufferSize, refill_max_frames: usize, rate_hz: u32) -> Duration {
    let device_frames = match buffer {
        cpal::BufferSize::Fixed(n) => u64::from(*n),
        cpal::BufferSize::Default => DEFAULT_DEVICE_BUFFER_FRAMES,
    };
    let frames = device_frames * 2 + refill_max_frames as u64;
    Duration::from_millis(frames * 1000 / u64::from(rate_hz.max(1))) + Duration::from_millis(100)
}

/// Wait for the callback to report the tail played out.
///
/// Time spent paused does not count against `timeout`. Returns false on cancel or timeout.
fn wait_output_drained(
    drained: &AtomicBool,
    paused: &AtomicBool,
    cancel: &AtomicBool,
    timeout: Duration,
) -> bool {
    let mut deadline = Instant::now() + timeout;
    loop {
        if drained.load(Ordering::Relaxed) {
            return true;
        }
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if paused.load(Ordering::Relaxed) {
            deadline = now + timeout;
        } else if now >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}
