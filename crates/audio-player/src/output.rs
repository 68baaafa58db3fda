//! Output stage: the CPAL stream and its real-time callback.
//!
//! The callback:
//! - outputs silence without draining while paused
//! - refills a small local buffer from the queue without blocking
//! - maps source channels onto device channels (mono↔stereo, best-effort otherwise)
//! - applies the volume gain and converts to the device sample format
//! - advances the playback clock by the frames it rendered
//! - raises `drained` once the closed queue has been played out

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use crate::clock::PlaybackClock;
use crate::queue::{PopStrategy, SampleQueue};

/// Shared state the callback reads on every invocation.
#[derive(Clone)]
pub struct OutputControls {
    pub paused: Arc<AtomicBool>,
    /// User-facing volume, `0..=100`.
    pub volume_percent: Arc<AtomicU8>,
    pub clock: Arc<PlaybackClock>,
    pub refill_max_frames: usize,
    /// Set by the callback after the source ended and the device went silent.
    pub drained: Arc<AtomicBool>,
}

/// Build a CPAL output stream fed from `queue`.
///
/// `queue` must already be at the stream's sample rate.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SampleQueue>,
    controls: OutputControls,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, controls),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, controls),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, controls),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, controls),
        other => Err(anyhow!("unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SampleQueue>,
    controls: OutputControls,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let dst_channels = config.channels as usize;
    let renderer = Mutex::new(Renderer::new(queue.channels(), dst_channels));
    let queue = queue.clone();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            if controls.paused.load(Ordering::Relaxed) {
                data.fill(T::from_sample(0.0f32));
                return;
            }
            let gain = gain_for_percent(controls.volume_percent.load(Ordering::Relaxed));
            let Ok(mut r) = renderer.lock() else {
                data.fill(T::from_sample(0.0f32));
                return;
            };
            let frames = r.fill(data, &queue, gain, controls.refill_max_frames);
            if frames > 0 {
                controls.clock.advance(frames as u64);
            }
            if r.is_drained() {
                controls.drained.store(true, Ordering::Relaxed);
            }
        },
        |err| tracing::warn!("output stream error: {err}"),
        None,
    )?;
    Ok(stream)
}

/// Linear gain for a volume percent.
pub fn gain_for_percent(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}

/// Full silent callbacks after end of stream before the output counts as drained.
///
/// The first one can still overlap audio queued in the device buffer.
const DRAINED_AFTER_SILENT_CALLBACKS: u32 = 2;

/// Callback-local buffer of interleaved source samples.
pub struct Renderer {
    src_channels: usize,
    dst_channels: usize,
    buf: Vec<f32>,
    pos: usize,
    silent_callbacks: u32,
}

impl Renderer {
    pub fn new(src_channels: usize, dst_channels: usize) -> Self {
        Self {
            src_channels: src_channels.max(1),
            dst_channels: dst_channels.max(1),
            buf: Vec::new(),
            pos: 0,
            silent_callbacks: 0,
        }
    }

    /// Fill `out` from the queue. Frames the queue cannot supply are silence.
    ///
    /// Returns the number of frames taken from the queue.
    pub fn fill<T>(
        &mut self,
        out: &mut [T],
        queue: &SampleQueue,
        gain: f32,
        refill: usize,
    ) -> usize
    where
        T: cpal::Sample + cpal::FromSample<f32>,
    {
        let taken = self.render(out, queue, gain, refill);
        if taken == 0 && queue.is_closed() {
            self.silent_callbacks = self.silent_callbacks.saturating_add(1);
        } else {
            self.silent_callbacks = 0;
        }
        taken
    }

    /// The source has ended and everything taken from it has reached the device.
    pub fn is_drained(&self) -> bool {
        self.silent_callbacks >= DRAINED_AFTER_SILENT_CALLBACKS
    }

    fn render<T>(&mut self, out: &mut [T], queue: &SampleQueue, gain: f32, refill: usize) -> usize
    where
        T: cpal::Sample + cpal::FromSample<f32>,
    {
        let frames = out.len() / self.dst_channels;
        for frame in 0..frames {
            if self.pos >= self.buf.len() {
                self.pos = 0;
                match queue.pop(PopStrategy::NonBlocking {
                    max_frames: refill.max(1),
                }) {
                    Some(v) => self.buf = v,
                    None => {
                        self.buf.clear();
                        out[frame * self.dst_channels..].fill(T::from_sample(0.0f32));
                        return frame;
                    }
                }
            }
            for ch in 0..self.dst_channels {
                out[frame * self.dst_channels + ch] = T::from_sample(self.mapped(ch) * gain);
            }
            self.pos += self.src_channels;
        }
        frames
    }

    fn mapped(&self, dst_ch: usize) -> f32 {
        let frame = &self.buf[self.pos..(self.pos + self.src_channels).min(self.buf.len())];
        let get = |ch: usize| frame.get(ch).copied().unwrap_or(0.0);
        match (self.src_channels, self.dst_channels) {
            (2, 1) => 0.5 * (get(0) + get(1)),
            (1, _) => get(0),
            (src, _) => get(dst_ch.min(src - 1)),
        }
    }
}
