//! Streaming resample stage.
//!
//! Converts decoded interleaved `f32` from the source rate to the device rate with
//! Rubato's sinc resampler, in a background thread that reads one [`SampleQueue`] and
//! writes another.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

use crate::queue::{PopStrategy, SampleQueue, capacity_for};

const MAX_RELATIVE_RATIO: f64 = 1.1;

#[derive(Clone, Copy, Debug)]
pub struct ResampleConfig {
    /// Input chunk size in frames.
    pub chunk_frames: usize,
    /// Target buffering of the output queue, in seconds.
    pub buffer_seconds: f32,
}

/// A running resampler thread and the queue it feeds.
pub struct ResampleStage {
    pub output: Arc<SampleQueue>,
    pub join: JoinHandle<()>,
}

/// Start resampling `srcq` (at `src_rate`) into a new queue at `dst_rate`.
///
/// The output queue is closed once the input is closed and drained, or when the
/// output queue is closed by its consumer.
pub fn start_resampler(
    srcq: Arc<SampleQueue>,
    src_rate: u32,
    dst_rate: u32,
    cfg: ResampleConfig,
) -> Result<ResampleStage> {
    if src_rate == 0 || dst_rate == 0 {
        return Err(anyhow!("invalid resample rates {src_rate} -> {dst_rate}"));
    }
    let channels = srcq.channels();
    let dstq = Arc::new(SampleQueue::new(
        channels,
        capacity_for(dst_rate, channels, cfg.buffer_seconds),
    ));

    let ratio = dst_rate as f64 / src_rate as f64;
    let chunk_frames = cfg.chunk_frames.max(1);

    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };

    let out_frames = output_capacity_frames(chunk_frames, ratio);
    let dstq_thread = dstq.clone();
    let join = thread::spawn(move || {
        let mut resampler: Box<dyn Resampler<f32>> = match Async::<f32>::new_sinc(
            ratio,
            MAX_RELATIVE_RATIO,
            &params,
            chunk_frames,
            channels,
            FixedAsync::Input,
        ) {
            Ok(r) => Box::new(r),
            Err(e) => {
                tracing::error!("resampler init error: {e:#}");
                dstq_thread.close();
                return;
            }
        };

        let mut out = vec![0.0f32; out_frames * channels];
        let mut indexing = Indexing {
            input_offset: 0,
            output_offset: 0,
            active_channels_mask: None,
            partial_len: None,
        };

        let mut draining = false;
        loop {
            let input = if draining {
                srcq.pop(PopStrategy::BlockingUpTo {
                    max_frames: chunk_frames,
                })
            } else {
                srcq.pop(PopStrategy::BlockingExact {
                    frames: chunk_frames,
                })
            };
            let input = match input {
                Some(v) => v,
                None if !draining => {
                    // Source closed with less than a full chunk left.
                    draining = true;
                    continue;
                }
                None => break,
            };
            let frames = input.len() / channels;
            if frames == 0 {
                continue;
            }

            let input_adapter = match InterleavedSlice::new(&input, channels, frames) {
                Ok(a) => a,
                Err(e) => {
                    tracing::error!("resampler input buffer error: {e:#}");
                    break;
                }
            };
            let mut output_adapter = match InterleavedSlice::new_mut(&mut out, channels, out_frames)
            {
                Ok(a) => a,
                Err(e) => {
                    tracing::error!("resampler output buffer error: {e:#}");
                    break;
                }
            };

            indexing.input_offset = 0;
            indexing.output_offset = 0;
            indexing.partial_len = if frames < chunk_frames {
                Some(frames)
            } else {
                None
            };

            let (_consumed, produced) = match resampler.process_into_buffer(
                &input_adapter,
                &mut output_adapter,
                Some(&indexing),
            ) {
                Ok(x) => x,
                Err(e) => {
                    tracing::error!("resampler process error: {e:#}");
                    break;
                }
            };

            if produced > 0 && !dstq_thread.push_blocking(&out[..produced * channels]) {
                break;
            }
        }

        dstq_thread.close();
    });

    Ok(ResampleStage { output: dstq, join })
}

/// Output buffer size for one input chunk at `ratio`, with headroom for the
/// resampler's relative ratio range and filter delay.
fn output_capacity_frames(chunk_frames: usize, ratio: f64) -> usize {
    (chunk_frames as f64 * ratio * MAX_RELATIVE_RATIO).ceil() as usize + 256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_capacity_covers_upsampling() {
        let frames = output_capacity_frames(1024, 192_000.0 / 44_100.0);
        assert!(frames >= 4459 + 256);
        assert_eq!(output_capacity_frames(1024, 1.0), 1127 + 256);
    }

    #[test]
    fn rejects_zero_rates() {
        let srcq = Arc::new(SampleQueue::new(2, 64));
        let cfg = ResampleConfig {
            chunk_frames: 64,
            buffer_seconds: 0.5,
        };
        assert!(start_resampler(srcq.clone(), 0, 48_000, cfg).is_err());
        assert!(start_resampler(srcq, 44_100, 0, cfg).is_err());
    }

    #[test]
    fn resampler_converts_and_closes() {
        let srcq = Arc::new(SampleQueue::new(1, 100_000));
        srcq.push_blocking(&vec![0.5f32; 4_410]);
        srcq.close();

        let stage = start_resampler(
            srcq,
            44_100,
            48_000,
            ResampleConfig {
                chunk_frames: 441,
                buffer_seconds: 2.0,
            },
        )
        .unwrap();
        stage.join.join().unwrap();

        assert!(stage.output.is_closed());
        let frames = stage.output.len_frames();
        assert!(frames > 4_000 && frames <= 4_800, "got {frames} frames");
    }
}
