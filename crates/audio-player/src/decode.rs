//! Streaming decode stage.
//!
//! Uses Symphonia to:
//! - probe a local file and describe its default audio track
//! - optionally seek to a start offset
//! - decode packets into interleaved `f32` and push them into a [`SampleQueue`]
//!   from a background thread

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use crate::queue::SampleQueue;

/// What the probe learned about the default track.
#[derive(Clone, Debug)]
pub struct SourceInfo {
    pub spec: SignalSpec,
    pub duration: Option<Duration>,
    /// Codec name (best-effort).
    pub codec: Option<String>,
}

/// An opened container positioned on its default audio track.
pub struct ProbedSource {
    format: Box<dyn FormatReader>,
    codec_params: CodecParameters,
    track_id: u32,
    pub info: SourceInfo,
}

/// Open `path` and probe its container and default track.
pub fn probe_file(path: &Path) -> Result<ProbedSource> {
    let file = File::open(path).with_context(|| format!("open {path:?}"))?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("probe {path:?}"))?;

    let format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no default audio track in {path:?}"))?;
    let codec_params = track.codec_params.clone();
    let track_id = track.id;

    let channels = codec_params
        .channels
        .ok_or_else(|| anyhow!("unknown channel layout in {path:?}"))?;
    let rate = codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("unknown sample rate in {path:?}"))?;

    let info = SourceInfo {
        spec: SignalSpec::new(rate, channels),
        duration: duration_from_codec_params(&codec_params),
        codec: codec_name_from_params(&codec_params),
    };

    Ok(ProbedSource {
        format,
        codec_params,
        track_id,
        info,
    })
}

/// Start a decoder thread that fills `queue` from `start` onwards.
///
/// The queue is closed when the stream ends, on a fatal error, or is left alone when
/// a consumer closed it first.
pub fn spawn_decoder(
    source: ProbedSource,
    start: Duration,
    queue: Arc<SampleQueue>,
    path: PathBuf,
) -> JoinHandle<()> {
    thread::spawn(move || {
        if let Err(e) = decode_loop(source, start, &queue) {
            tracing::error!(path = ?path, "decoder thread error: {e:#}");
        }
        queue.close();
    })
}

fn decode_loop(mut source: ProbedSource, start: Duration, queue: &SampleQueue) -> Result<()> {
    let mut skip_until_ts = 0u64;
    if !start.is_zero() {
        let time = Time::new(start.as_secs(), f64::from(start.subsec_nanos()) / 1e9);
        match source.format.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time,
                track_id: Some(source.track_id),
            },
        ) {
            Ok(seeked) => skip_until_ts = seeked.required_ts,
            Err(e) => tracing::warn!(start_ms = start.as_millis() as u64, "seek failed: {e}"),
        }
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&source.codec_params, &DecoderOptions::default())
        .context("create decoder")?;

    loop {
        let packet = match source.format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e).context("read packet"),
        };
        if packet.track_id() != source.track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!("skipping undecodable packet: {e}");
                continue;
            }
            Err(e) => return Err(e).context("decode packet"),
        };

        let frames = decoded.frames();
        let spec = *decoded.spec();
        let skip = frames_to_skip(packet.ts(), frames as u64, skip_until_ts);
        if skip >= frames {
            continue;
        }

        let mut sample_buf = SampleBuffer::<f32>::new(frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let channels = spec.channels.count();
        let samples = &sample_buf.samples()[skip * channels..];

        if !queue.push_blocking(samples) {
            // Consumer went away (seek or stop).
            break;
        }
    }

    Ok(())
}

/// Frames at the head of a packet that precede the seek target.
fn frames_to_skip(packet_ts: u64, packet_frames: u64, required_ts: u64) -> usize {
    if packet_ts >= required_ts {
        return 0;
    }
    (required_ts - packet_ts).min(packet_frames) as usize
}

/// Duration from codec metadata, when the container reports total frames.
fn duration_from_codec_params(codec_params: &CodecParameters) -> Option<Duration> {
    let frames = codec_params.n_frames?;
    let rate = codec_params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    let secs = frames / rate;
    let nanos = (frames % rate) * 1_000_000_000 / rate;
    Some(Duration::new(secs, nanos as u32))
}

/// Best-effort codec label for logs.
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}
