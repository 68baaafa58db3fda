//! Output device discovery and selection (thin wrappers around CPAL).

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

/// The first output device whose name contains `needle` (case-insensitive), or the
/// host default when `needle` is `None`.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    let Some(needle) = needle else {
        return host
            .default_output_device()
            .ok_or_else(|| anyhow!("no default output device"));
    };

    let devices = host.output_devices().context("enumerate output devices")?;
    for device in devices {
        let name = match device.description() {
            Ok(desc) => desc.name().to_string(),
            Err(_) => continue,
        };
        if matches_device_name(&name, needle) {
            return Ok(device);
        }
    }
    Err(anyhow!("no output device matched: {needle}"))
}

/// Best output config for a source at `target_rate`.
///
/// Prefers the highest supported rate that does not exceed the target, then the
/// lowest rate above it; ties go to float formats.
pub fn pick_output_config(
    device: &cpal::Device,
    target_rate: u32,
) -> Result<cpal::SupportedStreamConfig> {
    let mut best: Option<(Candidate, cpal::SupportedStreamConfig)> = None;
    for range in device
        .supported_output_configs()
        .context("query output configs")?
    {
        let rate = rate_for_range(range.min_sample_rate(), range.max_sample_rate(), target_rate);
        let candidate = Candidate {
            at_or_below: rate <= target_rate,
            rate,
            format_rank: sample_format_rank(range.sample_format()),
        };
        let replace = match &best {
            None => true,
            Some((current, _)) => candidate.beats(current, target_rate),
        };
        if replace {
            best = Some((candidate, range.with_sample_rate(rate)));
        }
    }
    best.map(|(_, cfg)| cfg)
        .ok_or_else(|| anyhow!("no supported output configs"))
}

/// Largest advertised callback buffer, capped at 16384 frames.
///
/// `None` leaves the device default in place.
pub fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    const MAX_FRAMES: u32 = 16_384;
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            Some(cpal::BufferSize::Fixed((*max).min(MAX_FRAMES).max(*min)))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

/// Print output devices to stdout, for `--list-devices`.
pub fn list_devices(host: &cpal::Host) -> Result<()> {
    let devices = host.output_devices().context("enumerate output devices")?;
    for (i, d) in devices.enumerate() {
        println!("#{i}: {}", d.description()?);
    }
    Ok(())
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    name.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Candidate {
    at_or_below: bool,
    rate: u32,
    format_rank: u8,
}

impl Candidate {
    fn beats(&self, other: &Candidate, target_rate: u32) -> bool {
        if self.at_or_below != other.at_or_below {
            return self.at_or_below;
        }
        if self.rate != other.rate {
            return if self.at_or_below {
                self.rate > other.rate
            } else {
                self.rate.abs_diff(target_rate) < other.rate.abs_diff(target_rate)
            };
        }
        self.format_rank < other.format_rank
    }
}

fn rate_for_range(min: u32, max: u32, target: u32) -> u32 {
    target.clamp(min, max.max(min))
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(at_or_below: bool, rate: u32, format_rank: u8) -> Candidate {
        Candidate {
            at_or_below,
            rate,
            format_rank,
        }
    }

    #[test]
    fn device_name_match_is_case_insensitive() {
        assert!(matches_device_name("USB DAC", "dac"));
        assert!(matches_device_name("Built-in Output", "BUILT"));
        assert!(!matches_device_name("HDMI", "usb"));
    }

    #[test]
    fn rate_for_range_clamps_target() {
        assert_eq!(rate_for_range(44_100, 192_000, 48_000), 48_000);
        assert_eq!(rate_for_range(88_200, 192_000, 44_100), 88_200);
        assert_eq!(rate_for_range(8_000, 48_000, 96_000), 48_000);
    }

    #[test]
    fn rates_at_or_below_target_win() {
        let target = 48_000;
        assert!(cand(true, 44_100, 2).beats(&cand(false, 96_000, 0), target));
        assert!(cand(true, 48_000, 2).beats(&cand(true, 44_100, 0), target));
    }

    #[test]
    fn closest_rate_above_target_wins() {
        let target = 44_100;
        assert!(cand(false, 48_000, 0).beats(&cand(false, 96_000, 0), target));
    }

    #[test]
    fn float_format_breaks_ties() {
        assert!(cand(true, 48_000, 0).beats(&cand(true, 48_000, 2), 48_000));
        assert!(!cand(true, 48_000, 3).beats(&cand(true, 48_000, 1), 48_000));
    }

    #[test]
    fn sample_format_rank_prefers_float() {
        let f32_rank = sample_format_rank(cpal::SampleFormat::F32);
        assert!(f32_rank < sample_format_rank(cpal::SampleFormat::I16));
        assert_eq!(sample_format_rank(cpal::SampleFormat::U8), 10);
    }
}
