/// Tuning for the decode, resample, and output stages of a playback run.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackConfig {
    /// Resampler input chunk size in frames.
    pub chunk_frames: usize,
    /// Max frames the output callback pulls per refill.
    pub refill_max_frames: usize,
    /// Target buffering per queue, in seconds.
    pub buffer_seconds: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            chunk_frames: 1024,
            refill_max_frames: 4096,
            buffer_seconds: 2.0,
        }
    }
}

impl PlaybackConfig {
    /// Shrink buffering for runs started by a seek so the jump is heard quickly.
    pub fn for_seek(&self) -> PlaybackConfig {
        PlaybackConfig {
            chunk_frames: self.chunk_frames.min(1024),
            refill_max_frames: self.refill_max_frames.min(2048),
            buffer_seconds: self.buffer_seconds.min(1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_seek_caps_values() {
        let cfg = PlaybackConfig {
            chunk_frames: 4096,
            refill_max_frames: 8192,
            buffer_seconds: 3.0,
        };
        let eff = cfg.for_seek();
        assert_eq!(eff.chunk_frames, 1024);
        assert_eq!(eff.refill_max_frames, 2048);
        assert_eq!(eff.buffer_seconds, 1.0);
    }

    #[test]
    fn for_seek_keeps_small_values() {
        let cfg = PlaybackConfig {
            chunk_frames: 512,
            refill_max_frames: 1024,
            buffer_seconds: 0.5,
        };
        assert_eq!(cfg.for_seek(), cfg);
    }
}
