//! Position tracking for a playback run.
//!
//! The output callback adds every frame it renders to `played_frames`; the run thread
//! seeds the counter with the start offset once the output rate is known.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct PlaybackClock {
    played_frames: AtomicU64,
    rate_hz: AtomicU32,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the output rate and seed the counter so position starts at `offset`.
    pub fn start_at(&self, rate_hz: u32, offset: Duration) {
        self.played_frames
            .store(frames_for(offset, rate_hz), Ordering::Relaxed);
        self.rate_hz.store(rate_hz, Ordering::Relaxed);
    }

    pub fn advance(&self, frames: u64) {
        self.played_frames.fetch_add(frames, Ordering::Relaxed);
    }

    pub fn rate_hz(&self) -> Option<u32> {
        match self.rate_hz.load(Ordering::Relaxed) {
            0 => None,
            rate => Some(rate),
        }
    }

    /// Position rendered so far; `None` until the output rate is known.
    pub fn position(&self) -> Option<Duration> {
        let rate = self.rate_hz()? as u64;
        let frames = self.played_frames.load(Ordering::Relaxed);
        let secs = frames / rate;
        let nanos = (frames % rate) * 1_000_000_000 / rate;
        Some(Duration::new(secs, nanos as u32))
    }
}

fn frames_for(offset: Duration, rate_hz: u32) -> u64 {
    (offset.as_nanos() * rate_hz as u128 / 1_000_000_000) as u64
}
