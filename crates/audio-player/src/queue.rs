//! Bounded queue of interleaved `f32` samples connecting the playback stages.
//!
//! decode thread → queue → (resample thread → queue) → CPAL callback.
//!
//! Producers block when the queue is full; the output callback only ever uses the
//! non-blocking pop. Closing the queue wakes every waiter, which is how a playback run
//! is torn down on seek or stop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Thread-safe bounded sample queue with a fixed channel count.
pub struct SampleQueue {
    channels: usize,
    capacity_samples: usize,
    inner: Mutex<Inner>,
    changed: Condvar,
}

struct Inner {
    samples: VecDeque<f32>,
    closed: bool,
}

/// How many frames a pop should wait for.
#[derive(Clone, Copy, Debug)]
pub enum PopStrategy {
    /// Wait for exactly `frames`; `None` if the queue closes first.
    BlockingExact { frames: usize },
    /// Wait for at least one frame, take up to `max_frames`.
    BlockingUpTo { max_frames: usize },
    /// Take up to `max_frames` of what is there right now.
    NonBlocking { max_frames: usize },
}

/// Queue capacity in samples for `seconds` of audio at `rate_hz`.
///
/// Non-finite or non-positive `seconds` fall back to two seconds.
pub fn capacity_for(rate_hz: u32, channels: usize, seconds: f32) -> usize {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        2.0
    };
    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.saturating_mul(channels).max(channels)
}

impl SampleQueue {
    pub fn new(channels: usize, capacity_samples: usize) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            capacity_samples: capacity_samples.max(channels),
            inner: Mutex::new(Inner {
                samples: VecDeque::new(),
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Buffered frames at the time of the call.
    pub fn len_frames(&self) -> usize {
        self.inner.lock().unwrap().samples.len() / self.channels
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Mark the queue finished. Idempotent.
    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
        self.changed.notify_all();
    }

    /// Close and drop everything still buffered.
    pub fn flush(&self) {
        let mut g = self.inner.lock().unwrap();
        g.closed = true;
        g.samples.clear();
        drop(g);
        self.changed.notify_all();
    }

    /// Append samples, waiting for room. Returns `false` if the queue closed first;
    /// the unsent remainder is dropped.
    pub fn push_blocking(&self, samples: &[f32]) -> bool {
        let mut rest = samples;
        while !rest.is_empty() {
            let mut g = self.inner.lock().unwrap();
            while g.samples.len() >= self.capacity_samples && !g.closed {
                g = self.changed.wait(g).unwrap();
            }
            if g.closed {
                return false;
            }
            let room = self.capacity_samples - g.samples.len();
            let take = room.min(rest.len());
            g.samples.extend(&rest[..take]);
            rest = &rest[take..];
            drop(g);
            self.changed.notify_all();
        }
        true
    }

    /// Remove whole frames according to `strategy`.
    pub fn pop(&self, strategy: PopStrategy) -> Option<Vec<f32>> {
        let mut g = self.inner.lock().unwrap();
        let take_frames = match strategy {
            PopStrategy::BlockingExact { frames } => {
                let want = frames * self.channels;
                while g.samples.len() < want && !g.closed {
                    g = self.changed.wait(g).unwrap();
                }
                if g.samples.len() < want {
                    return None;
                }
                frames
            }
            PopStrategy::BlockingUpTo { max_frames } => {
                while g.samples.len() < self.channels && !g.closed {
                    g = self.changed.wait(g).unwrap();
                }
                (g.samples.len() / self.channels).min(max_frames)
            }
            PopStrategy::NonBlocking { max_frames } => {
                (g.samples.len() / self.channels).min(max_frames)
            }
        };
        if take_frames == 0 {
            return None;
        }
        let out: Vec<f32> = g.samples.drain(..take_frames * self.channels).collect();
        drop(g);
        self.changed.notify_all();
        Some(out)
    }

    /// Block until the queue is closed and empty, or `cancel` is set.
    ///
    /// Returns `true` on a normal drain.
    pub fn wait_drained_or_cancel(&self, cancel: &AtomicBool) -> bool {
        let mut g = self.inner.lock().unwrap();
        loop {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            if g.closed && g.samples.is_empty() {
                return true;
            }
            let (ng, _timeout) = self
                .changed
                .wait_timeout(g, Duration::from_millis(50))
                .unwrap();
            g = ng;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn capacity_for_falls_back_on_bad_seconds() {
        assert_eq!(capacity_for(48_000, 2, 2.0), 192_000);
        assert_eq!(capacity_for(48_000, 2, 0.0), 192_000);
        assert_eq!(capacity_for(48_000, 2, f32::NAN), 192_000);
        assert_eq!(capacity_for(48_000, 2, f32::INFINITY), 192_000);
    }

    #[test]
    fn nonblocking_pop_on_empty_queue_is_none() {
        let q = SampleQueue::new(2, 16);
        assert!(q.pop(PopStrategy::NonBlocking { max_frames: 4 }).is_none());
    }

    #[test]
    fn nonblocking_pop_takes_whole_frames() {
        let q = SampleQueue::new(2, 64);
        assert!(q.push_blocking(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]));
        let out = q.pop(PopStrategy::NonBlocking { max_frames: 8 }).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(q.len_frames(), 0);
    }

    #[test]
    fn blocking_exact_waits_for_producer() {
        let q = Arc::new(SampleQueue::new(2, 64));
        let consumer = {
            let q = q.clone();
            thread::spawn(move || q.pop(PopStrategy::BlockingExact { frames: 3 }))
        };
        q.push_blocking(&[0.1, 0.2, 0.3, 0.4]);
        q.push_blocking(&[0.5, 0.6]);
        let out = consumer.join().unwrap().unwrap();
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn blocking_exact_returns_none_when_closed_short() {
        let q = SampleQueue::new(2, 64);
        q.push_blocking(&[1.0, 2.0]);
        q.close();
        assert!(q.pop(PopStrategy::BlockingExact { frames: 2 }).is_none());
    }

    #[test]
    fn blocking_up_to_drains_tail_then_ends() {
        let q = SampleQueue::new(2, 64);
        q.push_blocking(&[1.0, 2.0, 3.0, 4.0]);
        q.close();
        let out = q.pop(PopStrategy::BlockingUpTo { max_frames: 8 }).unwrap();
        assert_eq!(out.len(), 4);
        assert!(q.pop(PopStrategy::BlockingUpTo { max_frames: 8 }).is_none());
    }

    #[test]
    fn push_blocks_until_room_then_completes() {
        let q = Arc::new(SampleQueue::new(1, 4));
        let producer = {
            let q = q.clone();
            thread::spawn(move || q.push_blocking(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
        };
        let mut got = Vec::new();
        while got.len() < 6 {
            if let Some(v) = q.pop(PopStrategy::BlockingUpTo { max_frames: 2 }) {
                got.extend(v);
            }
        }
        assert!(producer.join().unwrap());
        assert_eq!(got, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn close_releases_blocked_producer() {
        let q = Arc::new(SampleQueue::new(1, 2));
        q.push_blocking(&[1.0, 2.0]);
        let producer = {
            let q = q.clone();
            thread::spawn(move || q.push_blocking(&[3.0]))
        };
        q.close();
        assert!(!producer.join().unwrap());
    }

    #[test]
    fn flush_discards_buffered_samples() {
        let q = SampleQueue::new(2, 64);
        q.push_blocking(&[1.0, 2.0, 3.0, 4.0]);
        q.flush();
        assert!(q.is_closed());
        assert_eq!(q.len_frames(), 0);
        let cancel = AtomicBool::new(false);
        assert!(q.wait_drained_or_cancel(&cancel));
    }

    #[test]
    fn wait_drained_respects_cancel() {
        let q = SampleQueue::new(2, 64);
        let cancel = AtomicBool::new(true);
        assert!(!q.wait_drained_or_cancel(&cancel));
    }
}
