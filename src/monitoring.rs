//! In this module, we implement the runtime stats for the live view.
//! Rates are sampled, not smoothed: a running count is turned into a rate once
//! per interval and then reset, and the last snapshot is reported in between.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::frame::FRAME_SIZE;

/// Default recompute interval
pub const RATE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct RateSnapshot {
    pub messages_per_sec: f64,
    /// Raw link throughput in KB/s (sync byte included)
    pub bytes_per_sec: f64,
}

impl RateSnapshot {
    fn from_count(count: u64, elapsed: Duration) -> Self {
        let messages_per_sec = count as f64 / elapsed.as_secs_f64();
        Self {
            messages_per_sec,
            bytes_per_sec: messages_per_sec * FRAME_SIZE as f64 / 1024.0,
        }
    }
}

#[derive(Debug)]
pub struct RateMeter {
    interval: Duration,
    count: u64,
    last_reset: Instant,
    snapshot: RateSnapshot,
}

impl RateMeter {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            count: 0,
            last_reset: now,
            snapshot: RateSnapshot::default(),
        }
    }

    /// Account for `frames` new frames seen at `now`.
    ///
    /// Returns `Some` with the fresh snapshot if the interval has elapsed, in which case
    /// the count starts over. Empty batches still count towards the interval, so a
    /// stalled link reads zero instead of holding its last rate.
    pub fn record(&mut self, frames: usize, now: Instant) -> Option<RateSnapshot> {
        self.count += frames as u64;
        let elapsed = now.saturating_duration_since(self.last_reset);
        if elapsed <= self.interval {
            return None;
        }
        self.snapshot = RateSnapshot::from_count(self.count, elapsed);
        trace!(count = self.count, ?elapsed, "Rate recomputed");
        self.count = 0;
        self.last_reset = now;
        Some(self.snapshot)
    }

    /// The most recently computed rates
    pub fn snapshot(&self) -> RateSnapshot {
        self.snapshot
    }
}
