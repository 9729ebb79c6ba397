//! Continuous consumer: a fixed window of the most recent samples for display,
//! fed by polling the frame channel on a fixed cadence.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::{
    channel::FrameReceiver,
    frame::SamplePair,
    monitoring::{RateMeter, RateSnapshot},
};

/// Sliding window of sample pairs. Always holds exactly `len()` entries, oldest first.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    unfiltered: VecDeque<i16>,
    filtered: VecDeque<i16>,
}

impl RollingBuffer {
    /// A window of `len` zeroed pairs
    pub fn new(len: usize) -> Self {
        Self {
            unfiltered: VecDeque::from(vec![0; len]),
            filtered: VecDeque::from(vec![0; len]),
        }
    }

    pub fn len(&self) -> usize {
        self.unfiltered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unfiltered.is_empty()
    }

    /// Append `pair`, evicting the oldest
    pub fn push(&mut self, pair: SamplePair) {
        if self.is_empty() {
            return;
        }
        self.unfiltered.pop_front();
        self.unfiltered.push_back(pair.unfiltered);
        self.filtered.pop_front();
        self.filtered.push_back(pair.filtered);
    }

    pub fn unfiltered(&self) -> impl ExactSizeIterator<Item = i16> + '_ {
        self.unfiltered.iter().copied()
    }

    pub fn filtered(&self) -> impl ExactSizeIterator<Item = i16> + '_ {
        self.filtered.iter().copied()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = SamplePair> + '_ {
        self.unfiltered
            .iter()
            .zip(self.filtered.iter())
            .map(|(&u, &f)| SamplePair::new(u, f))
    }

    pub fn latest(&self) -> Option<SamplePair> {
        Some(SamplePair::new(
            *self.unfiltered.back()?,
            *self.filtered.back()?,
        ))
    }
}

/// What one poll of the live view produced
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tick {
    /// Pairs pulled off the channel this poll
    pub drained: usize,
    pub rates: RateSnapshot,
    /// `true` if `rates` was recomputed on this poll
    pub rates_updated: bool,
    /// Channel depth after draining
    pub depth: usize,
    /// Total pairs evicted by the producer so far
    pub overflowed: u64,
}

/// Owns the rolling window and the rate meter. Only ever touched by the display loop.
#[derive(Debug)]
pub struct LiveView {
    window: RollingBuffer,
    meter: RateMeter,
}

impl LiveView {
    pub fn new(window_len: usize, rate_interval: Duration, now: Instant) -> Self {
        Self {
            window: RollingBuffer::new(window_len),
            meter: RateMeter::new(rate_interval, now),
        }
    }

    /// Drain whatever is queued into the window without blocking. Zero pairs is fine.
    pub fn poll(&mut self, rx: &mut FrameReceiver, now: Instant) -> Tick {
        let mut drained = 0;
        for pair in rx.try_iter_available() {
            self.window.push(pair);
            drained += 1;
        }
        let rates_updated = self.meter.record(drained, now).is_some();
        let tick = Tick {
            drained,
            rates: self.meter.snapshot(),
            rates_updated,
            depth: rx.len(),
            overflowed: rx.dropped(),
        };
        trace!(?tick, "Live view polled");
        tick
    }

    pub fn window(&self) -> &RollingBuffer {
        &self.window
    }
}
