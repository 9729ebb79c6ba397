//! One-shot spectral capture.
//!
//! A capture takes over the frame channel: it throws away whatever is queued,
//! then blocks until exactly `fft_size` fresh pairs have arrived and computes
//! the frequency response from them. Because it needs the receiver by `&mut`,
//! the live view can't be polling at the same time.

use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info, warn};

use crate::{
    channel::FrameReceiver,
    error::CaptureError,
    response::{frequency_response, SpectrumResult},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Draining,
    Accumulating {
        collected: usize,
    },
    Computing,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureConfig {
    /// Pairs per capture block (M)
    pub fft_size: usize,
    pub sample_rate: f64,
    /// Longest we'll wait for any single pair
    pub item_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fft_size: 4096,
            sample_rate: 20_000.0,
            item_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
pub struct SpectralCapture {
    config: CaptureConfig,
    state: CaptureState,
}

impl SpectralCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            state: CaptureState::Idle,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    fn transition(&mut self, next: CaptureState) {
        debug!(from = ?self.state, to = ?next, "Capture state change");
        self.state = next;
    }

    /// Run a full capture. Blocks until `fft_size` pairs are in or a wait times out.
    /// The machine is back in [`CaptureState::Idle`] when this returns, either way.
    pub fn trigger(&mut self, rx: &mut FrameReceiver) -> Result<SpectrumResult, CaptureError> {
        let res = self.capture(rx);
        if let Err(e) = &res {
            warn!("Capture failed: {e}");
        }
        self.transition(CaptureState::Idle);
        res
    }

    fn capture(&mut self, rx: &mut FrameReceiver) -> Result<SpectrumResult, CaptureError> {
        let expected = self.config.fft_size;

        self.transition(CaptureState::Draining);
        let stale = rx.drain();
        debug!(stale, "Discarded queued pairs");

        self.transition(CaptureState::Accumulating { collected: 0 });
        info!("Capturing {expected} samples...");
        let mut samples = Vec::with_capacity(expected);
        while samples.len() < expected {
            match rx.recv_timeout(self.config.item_timeout) {
                Ok(pair) => samples.push(pair),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(CaptureError::Timeout {
                        collected: samples.len(),
                        expected,
                        waited: self.config.item_timeout,
                    })
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CaptureError::Disconnected {
                        collected: samples.len(),
                        expected,
                    })
                }
            }
            self.state = CaptureState::Accumulating {
                collected: samples.len(),
            };
        }
        info!("Capture complete");

        self.transition(CaptureState::Computing);
        Ok(frequency_response(samples, self.config.sample_rate))
    }
}
