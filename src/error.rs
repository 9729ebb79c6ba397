//! Error types for the acquisition pipeline

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to open serial port '{port}': {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Transport read failed: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Ways a spectral capture can end without a result. Both are recoverable, the
/// capture goes back to idle and may be triggered again.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Timed out after {waited:?} waiting for data ({collected}/{expected} samples). Is the FPGA sending?")]
    Timeout {
        collected: usize,
        expected: usize,
        waited: Duration,
    },

    #[error("Link closed after {collected}/{expected} samples")]
    Disconnected { collected: usize, expected: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
