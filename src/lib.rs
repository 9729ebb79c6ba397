//! Live acquisition and frequency-response analysis for an FPGA FIR filter
//! streaming `(unfiltered, filtered)` sample pairs over a serial link.

pub mod args;
pub mod capture;
pub mod channel;
pub mod error;
pub mod exfil;
pub mod frame;
pub mod monitoring;
pub mod response;
pub mod rolling;
pub mod spectrum;

pub use error::{CaptureError, Error};
pub use frame::SamplePair;

/// Messages that drive the pipeline from outside (keyboard, signals, ...)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start a spectral capture
    CaptureSpectrum,
    Quit,
}

impl Command {
    /// Map an operator keystroke to a command
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim() {
            "f" | "F" => Some(Command::CaptureSpectrum),
            "q" | "Q" => Some(Command::Quit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        assert_eq!(Command::from_key("f\n"), Some(Command::CaptureSpectrum));
        assert_eq!(Command::from_key(" q "), Some(Command::Quit));
        assert_eq!(Command::from_key("x"), None);
    }
}
