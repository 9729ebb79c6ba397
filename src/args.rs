//! Argument parsing for running from the command line

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap_verbosity_flag::InfoLevel;

use crate::{
    channel::OverflowPolicy,
    error::{Error, Result},
    spectrum::CaptureConfig,
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Serial device the FPGA is attached to
    #[clap(short, long, default_value = "/dev/ttyUSB0")]
    pub port: String,
    /// Serial baud rate
    #[clap(short, long, default_value_t = 1_000_000)]
    pub baud: u32,
    /// Read a recorded raw byte dump instead of the serial port (takes precedence over --port)
    #[clap(long)]
    pub replay: Option<PathBuf>,
    /// List the available serial ports and exit
    #[clap(long)]
    pub list_ports: bool,
    /// Sample rate of the hardware in Hz
    #[clap(short, long, default_value_t = 20_000.0)]
    pub sample_rate: f64,
    /// Duration of the rolling time-domain window in seconds
    #[clap(short, long, default_value_t = 0.005)]
    pub window: f64,
    /// Samples per spectral capture
    #[clap(short = 'm', long, default_value_t = 4096)]
    pub fft_size: usize,
    /// Hexadecimal (sans leading 0x) frame sync byte
    #[clap(long, default_value = "AA", value_parser = valid_sync_byte)]
    pub sync_byte: u8,
    /// Frame channel capacity
    #[clap(short, long, default_value_t = 65536)]
    pub capacity: usize,
    /// What to do when the frame channel is full
    #[clap(long, value_enum, default_value = "drop-oldest")]
    pub overflow: OverflowPolicy,
    /// Serial read timeout in milliseconds
    #[clap(long, default_value_t = 1000)]
    pub read_timeout_ms: u64,
    /// How long a capture waits for each sample, in milliseconds
    #[clap(long, default_value_t = 1000)]
    pub capture_timeout_ms: u64,
    /// Display refresh period in milliseconds
    #[clap(long, default_value_t = 30)]
    pub tick_ms: u64,
    /// Where to write capture CSVs
    #[clap(short, long, default_value = ".")]
    pub out_dir: PathBuf,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<InfoLevel>,
}

impl Args {
    /// Check the combinations clap can't
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::Config(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.window_len() < 1 {
            return Err(Error::Config(format!(
                "a {}s window holds no samples at {} Hz",
                self.window, self.sample_rate
            )));
        }
        if self.fft_size < 2 {
            return Err(Error::Config("FFT size must be at least 2".to_owned()));
        }
        if self.capacity == 0 {
            return Err(Error::Config("channel capacity must be non-zero".to_owned()));
        }
        if self.read_timeout_ms == 0 || self.capture_timeout_ms == 0 || self.tick_ms == 0 {
            return Err(Error::Config("timeouts and tick period must be non-zero".to_owned()));
        }
        Ok(())
    }

    /// Samples in the rolling window (N)
    pub fn window_len(&self) -> usize {
        (self.sample_rate * self.window).round() as usize
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            fft_size: self.fft_size,
            sample_rate: self.sample_rate,
            item_timeout: Duration::from_millis(self.capture_timeout_ms),
        }
    }
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

fn valid_sync_byte(s: &str) -> Result<u8, String> {
    u8::from_str_radix(s, 16).map_err(|_| "Invalid hex literal".to_string())
}
