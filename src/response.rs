//! Empirical frequency response of the hardware filter.
//!
//! Both streams of a capture block are FFT'd and the gain of every bin is the
//! ratio of the filtered magnitude to the unfiltered one, in dB. Only the
//! non-negative half of the spectrum is kept.

use chrono::{DateTime, Utc};
use rustfft::{num_complex::Complex, FftPlanner};

use crate::frame::SamplePair;

/// Keeps the gain finite where a bin is empty. Floors the gain at -200 dB.
pub const EPSILON: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct SpectrumResult {
    /// The captured time-domain block
    pub samples: Vec<SamplePair>,
    pub unfiltered_fft: Vec<Complex<f64>>,
    pub filtered_fft: Vec<Complex<f64>>,
    /// Bin centers in Hz, `len() == samples.len() / 2`
    pub frequencies: Vec<f64>,
    /// Gain per bin in dB, same length as `frequencies`
    pub gain_db: Vec<f64>,
    pub sample_rate: f64,
    pub captured_at: DateTime<Utc>,
}

impl SpectrumResult {
    /// Frequency of the first bin past DC where the gain falls below `threshold_db`
    pub fn corner_frequency(&self, threshold_db: f64) -> Option<f64> {
        self.gain_db
            .iter()
            .zip(&self.frequencies)
            .skip(1)
            .find(|(gain, _)| **gain < threshold_db)
            .map(|(_, freq)| *freq)
    }

    /// Width of one frequency bin in Hz
    pub fn resolution(&self) -> f64 {
        self.sample_rate / self.samples.len() as f64
    }
}

fn to_complex(samples: impl Iterator<Item = i16>) -> Vec<Complex<f64>> {
    samples.map(|s| Complex::new(s as f64, 0.0)).collect()
}

/// Per-bin gain in dB of `filtered` relative to `unfiltered`
pub fn gain_db(unfiltered: &[Complex<f64>], filtered: &[Complex<f64>]) -> Vec<f64> {
    unfiltered
        .iter()
        .zip(filtered)
        .map(|(u, f)| {
            let gain = f.norm() / (u.norm() + EPSILON);
            20.0 * (gain + EPSILON).log10()
        })
        .collect()
}

/// Compute the frequency response from a block of captured pairs
pub fn frequency_response(samples: Vec<SamplePair>, sample_rate: f64) -> SpectrumResult {
    let n = samples.len();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);

    let mut unfiltered_fft = to_complex(samples.iter().map(|p| p.unfiltered));
    let mut filtered_fft = to_complex(samples.iter().map(|p| p.filtered));
    fft.process(&mut unfiltered_fft);
    fft.process(&mut filtered_fft);

    let half = n / 2;
    let mut gains = gain_db(&unfiltered_fft, &filtered_fft);
    gains.truncate(half);
    let frequencies = (0..half)
        .map(|k| k as f64 * sample_rate / n as f64)
        .collect();

    SpectrumResult {
        samples,
        unfiltered_fft,
        filtered_fft,
        frequencies,
        gain_db: gains,
        sample_rate,
        captured_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const N: usize = 64;
    const RATE: f64 = 20_000.0;

    #[test]
    fn test_identical_tone_is_unity_at_its_bin() {
        // A cosine at exactly N/4: [1, 0, -1, 0, ...]
        let bin = N / 4;
        let tone = [1i16, 0, -1, 0];
        let samples: Vec<_> = (0..N)
            .map(|i| SamplePair::new(tone[i % 4], tone[i % 4]))
            .collect();
        let res = frequency_response(samples, RATE);

        assert_eq!(res.gain_db.len(), N / 2);
        assert_eq!(res.frequencies.len(), N / 2);
        assert!(res.gain_db[bin].abs() < 0.01, "gain {}", res.gain_db[bin]);
        for (k, gain) in res.gain_db.iter().enumerate() {
            if k != bin {
                assert!(*gain < -40.0, "bin {} has gain {}", k, gain);
            }
        }
    }

    #[test]
    fn test_halved_output() {
        let samples: Vec<_> = (0..N)
            .map(|i| {
                let x = (2.0 * std::f64::consts::PI * 5.0 * i as f64 / N as f64).sin();
                SamplePair::new((x * 1000.0).round() as i16, (x * 500.0).round() as i16)
            })
            .collect();
        let res = frequency_response(samples, RATE);
        // -6.02 dB, give or take rounding
        assert!((res.gain_db[5] + 6.02).abs() < 0.1, "gain {}", res.gain_db[5]);
    }

    #[test]
    fn test_frequency_axis() {
        let res = frequency_response(vec![SamplePair::default(); N], RATE);
        assert_eq!(res.frequencies[0], 0.0);
        assert_eq!(res.frequencies[1], RATE / N as f64);
        assert_eq!(*res.frequencies.last().unwrap(), RATE / 2.0 - RATE / N as f64);
        assert_eq!(res.resolution(), RATE / N as f64);
        // Silence in, silence out: floored, not NaN
        assert!(res.gain_db.iter().all(|g| (*g + 200.0).abs() < 1e-9));
    }

    #[test]
    fn test_corner_frequency() {
        let mut res = frequency_response(vec![SamplePair::default(); 8], 8.0);
        res.gain_db = vec![-100.0, 0.0, -1.0, -5.0];
        assert_eq!(res.corner_frequency(-3.0), Some(3.0));
        assert_eq!(res.corner_frequency(-10.0), None);
    }
}
