//! This module is responsible for exfilling capture results to the offline plotting tools

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};

use crate::response::SpectrumResult;

/// UTC timestamp safe to use in file names on any OS, e.g. `2024-05-01-13-37-00`
pub fn capture_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d-%H-%M-%S").to_string()
}

/// Write `Frequency_Hz,Gain_dB` rows for the non-negative half of the spectrum
pub fn write_response_csv<W: Write>(res: &SpectrumResult, mut out: W) -> std::io::Result<()> {
    writeln!(out, "Frequency_Hz,Gain_dB")?;
    for (freq, gain) in res.frequencies.iter().zip(&res.gain_db) {
        writeln!(out, "{freq},{gain:.4}")?;
    }
    out.flush()
}

/// Write the captured block in the same layout as the simulator dumps
pub fn write_samples_csv<W: Write>(res: &SpectrumResult, mut out: W) -> std::io::Result<()> {
    writeln!(out, "Sample,Sample_Input,Filtered_Output")?;
    for (i, pair) in res.samples.iter().enumerate() {
        writeln!(out, "{},{},{}", i, pair.unfiltered, pair.filtered)?;
    }
    out.flush()
}

/// Dump both CSVs for `res` into `dir`, named after the capture time. Returns the paths written.
pub fn export(res: &SpectrumResult, dir: &Path) -> std::io::Result<[PathBuf; 2]> {
    let stamp = capture_timestamp(&res.captured_at);
    let response_path = dir.join(format!("freq_response-{stamp}.csv"));
    let samples_path = dir.join(format!("capture-{stamp}.csv"));
    write_response_csv(res, BufWriter::new(File::create(&response_path)?))?;
    write_samples_csv(res, BufWriter::new(File::create(&samples_path)?))?;
    Ok([response_path, samples_path])
}
