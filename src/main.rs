use anyhow::{bail, Context};
use clap::Parser;
use crossbeam_channel::{select, unbounded, Sender};
use fir_scope::{
    args::{convert_filter, Args},
    capture::{LinkReader, LinkStats, Paced},
    channel::{frame_channel, FrameReceiver},
    exfil,
    monitoring::RATE_INTERVAL,
    rolling::{LiveView, Tick},
    spectrum::SpectralCapture,
    Command, Error,
};
use std::{
    fs::File,
    io::Read,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Instant,
};
use tracing::{error, info, warn};

/// Threshold for the reported corner frequency
const CORNER_DB: f64 = -3.0;

fn list_ports() -> anyhow::Result<()> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}\t{:?}", port.port_name, port.port_type);
    }
    Ok(())
}

fn open_transport(args: &Args) -> Result<Box<dyn Read + Send>, Error> {
    if let Some(path) = &args.replay {
        info!(path = %path.display(), rate = args.sample_rate, "Replaying recorded stream");
        return Ok(Box::new(Paced::new(File::open(path)?, args.sample_rate)));
    }
    let port = serialport::new(args.port.as_str(), args.baud)
        .timeout(args.read_timeout())
        .open()
        .map_err(|source| Error::Open {
            port: args.port.clone(),
            source,
        })?;
    info!(port = %args.port, baud = args.baud, "Serial port open");
    Ok(Box::new(port))
}

/// Forward keystrokes (one per line) from stdin as commands
fn spawn_keyboard(commands: Sender<Command>) -> std::io::Result<()> {
    thread::Builder::new()
        .name("keyboard".to_owned())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                match Command::from_key(&line) {
                    Some(cmd) => {
                        if commands.send(cmd).is_err() {
                            break;
                        }
                    }
                    None => warn!("Unknown command {:?}, use 'f' or 'q'", line.trim()),
                }
            }
        })?;
    Ok(())
}

fn peak_to_peak(samples: impl Iterator<Item = i16>) -> i16 {
    let (lo, hi) = samples.fold((i16::MAX, i16::MIN), |(lo, hi), s| (lo.min(s), hi.max(s)));
    hi.saturating_sub(lo)
}

/// Status line for the live view
fn render(view: &LiveView, tick: &Tick) {
    let window = view.window();
    let latest = window.latest().unwrap_or_default();
    info!(
        "Queue Size: {} | Msg Rate: {:.0} Hz | Data Rate: {:.2} KB/s | Dropped: {} | Last: ({}, {}) | p-p: ({}, {})",
        tick.depth,
        tick.rates.messages_per_sec,
        tick.rates.bytes_per_sec,
        tick.overflowed,
        latest.unfiltered,
        latest.filtered,
        peak_to_peak(window.unfiltered()),
        peak_to_peak(window.filtered()),
    );
}

fn run_capture(capture: &mut SpectralCapture, receiver: &mut FrameReceiver, out_dir: &Path) {
    info!("Capturing data for frequency response...");
    // Failures are already logged by the capture itself
    let Ok(res) = capture.trigger(receiver) else {
        return;
    };
    match res.corner_frequency(CORNER_DB) {
        Some(freq) => info!(
            "Measured {CORNER_DB} dB corner at {:.1} Hz (bin width {:.2} Hz)",
            freq,
            res.resolution()
        ),
        None => info!("Gain stays above {CORNER_DB} dB up to Nyquist"),
    }
    match exfil::export(&res, out_dir) {
        Ok([response, samples]) => info!(
            "Wrote {} and {}",
            response.display(),
            samples.display()
        ),
        Err(e) => error!("Failed to write capture results: {e}"),
    }
}

fn join_reader(handle: JoinHandle<Result<LinkStats, Error>>) -> anyhow::Result<LinkStats> {
    let stats = match handle.join() {
        Ok(res) => res.context("Link reader failed")?,
        Err(_) => bail!("Link reader panicked"),
    };
    info!(
        "Received {} frames, dropped {} short frames, skipped {} bytes hunting for sync",
        stats.frames, stats.short_frames, stats.discarded_bytes
    );
    Ok(stats)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(convert_filter(args.verbose.log_level_filter()))
        .init();

    if args.list_ports {
        return list_ports();
    }
    args.validate()?;

    // Open the link before anything else, nothing runs without it
    let transport = open_transport(&args).context("Failed to open transport")?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .context("Failed to install Ctrl-C handler")?;
    }

    // Setup the link reader on its own thread
    let (sender, mut receiver) = frame_channel(args.capacity, args.overflow);
    let reader = LinkReader::new(transport, args.sync_byte, sender, stop.clone());
    let reader_handle = thread::Builder::new()
        .name("link-reader".to_owned())
        .spawn(move || reader.run())?;
    let mut reader_handle = Some(reader_handle);

    // Keep a sender here so a closed stdin doesn't disconnect the command channel
    let (cmd_tx, commands) = unbounded();
    spawn_keyboard(cmd_tx.clone())?;
    info!("Press 'f' + Enter for the frequency response, 'q' + Enter to quit");

    let mut view = LiveView::new(args.window_len(), RATE_INTERVAL, Instant::now());
    let mut capture = SpectralCapture::new(args.capture_config());
    let ticker = crossbeam_channel::tick(args.tick());

    let mut running = true;
    while running && !stop.load(Ordering::Relaxed) {
        select! {
            recv(ticker) -> now => {
                let tick = view.poll(&mut receiver, now.unwrap_or_else(|_| Instant::now()));
                if tick.rates_updated {
                    render(&view, &tick);
                }
                if reader_handle.as_ref().map_or(false, JoinHandle::is_finished) {
                    // A clean end (replay done) keeps the view up until the operator quits,
                    // a transport error ends the session
                    if let Some(handle) = reader_handle.take() {
                        join_reader(handle)?;
                        info!("Link closed, press 'q' + Enter to quit");
                    }
                }
            }
            recv(commands) -> cmd => match cmd {
                Ok(Command::CaptureSpectrum) => run_capture(&mut capture, &mut receiver, &args.out_dir),
                Ok(Command::Quit) | Err(_) => running = false,
            }
        }
    }

    // Shut down the reader, it notices within one read timeout
    stop.store(true, Ordering::Relaxed);
    drop(receiver);
    if let Some(handle) = reader_handle {
        join_reader(handle)?;
    }
    Ok(())
}
