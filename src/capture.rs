//! This module contains all the link capture logic

// The reader thread does one thing, as fast as possible: hunt for the sync
// byte, grab the three payload bytes behind it, decode and hand the pair to
// the frame channel. Everything else happens on the consumer side.

use std::io::{BufReader, ErrorKind, Read};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::{
    channel::FrameSender,
    error::Result,
    frame::{unpack, PayloadBytes, FRAME_SIZE, PAYLOAD_SIZE},
};

// Largest read handed out by `Paced`, 64 frames
const PACED_CHUNK: usize = 64 * FRAME_SIZE;

/// Counters accumulated over the lifetime of a reader
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct LinkStats {
    /// Frames decoded and published
    pub frames: u64,
    /// Frames whose payload came up short (timeout or end of stream)
    pub short_frames: u64,
    /// Bytes thrown away while hunting for sync
    pub discarded_bytes: u64,
}

pub struct LinkReader<R> {
    transport: BufReader<R>,
    sync: u8,
    sender: FrameSender,
    stop: Arc<AtomicBool>,
    stats: LinkStats,
}

enum Byte {
    Value(u8),
    Timeout,
    Eof,
}

fn is_timeout(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

impl<R: Read> LinkReader<R> {
    pub fn new(transport: R, sync: u8, sender: FrameSender, stop: Arc<AtomicBool>) -> Self {
        Self {
            transport: BufReader::new(transport),
            sync,
            sender,
            stop,
            stats: LinkStats::default(),
        }
    }

    /// Read frames until the stop flag is raised, the stream ends or the consumer goes away.
    ///
    /// Shutdown latency is bounded by the transport's read timeout. Any I/O error
    /// other than a timeout is fatal and returned.
    pub fn run(mut self) -> Result<LinkStats> {
        info!(sync = self.sync, "Link reader started");
        while !self.stop.load(Ordering::Relaxed) {
            match self.next_byte()? {
                Byte::Value(b) if b == self.sync => {}
                Byte::Value(_) => {
                    self.stats.discarded_bytes += 1;
                    continue;
                }
                Byte::Timeout => continue,
                Byte::Eof => {
                    info!("Transport reached end of stream");
                    break;
                }
            }
            let payload = match self.read_payload()? {
                Some(payload) => payload,
                None => {
                    // Lossy by design, we just go back to hunting for sync
                    trace!("Dropping short frame");
                    self.stats.short_frames += 1;
                    continue;
                }
            };
            if self.sender.send(unpack(&payload)).is_err() {
                debug!("Frame channel closed, stopping reader");
                break;
            }
            self.stats.frames += 1;
        }
        info!(
            frames = self.stats.frames,
            short_frames = self.stats.short_frames,
            discarded_bytes = self.stats.discarded_bytes,
            "Link reader finished"
        );
        Ok(self.stats)
    }

    fn next_byte(&mut self) -> Result<Byte> {
        let mut buf = [0u8; 1];
        loop {
            match self.transport.read(&mut buf) {
                Ok(0) => return Ok(Byte::Eof),
                Ok(_) => return Ok(Byte::Value(buf[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if is_timeout(e.kind()) => return Ok(Byte::Timeout),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read exactly the payload, or `None` if the link timed out or closed partway
    fn read_payload(&mut self) -> Result<Option<PayloadBytes>> {
        let mut payload = [0u8; PAYLOAD_SIZE];
        let mut filled = 0;
        while filled < PAYLOAD_SIZE {
            match self.transport.read(&mut payload[filled..]) {
                Ok(0) => return Ok(None),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(e.kind()) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Some(payload))
    }
}

/// Throttles a recorded stream to the rate the hardware would deliver it at,
/// so a replay looks like a live link to the consumers.
pub struct Paced<R> {
    inner: R,
    bytes_per_sec: f64,
    start: Option<Instant>,
    sent: u64,
}

impl<R> Paced<R> {
    /// Deliver `inner` at `frames_per_sec` frames per second
    pub fn new(inner: R, frames_per_sec: f64) -> Self {
        Self {
            inner,
            bytes_per_sec: frames_per_sec * FRAME_SIZE as f64,
            start: None,
            sent: 0,
        }
    }
}

impl<R: Read> Read for Paced<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let start = *self.start.get_or_insert_with(Instant::now);
        let due = start + Duration::from_secs_f64(self.sent as f64 / self.bytes_per_sec);
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
        let len = buf.len().min(PACED_CHUNK);
        let n = self.inner.read(&mut buf[..len])?;
        self.sent += n as u64;
        Ok(n)
    }
}
