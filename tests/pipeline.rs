//! Reader thread -> frame channel -> live view / spectral capture, on an in-memory link

use std::io::{self, Cursor, Read};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use fir_scope::{
    capture::LinkReader,
    channel::{frame_channel, OverflowPolicy},
    frame::{encode_frame, SamplePair, SYNC_BYTE},
    monitoring::RATE_INTERVAL,
    rolling::LiveView,
    spectrum::{CaptureConfig, CaptureState, SpectralCapture},
    CaptureError,
};

/// A link that streams a fixed byte sequence, then times out forever like an idle serial port
struct IdleAfter {
    inner: Cursor<Vec<u8>>,
}

impl Read for IdleAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf)? {
            0 => {
                thread::sleep(Duration::from_millis(5));
                Err(io::Error::new(io::ErrorKind::TimedOut, "idle"))
            }
            n => Ok(n),
        }
    }
}

#[test]
fn replayed_stream_reaches_live_view() {
    let mut bytes = vec![0x13, 0x37];
    bytes.extend([0xAA, 0x00, 0x00, 0x00]);
    bytes.extend([0xAA, 0xFF, 0x0F, 0xF0]);
    for i in 0..200i16 {
        bytes.extend(encode_frame(SamplePair::new(i, -i), SYNC_BYTE));
    }

    let (tx, mut rx) = frame_channel(1024, OverflowPolicy::Block);
    let stop = Arc::new(AtomicBool::new(false));
    let reader = LinkReader::new(Cursor::new(bytes), SYNC_BYTE, tx, stop);
    let stats = thread::spawn(move || reader.run()).join().unwrap().unwrap();
    assert_eq!(stats.frames, 202);
    assert_eq!(stats.discarded_bytes, 2);

    let t0 = Instant::now();
    let mut view = LiveView::new(100, RATE_INTERVAL, t0);
    let tick = view.poll(&mut rx, t0);
    assert_eq!(tick.drained, 202);
    assert_eq!(tick.depth, 0);
    let window: Vec<_> = view.window().iter().collect();
    let expected: Vec<_> = (100..200i16).map(|i| SamplePair::new(i, -i)).collect();
    assert_eq!(window, expected);
}

#[test]
fn first_frames_decode_as_documented() {
    let bytes = vec![0xAA, 0x00, 0x00, 0x00, 0xAA, 0xFF, 0x0F, 0xF0];
    let (tx, mut rx) = frame_channel(8, OverflowPolicy::DropOldest);
    let stop = Arc::new(AtomicBool::new(false));
    LinkReader::new(Cursor::new(bytes), SYNC_BYTE, tx, stop)
        .run()
        .unwrap();
    let got: Vec<_> = rx.try_iter_available().collect();
    assert_eq!(got, vec![SamplePair::new(0, 0), SamplePair::new(-1, 15)]);
}

#[test]
fn capture_then_resume_live_view() {
    const M: usize = 256;
    let bytes: Vec<u8> = (0..4 * M as i16)
        .flat_map(|i| encode_frame(SamplePair::new(i % 100, i % 50), SYNC_BYTE))
        .collect();

    let (tx, mut rx) = frame_channel(8 * M, OverflowPolicy::Block);
    let stop = Arc::new(AtomicBool::new(false));
    let reader = LinkReader::new(IdleAfter { inner: Cursor::new(bytes) }, SYNC_BYTE, tx, stop.clone());
    let handle = thread::spawn(move || reader.run());

    let mut capture = SpectralCapture::new(CaptureConfig {
        fft_size: M,
        sample_rate: 20_000.0,
        item_timeout: Duration::from_millis(500),
    });
    // Whether the block came from fresh or already-queued data depends on
    // timing, either way the link is idle afterwards so a second capture times out
    match capture.trigger(&mut rx) {
        Ok(res) => {
            assert_eq!(res.samples.len(), M);
            assert_eq!(res.gain_db.len(), M / 2);
        }
        Err(e) => assert!(matches!(e, CaptureError::Timeout { .. })),
    }
    assert_eq!(capture.state(), CaptureState::Idle);

    thread::sleep(Duration::from_millis(100));
    assert!(matches!(
        capture.trigger(&mut rx),
        Err(CaptureError::Timeout { collected: 0, .. })
    ));

    // The live view picks the channel back up once the capture is done
    let t0 = Instant::now();
    let mut view = LiveView::new(16, RATE_INTERVAL, t0);
    let tick = view.poll(&mut rx, t0);
    assert_eq!(tick.depth, 0);

    stop.store(true, Ordering::Relaxed);
    let stats = handle.join().unwrap().unwrap();
    assert_eq!(stats.frames, 4 * M as u64);
}
