//! The hand-off between the link reader thread and whoever is consuming samples.
//!
//! This is a bounded FIFO with a single producer. There is exactly one
//! [`FrameReceiver`] and it can't be cloned, so consumers take it by `&mut`.
//! That way the live view and a spectral capture can never pull from the
//! queue at the same time.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendError, Sender, TrySendError,
};

use crate::frame::SamplePair;

/// What the producer does when the queue is full
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OverflowPolicy {
    /// Evict the oldest queued pair to make room (keeps the display live)
    #[default]
    DropOldest,
    /// Wait for the consumer to make room (never loses data, stalls the link)
    Block,
}

/// Create a frame channel holding at most `capacity` pairs.
///
/// # Panics
/// If `capacity` is zero. A rendezvous channel can't be drained by a polling consumer.
pub fn frame_channel(capacity: usize, policy: OverflowPolicy) -> (FrameSender, FrameReceiver) {
    assert!(capacity > 0, "Frame channel capacity must be non-zero");
    let (tx, rx) = bounded(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let evict = match policy {
        OverflowPolicy::DropOldest => Some(rx.clone()),
        OverflowPolicy::Block => None,
    };
    (
        FrameSender {
            tx,
            evict,
            dropped: dropped.clone(),
        },
        FrameReceiver { rx, dropped },
    )
}

/// Producer half, owned by the link reader
pub struct FrameSender {
    tx: Sender<SamplePair>,
    // Only present for drop-oldest, so the producer can pop from the head
    evict: Option<Receiver<SamplePair>>,
    // Shared with the one `FrameReceiver`, doubles as its liveness handle
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    /// Publish a pair. Only fails once the receiver is gone.
    pub fn send(&self, pair: SamplePair) -> Result<(), SendError<SamplePair>> {
        let evict = match &self.evict {
            Some(evict) => evict,
            None => return self.tx.send(pair),
        };
        if self.is_disconnected() {
            return Err(SendError(pair));
        }
        let mut pair = pair;
        loop {
            match self.tx.try_send(pair) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(p)) => {
                    // The consumer may have emptied the queue in between, that's fine
                    if evict.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    pair = p;
                }
                Err(TrySendError::Disconnected(p)) => return Err(SendError(p)),
            }
        }
    }

    /// Whether the consumer side has been dropped
    pub fn is_disconnected(&self) -> bool {
        // The eviction handle keeps crossbeam's side connected, so go by the counter's owners
        Arc::strong_count(&self.dropped) <= 1
    }
}

/// Consumer half. There is only ever one of these.
pub struct FrameReceiver {
    rx: Receiver<SamplePair>,
    dropped: Arc<AtomicU64>,
}

impl FrameReceiver {
    /// Number of queued pairs
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.rx.capacity()
    }

    /// Pairs the producer evicted because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Pop everything that is queued right now without blocking.
    ///
    /// The iterator stops after the depth observed at the call, so a producer
    /// that outpaces us can't keep it going forever.
    pub fn try_iter_available(&mut self) -> impl Iterator<Item = SamplePair> + '_ {
        let available = self.rx.len();
        self.rx.try_iter().take(available)
    }

    /// Throw away everything currently queued, returning how many pairs were discarded.
    /// Never blocks, and is a no-op on an empty queue.
    pub fn drain(&mut self) -> usize {
        self.try_iter_available().count()
    }

    /// Block for the next pair, for at most `timeout`
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<SamplePair, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn pair(i: i16) -> SamplePair {
        SamplePair::new(i, -i)
    }

    #[test]
    fn test_fifo_order() {
        let (tx, mut rx) = frame_channel(16, OverflowPolicy::Block);
        for i in 0..10 {
            tx.send(pair(i)).unwrap();
        }
        let got: Vec<_> = rx.try_iter_available().collect();
        assert_eq!(got, (0..10).map(pair).collect::<Vec<_>>());
        assert!(rx.is_empty());
    }

    #[test]
    fn test_drop_oldest() {
        let (tx, mut rx) = frame_channel(4, OverflowPolicy::DropOldest);
        for i in 0..10 {
            tx.send(pair(i)).unwrap();
        }
        assert_eq!(rx.len(), 4);
        assert_eq!(rx.dropped(), 6);
        let got: Vec<_> = rx.try_iter_available().collect();
        assert_eq!(got, (6..10).map(pair).collect::<Vec<_>>());
    }

    #[test]
    fn test_drain_is_idempotent() {
        let (tx, mut rx) = frame_channel(8, OverflowPolicy::DropOldest);
        for i in 0..5 {
            tx.send(pair(i)).unwrap();
        }
        assert_eq!(rx.drain(), 5);
        assert_eq!(rx.drain(), 0);
        assert_eq!(rx.drain(), 0);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_recv_timeout() {
        let (tx, mut rx) = frame_channel(8, OverflowPolicy::Block);
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Timeout)
        );
        tx.send(pair(3)).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)), Ok(pair(3)));
        drop(tx);
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn test_disconnect_detection() {
        for policy in [OverflowPolicy::DropOldest, OverflowPolicy::Block] {
            let (tx, rx) = frame_channel(8, policy);
            assert!(!tx.is_disconnected());
            drop(rx);
            assert!(tx.is_disconnected());
            assert!(tx.send(pair(1)).is_err());
        }
    }

    #[test]
    fn test_block_waits_for_room() {
        let (tx, mut rx) = frame_channel(2, OverflowPolicy::Block);
        tx.send(pair(0)).unwrap();
        tx.send(pair(1)).unwrap();
        let producer = thread::spawn(move || tx.send(pair(2)));

        thread::sleep(Duration::from_millis(100));
        assert!(!producer.is_finished());
        assert_eq!(rx.len(), 2);
        assert_eq!(rx.dropped(), 0);

        assert_eq!(rx.recv_timeout(Duration::from_millis(10)), Ok(pair(0)));
        producer.join().unwrap().unwrap();
        let rest: Vec<_> = rx.try_iter_available().collect();
        assert_eq!(rest, vec![pair(1), pair(2)]);
    }

    #[test]
    #[should_panic(expected = "capacity must be non-zero")]
    fn test_zero_capacity_rejected() {
        let _ = frame_channel(0, OverflowPolicy::DropOldest);
    }
}
