//! In-memory datagram channel
//!
//! [`MemoryChannel::pair`] returns two connected endpoints backed by
//! crossbeam channels, so a sender and a receiver can run on separate
//! threads without a network. Each endpoint may carry a fault filter that
//! decides the fate of every datagram it sends.
//!
//! A vanished peer behaves like a silent network: sends are dropped and
//! receives wait out their timeout.

use bears_protocol::{DatagramChannel, Fault};
use bytes::Bytes;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::io;
use std::time::Duration;
use tracing::trace;

type FaultFilter = Box<dyn FnMut(&[u8]) -> Fault + Send>;

/// One end of an in-memory datagram link
pub struct MemoryChannel {
    tx: Sender<Bytes>,
    rx: Receiver<Bytes>,
    filter: Option<FaultFilter>,
    sent: u64,
    dropped: u64,
}

impl MemoryChannel {
    /// Two connected endpoints
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let (a_tx, b_rx) = channel::unbounded();
        let (b_tx, a_rx) = channel::unbounded();
        (MemoryChannel::new(a_tx, a_rx), MemoryChannel::new(b_tx, b_rx))
    }

    fn new(tx: Sender<Bytes>, rx: Receiver<Bytes>) -> Self {
        MemoryChannel {
            tx,
            rx,
            filter: None,
            sent: 0,
            dropped: 0,
        }
    }

    /// Apply `filter` to every datagram this endpoint sends
    pub fn with_faults<F>(mut self, filter: F) -> Self
    where
        F: FnMut(&[u8]) -> Fault + Send + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Datagrams handed to `send`
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Datagrams lost to the fault filter or a vanished peer
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Datagrams waiting to be received
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl DatagramChannel for MemoryChannel {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        self.sent += 1;
        let fault = match self.filter.as_mut() {
            Some(filter) => filter(datagram),
            None => Fault::Deliver,
        };

        let Some(delivered) = fault.apply(datagram) else {
            trace!("memory channel: dropped {} bytes", datagram.len());
            self.dropped += 1;
            return Ok(());
        };
        if self.tx.send(delivered).is_err() {
            trace!("memory channel: peer gone");
            self.dropped += 1;
        }
        Ok(())
    }

    fn recv_timeout(&mut self, timeout: Duration) -> io::Result<Option<Bytes>> {
        match self.rx.recv_timeout(timeout) {
            Ok(datagram) => Ok(Some(datagram)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                let _ = channel::after(timeout).recv();
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_pair_delivers_both_ways() {
        let (mut a, mut b) = MemoryChannel::pair();
        a.send(b"syn|725|0|").unwrap();
        assert_eq!(b.pending(), 1);
        assert_eq!(
            b.recv_timeout(Duration::from_millis(10)).unwrap(),
            Some(Bytes::from_static(b"syn|725|0|"))
        );

        b.send(b"ack|726|0|").unwrap();
        assert!(a.recv_timeout(Duration::from_millis(10)).unwrap().is_some());
    }

    #[test]
    fn test_timeout() {
        let (mut a, _b) = MemoryChannel::pair();
        assert!(a.recv_timeout(Duration::from_millis(5)).unwrap().is_none());
    }

    #[test]
    fn test_fault_filter() {
        let mut count = 0;
        let (a, mut b) = MemoryChannel::pair();
        let mut a = a.with_faults(move |_| {
            count += 1;
            match count {
                1 => Fault::Drop,
                2 => Fault::Corrupt,
                _ => Fault::Deliver,
            }
        });

        for _ in 0..3 {
            a.send(b"dat|1|0|x").unwrap();
        }
        assert_eq!(a.sent(), 3);
        assert_eq!(a.dropped(), 1);

        let corrupted = b.recv_timeout(Duration::from_millis(10)).unwrap().unwrap();
        assert_ne!(&corrupted[..], b"dat|1|0|x");
        let intact = b.recv_timeout(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(&intact[..], b"dat|1|0|x");
    }

    #[test]
    fn test_vanished_peer_is_silence() {
        let (mut a, b) = MemoryChannel::pair();
        drop(b);

        a.send(b"ack|1|0|").unwrap();
        assert_eq!(a.dropped(), 1);

        let started = Instant::now();
        assert!(a.recv_timeout(Duration::from_millis(20)).unwrap().is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_across_threads() {
        let (mut a, mut b) = MemoryChannel::pair();
        let echo = thread::spawn(move || {
            let datagram = b.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
            b.send(&datagram).unwrap();
        });

        a.send(b"ping").unwrap();
        let back = a.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(&back[..], b"ping");
        echo.join().unwrap();
    }
}
