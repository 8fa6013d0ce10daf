//! Datagram channel abstraction
//!
//! The protocol core never touches sockets directly. It talks to a
//! [`DatagramChannel`]: a best-effort send plus a blocking receive bounded by
//! a timeout. `bears-io` provides the UDP and in-memory implementations;
//! [`crate::loopback`] provides a deterministic one for tests.

use bytes::Bytes;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Unreliable datagram transport
pub trait DatagramChannel {
    /// Send one datagram. Delivery is not guaranteed.
    ///
    /// Errors are reserved for a broken channel; a datagram lost in
    /// transit is not an error.
    fn send(&mut self, datagram: &[u8]) -> io::Result<()>;

    /// Wait up to `timeout` for the next datagram.
    ///
    /// Returns `Ok(None)` when nothing arrived before the timeout.
    fn recv_timeout(&mut self, timeout: Duration) -> io::Result<Option<Bytes>>;
}

impl<T: DatagramChannel + ?Sized> DatagramChannel for &mut T {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        (**self).send(datagram)
    }

    fn recv_timeout(&mut self, timeout: Duration) -> io::Result<Option<Bytes>> {
        (**self).recv_timeout(timeout)
    }
}

impl<T: DatagramChannel + ?Sized> DatagramChannel for Box<T> {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        (**self).send(datagram)
    }

    fn recv_timeout(&mut self, timeout: Duration) -> io::Result<Option<Bytes>> {
        (**self).recv_timeout(timeout)
    }
}

/// What a fault-injecting channel does with one datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Pass the datagram through untouched
    Deliver,
    /// Silently lose the datagram
    Drop,
    /// Deliver the datagram with its last byte flipped
    Corrupt,
}

impl Fault {
    /// Apply this fault to a datagram, returning what reaches the peer
    pub fn apply(self, datagram: &[u8]) -> Option<Bytes> {
        match self {
            Fault::Deliver => Some(Bytes::copy_from_slice(datagram)),
            Fault::Drop => None,
            Fault::Corrupt => {
                let mut damaged = datagram.to_vec();
                if let Some(last) = damaged.last_mut() {
                    *last ^= 0xFF;
                }
                Some(damaged.into())
            }
        }
    }
}

/// Cooperative cancellation flag
///
/// Checked at every blocking receive boundary. The inner flag can be handed
/// to a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Shared flag backing this token
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}
