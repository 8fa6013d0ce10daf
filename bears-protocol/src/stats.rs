//! Sender statistics
//!
//! The session thread is the only writer; reporters read through the shared
//! lock.

use parking_lot::RwLock;
use std::sync::Arc;

/// Counters for one transfer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// SYN transmissions, including the first
    pub handshake_attempts: u64,
    /// New DAT/FIN packets sent (first transmissions only)
    pub packets_sent: u64,
    /// Payload bytes in new DAT/FIN packets
    pub bytes_sent: u64,
    /// Packets resent because the retransmission timer expired
    pub timeout_retransmissions: u64,
    /// Packets resent after repeated duplicate ACKs
    pub fast_retransmissions: u64,
    /// Retransmission timer expiries
    pub timeouts: u64,
    /// Valid ACKs received
    pub acks_received: u64,
    /// ACKs equal to the current window base
    pub duplicate_acks: u64,
    /// ACKs below the window base, or for data never sent
    pub stale_acks: u64,
    /// Datagrams dropped for a bad checksum or malformed framing
    pub corrupt_datagrams: u64,
}

impl SenderStats {
    /// Every retransmitted packet, whatever triggered it
    pub fn retransmissions(&self) -> u64 {
        self.timeout_retransmissions + self.fast_retransmissions
    }
}

/// Statistics shared between the session and its observers
pub type SharedStats = Arc<RwLock<SenderStats>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retransmission_total() {
        let stats = SenderStats {
            timeout_retransmissions: 7,
            fast_retransmissions: 2,
            ..Default::default()
        };
        assert_eq!(stats.retransmissions(), 9);
    }

    #[test]
    fn test_shared_view() {
        let shared: SharedStats = Arc::default();
        let observer = Arc::clone(&shared);

        shared.write().packets_sent += 3;
        assert_eq!(observer.read().packets_sent, 3);
    }
}
