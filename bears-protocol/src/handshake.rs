//! BEARS-TP Handshake
//!
//! The sender announces its initial sequence number with a SYN and waits for
//! `ACK(initial + 1)`. The SYN is resent every retransmission interval until
//! that ACK arrives; there is no attempt limit.
//!
//! A response with a bad checksum does not cut the interval short: it is
//! dropped and the sender keeps waiting for the rest of the interval. A valid
//! response that is not the expected ACK triggers an immediate resend.

use crate::channel::{CancelToken, DatagramChannel};
use crate::packet::{self, Packet, PacketType};
use crate::sequence::SeqNumber;
use crate::session::SenderError;
use crate::stats::SharedStats;
use bytes::Bytes;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// How a datagram received during the handshake is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynResponse {
    /// `ACK(initial + 1)`: the handshake is complete
    Accepted,
    /// Failed checksum or framing; treated as never received
    Corrupt,
    /// Valid, but not the expected ACK
    Rejected,
}

/// SYN exchange for one session
#[derive(Debug, Clone)]
pub struct Handshake {
    initial_seq: SeqNumber,
    syn_wire: Bytes,
    timeout: Duration,
}

impl Handshake {
    pub fn new(initial_seq: SeqNumber, timeout: Duration) -> Self {
        Handshake {
            initial_seq,
            syn_wire: Packet::syn(initial_seq).to_bytes(),
            timeout,
        }
    }

    /// Encoded SYN packet
    pub fn syn_wire(&self) -> &Bytes {
        &self.syn_wire
    }

    /// Sequence number the receiver must acknowledge
    pub fn expected_ack(&self) -> SeqNumber {
        self.initial_seq.next()
    }

    /// Classify one datagram received while waiting for the SYN's ACK
    pub fn classify(&self, datagram: &[u8]) -> SynResponse {
        match packet::decode(datagram) {
            Ok(response)
                if response.packet_type == PacketType::Ack
                    && response.seq == self.expected_ack() =>
            {
                SynResponse::Accepted
            }
            Ok(response) => {
                trace!(
                    "handshake: ignoring {} {} (want ack {})",
                    response.packet_type,
                    response.seq,
                    self.expected_ack()
                );
                SynResponse::Rejected
            }
            Err(e) => {
                trace!("handshake: dropping datagram: {}", e);
                SynResponse::Corrupt
            }
        }
    }

    /// Run the exchange until the receiver acknowledges the SYN
    ///
    /// Returns the number of SYN transmissions it took.
    pub fn perform<C: DatagramChannel>(
        &self,
        channel: &mut C,
        cancel: &CancelToken,
        stats: &SharedStats,
    ) -> Result<u32, SenderError> {
        let mut attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(SenderError::Cancelled);
            }

            channel.send(&self.syn_wire)?;
            attempts += 1;
            stats.write().handshake_attempts += 1;
            debug!("→ SYN seq={} (attempt {})", self.initial_seq, attempts);

            let deadline = Instant::now() + self.timeout;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    debug!("handshake timed out, resending SYN");
                    break;
                }

                let received = channel.recv_timeout(remaining)?;
                if cancel.is_cancelled() {
                    return Err(SenderError::Cancelled);
                }

                let Some(datagram) = received else {
                    debug!("handshake timed out, resending SYN");
                    break;
                };

                match self.classify(&datagram) {
                    SynResponse::Accepted => {
                        info!(
                            "Successful handshake: initial seq {}, {} attempt(s)",
                            self.initial_seq, attempts
                        );
                        return Ok(attempts);
                    }
                    SynResponse::Corrupt => {
                        stats.write().corrupt_datagrams += 1;
                    }
                    SynResponse::Rejected => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::encode;
    use std::collections::VecDeque;
    use std::io;

    /// Channel that replays scripted receive results, one per call
    struct Scripted {
        sent: Vec<Bytes>,
        replies: VecDeque<Option<Bytes>>,
    }

    impl Scripted {
        fn new(replies: Vec<Option<Bytes>>) -> Self {
            Scripted {
                sent: Vec::new(),
                replies: replies.into(),
            }
        }
    }

    impl DatagramChannel for Scripted {
        fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
            self.sent.push(Bytes::copy_from_slice(datagram));
            Ok(())
        }

        fn recv_timeout(&mut self, _timeout: Duration) -> io::Result<Option<Bytes>> {
            Ok(self.replies.pop_front().flatten())
        }
    }

    fn corrupt(wire: Bytes) -> Bytes {
        let mut damaged = wire.to_vec();
        let last = damaged.len() - 1;
        damaged[last] = b'x';
        damaged.into()
    }

    fn handshake() -> Handshake {
        Handshake::new(SeqNumber::new(725), Duration::from_millis(500))
    }

    #[test]
    fn test_classify() {
        let hs = handshake();
        assert_eq!(
            hs.classify(&Packet::ack(SeqNumber::new(726)).to_bytes()),
            SynResponse::Accepted
        );
        assert_eq!(
            hs.classify(&Packet::ack(SeqNumber::new(725)).to_bytes()),
            SynResponse::Rejected
        );
        assert_eq!(
            hs.classify(&encode(PacketType::Syn, SeqNumber::new(726), b"")),
            SynResponse::Rejected
        );
        assert_eq!(
            hs.classify(&corrupt(Packet::ack(SeqNumber::new(726)).to_bytes())),
            SynResponse::Corrupt
        );
    }

    #[test]
    fn test_immediate_success() {
        let mut channel = Scripted::new(vec![Some(Packet::ack(SeqNumber::new(726)).to_bytes())]);
        let stats = SharedStats::default();

        let attempts = handshake()
            .perform(&mut channel, &CancelToken::new(), &stats)
            .unwrap();

        assert_eq!(attempts, 1);
        assert_eq!(channel.sent, vec![Packet::syn(SeqNumber::new(725)).to_bytes()]);
        assert_eq!(stats.read().handshake_attempts, 1);
    }

    #[test]
    fn test_converges_after_losses() {
        let good = Packet::ack(SeqNumber::new(726)).to_bytes();
        let mut channel = Scripted::new(vec![
            None,                                              // timeout
            Some(Packet::ack(SeqNumber::new(900)).to_bytes()), // wrong number
            Some(corrupt(good.clone())),                       // corrupt, keep waiting
            None,                                              // timeout
            Some(good),
        ]);
        let stats = SharedStats::default();

        let attempts = handshake()
            .perform(&mut channel, &CancelToken::new(), &stats)
            .unwrap();

        // SYN #1 times out, SYN #2 gets a wrong ACK, SYN #3 sees the corrupt
        // reply and then times out, SYN #4 succeeds.
        assert_eq!(attempts, 4);
        assert_eq!(channel.sent.len(), 4);
        assert!(channel.sent.iter().all(|s| s == handshake().syn_wire()));
        assert_eq!(stats.read().corrupt_datagrams, 1);
    }

    #[test]
    fn test_corrupt_reply_does_not_resend() {
        let good = Packet::ack(SeqNumber::new(726)).to_bytes();
        let mut channel = Scripted::new(vec![Some(corrupt(good.clone())), Some(good)]);

        let attempts = handshake()
            .perform(&mut channel, &CancelToken::new(), &SharedStats::default())
            .unwrap();

        assert_eq!(attempts, 1);
        assert_eq!(channel.sent.len(), 1);
    }

    #[test]
    fn test_cancelled() {
        let mut channel = Scripted::new(vec![]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = handshake().perform(&mut channel, &cancel, &SharedStats::default());
        assert!(matches!(result, Err(SenderError::Cancelled)));
        assert!(channel.sent.is_empty());
    }
}
