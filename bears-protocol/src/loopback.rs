//! Deterministic in-process channel
//!
//! [`Loopback`] wires a sender directly to a [`Receiver`]: every datagram
//! sent is handled synchronously and the resulting ACK is queued for the
//! next receive. A receive with nothing queued returns a timeout at once, so
//! scenarios run without wall-clock waits.
//!
//! Faults are scripted per direction with closures that see each decoded
//! packet, and individual receive calls can be withheld to force a timeout.

use crate::channel::{DatagramChannel, Fault};
use crate::packet::Packet;
use crate::receiver::Receiver;
use bytes::{Bytes, BytesMut};
use std::collections::{BTreeSet, VecDeque};
use std::io;
use std::time::Duration;

/// Per-datagram fault decision
pub type FaultFn = Box<dyn FnMut(&Packet) -> Fault + Send>;

/// Sender-side channel backed by an in-process receiver
pub struct Loopback {
    receiver: Receiver,
    inbox: VecDeque<Bytes>,
    sent: Vec<Bytes>,
    replies: Vec<Bytes>,
    delivered: BytesMut,
    outgoing: Option<FaultFn>,
    incoming: Option<FaultFn>,
    withheld: BTreeSet<usize>,
    recv_calls: usize,
}

impl Default for Loopback {
    fn default() -> Self {
        Self::new()
    }
}

impl Loopback {
    pub fn new() -> Self {
        Loopback {
            receiver: Receiver::new(),
            inbox: VecDeque::new(),
            sent: Vec::new(),
            replies: Vec::new(),
            delivered: BytesMut::new(),
            outgoing: None,
            incoming: None,
            withheld: BTreeSet::new(),
            recv_calls: 0,
        }
    }

    /// Filter datagrams travelling to the receiver
    pub fn with_outgoing_faults<F>(mut self, filter: F) -> Self
    where
        F: FnMut(&Packet) -> Fault + Send + 'static,
    {
        self.outgoing = Some(Box::new(filter));
        self
    }

    /// Filter ACKs travelling back to the sender
    pub fn with_incoming_faults<F>(mut self, filter: F) -> Self
    where
        F: FnMut(&Packet) -> Fault + Send + 'static,
    {
        self.incoming = Some(Box::new(filter));
        self
    }

    /// Make the receive call with this zero-based index report a timeout
    ///
    /// Queued datagrams stay queued for the following call.
    pub fn withhold_receive(&mut self, call_index: usize) {
        self.withheld.insert(call_index);
    }

    /// Queue a raw datagram for the sender, bypassing the receiver
    pub fn push_incoming(&mut self, datagram: impl Into<Bytes>) {
        self.inbox.push_back(datagram.into());
    }

    /// Every datagram the sender sent, in order
    pub fn sent(&self) -> &[Bytes] {
        &self.sent
    }

    /// Sent datagrams decoded
    pub fn sent_packets(&self) -> Vec<Packet> {
        self.sent
            .iter()
            .filter_map(|wire| Packet::from_bytes(wire).ok())
            .collect()
    }

    /// Every reply the receiver produced, before incoming faults
    pub fn replies(&self) -> &[Bytes] {
        &self.replies
    }

    /// Payload bytes the receiver delivered in order
    pub fn delivered(&self) -> &[u8] {
        &self.delivered
    }

    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    pub fn recv_calls(&self) -> usize {
        self.recv_calls
    }

    fn filter(filter: &mut Option<FaultFn>, datagram: &[u8]) -> Option<Bytes> {
        let fault = match (filter.as_mut(), Packet::from_bytes(datagram)) {
            (Some(filter), Ok(packet)) => filter(&packet),
            _ => Fault::Deliver,
        };
        fault.apply(datagram)
    }
}

impl DatagramChannel for Loopback {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        self.sent.push(Bytes::copy_from_slice(datagram));

        let Some(arrived) = Self::filter(&mut self.outgoing, datagram) else {
            return Ok(());
        };
        let reception = self.receiver.handle(&arrived);
        if let Some(payload) = reception.delivered {
            self.delivered.extend_from_slice(&payload);
        }
        if let Some(reply) = reception.reply {
            self.replies.push(reply.clone());
            if let Some(back) = Self::filter(&mut self.incoming, &reply) {
                self.inbox.push_back(back);
            }
        }
        Ok(())
    }

    fn recv_timeout(&mut self, _timeout: Duration) -> io::Result<Option<Bytes>> {
        let call = self.recv_calls;
        self.recv_calls += 1;
        if self.withheld.contains(&call) {
            return Ok(None);
        }
        Ok(self.inbox.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketType;
    use crate::sequence::SeqNumber;

    #[test]
    fn test_syn_round_trip() {
        let mut link = Loopback::new();
        link.send(&Packet::syn(SeqNumber::new(725)).to_bytes()).unwrap();

        let reply = link.recv_timeout(Duration::ZERO).unwrap().unwrap();
        assert_eq!(Packet::from_bytes(&reply).unwrap(), Packet::ack(SeqNumber::new(726)));
        assert!(link.recv_timeout(Duration::ZERO).unwrap().is_none());
    }

    #[test]
    fn test_withheld_receive_keeps_queue() {
        let mut link = Loopback::new();
        link.send(&Packet::syn(SeqNumber::new(1)).to_bytes()).unwrap();
        link.withhold_receive(0);

        assert!(link.recv_timeout(Duration::ZERO).unwrap().is_none());
        assert!(link.recv_timeout(Duration::ZERO).unwrap().is_some());
        assert_eq!(link.recv_calls(), 2);
    }

    #[test]
    fn test_outgoing_drop() {
        let mut link = Loopback::new().with_outgoing_faults(|packet| {
            if packet.packet_type == PacketType::Syn {
                Fault::Drop
            } else {
                Fault::Deliver
            }
        });
        link.send(&Packet::syn(SeqNumber::new(1)).to_bytes()).unwrap();

        assert_eq!(link.sent().len(), 1);
        assert!(link.replies().is_empty());
        assert!(link.receiver().expected().is_none());
    }

    #[test]
    fn test_incoming_corruption_reaches_sender() {
        let mut link = Loopback::new().with_incoming_faults(|_| Fault::Corrupt);
        link.send(&Packet::syn(SeqNumber::new(1)).to_bytes()).unwrap();

        let reply = link.recv_timeout(Duration::ZERO).unwrap().unwrap();
        assert!(Packet::from_bytes(&reply).is_err());
        assert_eq!(link.replies().len(), 1);
    }

    #[test]
    fn test_delivery_recorded() {
        let mut link = Loopback::new();
        link.send(&Packet::syn(SeqNumber::new(9)).to_bytes()).unwrap();
        link.send(&Packet::data(SeqNumber::new(10), Bytes::from_static(b"abc"), true).to_bytes())
            .unwrap();

        assert_eq!(link.delivered(), b"abc");
        assert!(link.receiver().is_complete());
    }
}
