//! Reference receiver
//!
//! A go-back-N receiver: it accepts exactly the next expected packet, drops
//! anything out of order and answers every valid SYN, DAT or FIN with a
//! cumulative ACK. [`Receiver`] is the I/O-free state machine; [`serve`]
//! drives it over a [`DatagramChannel`] and writes delivered payloads out.

use crate::channel::{CancelToken, DatagramChannel};
use crate::packet::{self, Packet, PacketType};
use crate::sequence::SeqNumber;
use bytes::Bytes;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace};

/// Receiver errors
#[derive(Error, Debug)]
pub enum ReceiverError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Receive cancelled")]
    Cancelled,

    #[error("No datagram for {0:?}")]
    IdleTimeout(Duration),
}

/// What one datagram produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reception {
    /// Encoded ACK to send back
    pub reply: Option<Bytes>,
    /// In-order payload to hand to the application
    pub delivered: Option<Bytes>,
}

/// Receiver counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub packets_delivered: u64,
    pub bytes_delivered: u64,
    /// Data packets that were not the next expected one
    pub out_of_order: u64,
    pub corrupt_datagrams: u64,
    pub acks_sent: u64,
}

/// Receiver state machine
#[derive(Debug, Default)]
pub struct Receiver {
    initial_seq: Option<SeqNumber>,
    /// Next in-order sequence number
    expected: Option<SeqNumber>,
    final_seq: Option<SeqNumber>,
    stats: ReceiverStats,
}

impl Receiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one datagram
    pub fn handle(&mut self, datagram: &[u8]) -> Reception {
        let packet = match packet::decode(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                trace!("receiver: dropping datagram: {}", e);
                self.stats.corrupt_datagrams += 1;
                return Reception::default();
            }
        };

        match packet.packet_type {
            PacketType::Syn => self.on_syn(packet.seq),
            PacketType::Dat | PacketType::Fin => self.on_data(packet),
            PacketType::Ack => {
                trace!("receiver: ignoring ack {}", packet.seq);
                Reception::default()
            }
        }
    }

    fn on_syn(&mut self, seq: SeqNumber) -> Reception {
        let Some(expected) = seq.checked_next() else {
            return Reception::default();
        };
        match self.initial_seq {
            Some(initial) if initial == seq => {}
            Some(initial) if self.stats.packets_delivered > 0 => {
                debug!(
                    "receiver: ignoring SYN {} during session {}",
                    seq, initial
                );
                return Reception::default();
            }
            _ => {
                debug!("receiver: SYN {}, expecting {}", seq, expected);
                self.initial_seq = Some(seq);
                self.expected = Some(expected);
            }
        }
        self.reply(expected)
    }

    fn on_data(&mut self, packet: Packet) -> Reception {
        let Some(expected) = self.expected else {
            trace!("receiver: {} {} before SYN", packet.packet_type, packet.seq);
            return Reception::default();
        };

        if packet.seq != expected || self.is_complete() {
            self.stats.out_of_order += 1;
            trace!(
                "receiver: {} {} out of order (expecting {})",
                packet.packet_type,
                packet.seq,
                expected
            );
            return self.reply(expected);
        }

        let Some(next) = expected.checked_next() else {
            return Reception::default();
        };
        self.expected = Some(next);
        self.stats.packets_delivered += 1;
        self.stats.bytes_delivered += packet.payload.len() as u64;
        if packet.is_fin() {
            info!("receiver: FIN {} delivered", packet.seq);
            self.final_seq = Some(packet.seq);
        }

        Reception {
            delivered: Some(packet.payload),
            ..self.reply(next)
        }
    }

    fn reply(&mut self, ack: SeqNumber) -> Reception {
        self.stats.acks_sent += 1;
        trace!("receiver: → ACK {}", ack);
        Reception {
            reply: Some(Packet::ack(ack).to_bytes()),
            delivered: None,
        }
    }

    /// The FIN has been delivered
    pub fn is_complete(&self) -> bool {
        self.final_seq.is_some()
    }

    pub fn expected(&self) -> Option<SeqNumber> {
        self.expected
    }

    pub fn final_seq(&self) -> Option<SeqNumber> {
        self.final_seq
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}

/// Receive loop tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverOptions {
    /// Granularity of the cancellation and idle checks
    pub poll_interval: Duration,
    /// Quiet period after the FIN before the loop returns; retransmitted
    /// FINs keep getting acknowledged meanwhile
    pub linger: Duration,
    /// Give up when nothing arrives for this long
    pub idle_timeout: Option<Duration>,
}

impl Default for ReceiverOptions {
    fn default() -> Self {
        ReceiverOptions {
            poll_interval: Duration::from_millis(100),
            linger: Duration::from_secs(2),
            idle_timeout: None,
        }
    }
}

/// Outcome of [`serve`]
#[derive(Debug, Clone)]
pub struct ReceiverSummary {
    pub initial_seq: Option<SeqNumber>,
    pub final_seq: Option<SeqNumber>,
    pub stats: ReceiverStats,
    pub elapsed: Duration,
}

/// Receive one transfer from `channel` into `output`
pub fn serve<C, W>(
    channel: &mut C,
    output: &mut W,
    options: &ReceiverOptions,
    cancel: &CancelToken,
) -> Result<ReceiverSummary, ReceiverError>
where
    C: DatagramChannel + ?Sized,
    W: Write + ?Sized,
{
    let started = Instant::now();
    let mut receiver = Receiver::new();
    let mut last_activity = Instant::now();

    loop {
        if cancel.is_cancelled() {
            return Err(ReceiverError::Cancelled);
        }

        let Some(datagram) = channel.recv_timeout(options.poll_interval)? else {
            let quiet = last_activity.elapsed();
            if receiver.is_complete() && quiet >= options.linger {
                break;
            }
            if let Some(limit) = options.idle_timeout {
                if quiet >= limit {
                    return Err(ReceiverError::IdleTimeout(limit));
                }
            }
            continue;
        };
        last_activity = Instant::now();

        let reception = receiver.handle(&datagram);
        if let Some(payload) = reception.delivered {
            output.write_all(&payload)?;
        }
        if let Some(reply) = reception.reply {
            channel.send(&reply)?;
        }
    }

    output.flush()?;
    let summary = ReceiverSummary {
        initial_seq: receiver.initial_seq,
        final_seq: receiver.final_seq(),
        stats: receiver.stats().clone(),
        elapsed: started.elapsed(),
    };
    info!(
        "Received {} bytes in {} packets",
        summary.stats.bytes_delivered, summary.stats.packets_delivered
    );
    Ok(summary)
}
