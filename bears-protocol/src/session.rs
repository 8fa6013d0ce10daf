//! Sender session
//!
//! [`SenderSession`] owns everything one transfer needs: the channel, the
//! chunked input, the session state and the send window. There is no global
//! state, so several sessions can run side by side in one process.
//!
//! ```text
//!  handshake ──▶ fill window ──▶ wait one interval ──┬─▶ done
//!                    ▲                               │
//!                    └──── ack / dup / timeout ◀─────┘
//! ```
//!
//! Everything runs on the caller's thread. The only blocking point is the
//! receive-with-timeout, which is also where cancellation is observed.

use crate::channel::{CancelToken, DatagramChannel};
use crate::chunk::ChunkReader;
use crate::handshake::Handshake;
use crate::packet::{self, Packet, MAX_PAYLOAD_SIZE};
use crate::sequence::SeqNumber;
use crate::state::{Phase, SessionState, DEFAULT_INITIAL_SEQ};
use crate::stats::{SenderStats, SharedStats};
use crate::transmit::{process_ack, AckOutcome, FAST_RETRANSMIT_THRESHOLD};
use crate::window::{Window, DEFAULT_WINDOW_SIZE};
use std::io::{self, Read};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Fixed retransmission interval
pub const RETRANSMISSION_TIMEOUT: Duration = Duration::from_millis(500);

/// Sender errors
///
/// Loss and corruption never show up here; they are handled by
/// retransmission.
#[derive(Error, Debug)]
pub enum SenderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Transfer cancelled")]
    Cancelled,

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Sequence numbers exhausted at {0}")]
    SequenceExhausted(SeqNumber),
}

/// Tunables for one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderOptions {
    pub initial_seq: SeqNumber,
    /// Maximum outstanding packets
    pub window_size: usize,
    /// Payload bytes per DAT/FIN packet
    pub payload_size: usize,
    pub retransmission_timeout: Duration,
    /// ACKs equal to the base before the base packet is resent early
    pub fast_retransmit_threshold: u32,
    /// Selective acknowledgement mode; accepted but does not change behaviour
    pub sack_mode: bool,
}

impl Default for SenderOptions {
    fn default() -> Self {
        SenderOptions {
            initial_seq: DEFAULT_INITIAL_SEQ,
            window_size: DEFAULT_WINDOW_SIZE,
            payload_size: MAX_PAYLOAD_SIZE,
            retransmission_timeout: RETRANSMISSION_TIMEOUT,
            fast_retransmit_threshold: FAST_RETRANSMIT_THRESHOLD,
            sack_mode: false,
        }
    }
}

impl SenderOptions {
    pub fn validate(&self) -> Result<(), SenderError> {
        if self.window_size == 0 {
            return Err(SenderError::InvalidOptions(
                "window size must be at least 1".into(),
            ));
        }
        if self.payload_size == 0 || self.payload_size > MAX_PAYLOAD_SIZE {
            return Err(SenderError::InvalidOptions(format!(
                "payload size must be between 1 and {} bytes, got {}",
                MAX_PAYLOAD_SIZE, self.payload_size
            )));
        }
        if self.retransmission_timeout.is_zero() {
            return Err(SenderError::InvalidOptions(
                "retransmission timeout must be non-zero".into(),
            ));
        }
        if self.initial_seq.as_raw() == u32::MAX {
            return Err(SenderError::InvalidOptions(
                "initial sequence number leaves no room for data".into(),
            ));
        }
        if self.fast_retransmit_threshold == 0 {
            return Err(SenderError::InvalidOptions(
                "fast retransmit threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a completed transfer
#[derive(Debug, Clone)]
pub struct SenderSummary {
    pub initial_seq: SeqNumber,
    pub final_seq: SeqNumber,
    pub elapsed: Duration,
    pub stats: SenderStats,
}

/// One outbound transfer
pub struct SenderSession<C, R> {
    channel: C,
    chunks: ChunkReader<R>,
    options: SenderOptions,
    state: SessionState,
    window: Window,
    cancel: CancelToken,
    stats: SharedStats,
}

impl<C: DatagramChannel, R: Read> SenderSession<C, R> {
    pub fn new(channel: C, input: R, options: SenderOptions) -> Result<Self, SenderError> {
        options.validate()?;
        if options.sack_mode {
            debug!("selective acknowledgement mode requested; using cumulative ACKs");
        }
        Ok(SenderSession {
            channel,
            chunks: ChunkReader::new(input, options.payload_size),
            state: SessionState::new(options.initial_seq),
            window: Window::new(options.initial_seq.next(), options.window_size),
            options,
            cancel: CancelToken::new(),
            stats: SharedStats::default(),
        })
    }

    /// Observe `token` at every blocking receive
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Publish counters into `stats`
    pub fn with_stats(mut self, stats: SharedStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> SharedStats {
        SharedStats::clone(&self.stats)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn options(&self) -> &SenderOptions {
        &self.options
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Handshake, then stream the whole input until the FIN is acknowledged
    pub fn run(&mut self) -> Result<SenderSummary, SenderError> {
        let started = Instant::now();
        self.handshake()?;
        self.transmit()?;

        let final_seq = self
            .state
            .final_seq()
            .expect("transfer finished without a FIN");
        let stats = self.stats.read().clone();
        let summary = SenderSummary {
            initial_seq: self.state.initial_seq(),
            final_seq,
            elapsed: started.elapsed(),
            stats,
        };
        info!(
            "Transfer complete: {} packets, {} bytes, {} retransmissions in {:?}",
            summary.stats.packets_sent,
            summary.stats.bytes_sent,
            summary.stats.retransmissions(),
            summary.elapsed
        );
        Ok(summary)
    }

    /// Agree on the initial sequence number with the receiver
    pub fn handshake(&mut self) -> Result<(), SenderError> {
        if self.state.phase() != Phase::Handshaking {
            return Ok(());
        }
        let handshake = Handshake::new(self.state.initial_seq(), self.options.retransmission_timeout);
        handshake.perform(&mut self.channel, &self.cancel, &self.stats)?;

        self.state.complete_handshake();
        Ok(())
    }

    /// Transmit loop: fill, wait, react, until the FIN is acknowledged
    pub fn transmit(&mut self) -> Result<(), SenderError> {
        assert_ne!(
            self.state.phase(),
            Phase::Handshaking,
            "transmit called before the handshake"
        );

        while !self.state.is_done() {
            self.fill_window()?;
            self.await_ack()?;
        }
        Ok(())
    }

    /// Send new packets while the window has room and input remains
    ///
    /// Returns the number of packets sent.
    fn fill_window(&mut self) -> Result<usize, SenderError> {
        let window = &mut self.window;
        let mut sent = 0;

        while window.has_room() {
            let Some(chunk) = self.chunks.next_chunk()? else {
                break;
            };

            let Some(seq) = self.state.assign_seq(chunk.is_final) else {
                return Err(SenderError::SequenceExhausted(self.state.current_seq()));
            };
            let payload_len = chunk.payload.len();
            let packet = Packet::data(seq, chunk.payload, chunk.is_final);
            let wire = packet.to_bytes();

            self.channel.send(&wire)?;
            let admitted = window.try_insert_encoded(packet, wire);
            debug_assert!(admitted, "window refused a packet it had room for");

            {
                let mut stats = self.stats.write();
                stats.packets_sent += 1;
                stats.bytes_sent += payload_len as u64;
            }
            trace!(
                "→ {} seq={} len={} in_flight={}",
                if chunk.is_final { "FIN" } else { "DAT" },
                seq,
                payload_len,
                window.len()
            );
            sent += 1;
        }

        Ok(sent)
    }

    /// Block for one retransmission interval and react to what arrives
    fn await_ack(&mut self) -> Result<(), SenderError> {
        if self.cancel.is_cancelled() {
            return Err(SenderError::Cancelled);
        }
        let received = self
            .channel
            .recv_timeout(self.options.retransmission_timeout)?;
        if self.cancel.is_cancelled() {
            return Err(SenderError::Cancelled);
        }

        match received {
            None => self.on_timeout(),
            Some(datagram) => match packet::decode(&datagram) {
                Ok(response) if response.is_ack() => self.on_ack(response.seq),
                Ok(other) => {
                    trace!("ignoring {} {} from receiver", other.packet_type, other.seq);
                    self.stats.write().stale_acks += 1;
                    Ok(())
                }
                Err(e) => {
                    trace!("dropping datagram: {}", e);
                    self.stats.write().corrupt_datagrams += 1;
                    Ok(())
                }
            },
        }
    }

    fn on_timeout(&mut self) -> Result<(), SenderError> {
        let window = &mut self.window;
        let channel = &mut self.channel;
        let resent = window.resend_all(|wire| channel.send(wire))?;

        warn!(
            "timeout: resent {} packet(s) from base {}",
            resent,
            window.base()
        );
        let mut stats = self.stats.write();
        stats.timeouts += 1;
        stats.timeout_retransmissions += resent as u64;
        Ok(())
    }

    fn on_ack(&mut self, ack: SeqNumber) -> Result<(), SenderError> {
        let window = &mut self.window;
        self.stats.write().acks_received += 1;

        match process_ack(
            &self.state,
            window,
            ack,
            self.options.fast_retransmit_threshold,
        ) {
            AckOutcome::Complete => {
                debug!("← ACK {}: final packet acknowledged", ack);
                self.state.finish();
            }
            AckOutcome::Advanced { released } => {
                trace!("← ACK {}: released {} packet(s)", ack, released);
            }
            AckOutcome::Duplicate { count } => {
                trace!("← ACK {}: duplicate #{}", ack, count);
                self.stats.write().duplicate_acks += 1;
            }
            AckOutcome::FastRetransmit(seq) => {
                let channel = &mut self.channel;
                let resent = window.resend(seq, |wire| channel.send(wire))?;
                let mut stats = self.stats.write();
                stats.duplicate_acks += 1;
                if resent {
                    warn!("fast retransmit of seq {}", seq);
                    stats.fast_retransmissions += 1;
                }
            }
            AckOutcome::Stale | AckOutcome::Bogus => {
                trace!("← ACK {}: ignored (base {})", ack, window.base());
                self.stats.write().stale_acks += 1;
            }
        }
        Ok(())
    }
}
