//! Sender session state

use crate::sequence::SeqNumber;

/// Initial sequence number used when none is configured
pub const DEFAULT_INITIAL_SEQ: SeqNumber = SeqNumber::new(725);

/// Sender phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// SYN sent, waiting for the matching ACK
    Handshaking,
    /// Streaming DAT/FIN packets
    Transmitting,
    /// Final packet acknowledged
    Done,
}

/// Progress of one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    initial_seq: SeqNumber,
    /// Next sequence number to assign
    current_seq: SeqNumber,
    /// Sequence number of the FIN, fixed once created
    final_seq: Option<SeqNumber>,
    phase: Phase,
}

impl SessionState {
    pub fn new(initial_seq: SeqNumber) -> Self {
        SessionState {
            initial_seq,
            current_seq: initial_seq,
            final_seq: None,
            phase: Phase::Handshaking,
        }
    }

    /// Record a successful handshake: data numbering starts at `initial + 1`
    pub fn complete_handshake(&mut self) {
        assert_eq!(
            self.phase,
            Phase::Handshaking,
            "handshake completed twice"
        );
        self.current_seq = self.initial_seq.next();
        self.phase = Phase::Transmitting;
    }

    /// Hand out the next data sequence number
    ///
    /// A final packet also fixes `final_seq`. Returns `None` when the packet
    /// could not be acknowledged because `seq + 1` does not fit; the state is
    /// left unchanged in that case.
    ///
    /// # Panics
    ///
    /// Panics outside the transmitting phase or if the final sequence number
    /// was already assigned.
    pub fn assign_seq(&mut self, is_final: bool) -> Option<SeqNumber> {
        assert_eq!(self.phase, Phase::Transmitting, "no data before handshake");
        assert!(
            self.final_seq.is_none(),
            "sequence number requested after the FIN"
        );
        let seq = self.current_seq;
        self.current_seq = seq.checked_next()?;
        if is_final {
            self.final_seq = Some(seq);
        }
        Some(seq)
    }

    /// Whether `ack` acknowledges the whole transfer
    pub fn is_final_ack(&self, ack: SeqNumber) -> bool {
        self.final_seq
            .map_or(false, |final_seq| ack.as_raw() as u64 == final_seq.as_raw() as u64 + 1)
    }

    pub fn finish(&mut self) {
        self.phase = Phase::Done;
    }

    pub fn initial_seq(&self) -> SeqNumber {
        self.initial_seq
    }

    pub fn current_seq(&self) -> SeqNumber {
        self.current_seq
    }

    pub fn final_seq(&self) -> Option<SeqNumber> {
        self.final_seq
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }
}
