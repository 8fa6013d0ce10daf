//! Acknowledgement processing
//!
//! Pure decision logic for one incoming ACK. The session performs whatever
//! I/O the returned [`AckOutcome`] calls for.

use crate::sequence::SeqNumber;
use crate::state::SessionState;
use crate::window::Window;

/// ACKs equal to the base that trigger a fast retransmit
pub const FAST_RETRANSMIT_THRESHOLD: u32 = 4;

/// Result of applying one ACK to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// `ACK(final + 1)`: every packet is acknowledged
    Complete,
    /// The base moved forward, releasing `released` packets
    Advanced { released: usize },
    /// Repeat of the current base, below the fast-retransmit threshold
    Duplicate { count: u32 },
    /// Threshold reached: resend the packet with this sequence number now
    FastRetransmit(SeqNumber),
    /// Below the base; already covered
    Stale,
    /// Acknowledges a sequence number that was never assigned
    Bogus,
}

/// Apply a cumulative ACK to the window
pub fn process_ack(
    state: &SessionState,
    window: &mut Window,
    ack: SeqNumber,
    fast_retransmit_threshold: u32,
) -> AckOutcome {
    if state.is_final_ack(ack) {
        return AckOutcome::Complete;
    }
    if ack > state.current_seq() {
        return AckOutcome::Bogus;
    }

    let base = window.base();
    if ack > base {
        let released = window.advance_base(ack);
        window.reset_duplicate_ack();
        AckOutcome::Advanced { released }
    } else if ack == base {
        let count = window.record_duplicate_ack();
        if count >= fast_retransmit_threshold {
            window.reset_duplicate_ack();
            AckOutcome::FastRetransmit(ack)
        } else {
            AckOutcome::Duplicate { count }
        }
    } else {
        AckOutcome::Stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;
    use bytes::Bytes;

    /// Session after the handshake with `count` packets in flight from 726
    fn setup(count: u32, last_is_final: bool) -> (SessionState, Window) {
        let mut state = SessionState::new(SeqNumber::new(725));
        state.complete_handshake();
        let mut window = Window::new(state.current_seq(), 7);
        for i in 0..count {
            let is_final = last_is_final && i + 1 == count;
            let seq = state.assign_seq(is_final).unwrap();
            assert!(window.try_insert(Packet::data(seq, Bytes::from_static(b"x"), is_final)));
        }
        (state, window)
    }

    fn ack(state: &SessionState, window: &mut Window, seq: u32) -> AckOutcome {
        process_ack(state, window, SeqNumber::new(seq), FAST_RETRANSMIT_THRESHOLD)
    }

    #[test]
    fn test_cumulative_advance() {
        let (state, mut window) = setup(5, false);
        assert_eq!(
            ack(&state, &mut window, 729),
            AckOutcome::Advanced { released: 3 }
        );
        assert_eq!(window.base(), SeqNumber::new(729));
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_advance_resets_duplicates() {
        let (state, mut window) = setup(5, false);
        ack(&state, &mut window, 726);
        ack(&state, &mut window, 726);
        assert_eq!(window.duplicate_acks(), 2);

        ack(&state, &mut window, 727);
        assert_eq!(window.duplicate_acks(), 0);
    }

    #[test]
    fn test_fourth_duplicate_triggers_fast_retransmit() {
        let (state, mut window) = setup(5, false);
        assert_eq!(
            ack(&state, &mut window, 727),
            AckOutcome::Advanced { released: 1 }
        );

        assert_eq!(ack(&state, &mut window, 727), AckOutcome::Duplicate { count: 1 });
        assert_eq!(ack(&state, &mut window, 727), AckOutcome::Duplicate { count: 2 });
        assert_eq!(ack(&state, &mut window, 727), AckOutcome::Duplicate { count: 3 });
        assert_eq!(
            ack(&state, &mut window, 727),
            AckOutcome::FastRetransmit(SeqNumber::new(727))
        );
        assert_eq!(window.duplicate_acks(), 0);

        // The counter starts over.
        assert_eq!(ack(&state, &mut window, 727), AckOutcome::Duplicate { count: 1 });
    }

    #[test]
    fn test_stale_ack_ignored() {
        let (state, mut window) = setup(5, false);
        ack(&state, &mut window, 729);
        assert_eq!(ack(&state, &mut window, 727), AckOutcome::Stale);
        assert_eq!(window.base(), SeqNumber::new(729));
        assert_eq!(window.duplicate_acks(), 0);
    }

    #[test]
    fn test_ack_for_unsent_data_ignored() {
        let (state, mut window) = setup(3, false);
        // Sent 726..=728, so the highest meaningful ACK is 729.
        assert_eq!(ack(&state, &mut window, 730), AckOutcome::Bogus);
        assert_eq!(window.base(), SeqNumber::new(726));
        assert_eq!(
            ack(&state, &mut window, 729),
            AckOutcome::Advanced { released: 3 }
        );
    }

    #[test]
    fn test_final_ack_completes() {
        let (state, mut window) = setup(3, true);
        assert_eq!(state.final_seq(), Some(SeqNumber::new(728)));
        assert_eq!(ack(&state, &mut window, 729), AckOutcome::Complete);
    }

    #[test]
    fn test_no_completion_before_fin() {
        let (state, mut window) = setup(3, false);
        // Same number a FIN at 728 would need, but no FIN exists yet.
        assert_eq!(
            ack(&state, &mut window, 729),
            AckOutcome::Advanced { released: 3 }
        );
        assert!(window.is_empty());
    }
}
