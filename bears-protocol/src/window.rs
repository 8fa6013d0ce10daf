//! Send window
//!
//! [`Window`] holds the packets that have been sent but not yet covered by a
//! cumulative ACK, in the order they were queued. It is pure bookkeeping:
//! resends go through a caller-supplied closure.
//!
//! ```text
//!   base                                  base + capacity
//!    │                                          │
//! ───┼──────────────────────────────────────────┼──▶ seq space
//!    │ <── outstanding (at most `capacity`) ──▶ │
//! ```
//!
//! Invariants: at most `capacity` entries; every entry has `seq >= base`;
//! `base` never moves backwards.

use crate::packet::Packet;
use crate::sequence::SeqNumber;
use bytes::Bytes;
use std::collections::VecDeque;

/// Default number of outstanding packets
pub const DEFAULT_WINDOW_SIZE: usize = 7;

/// A single outstanding packet
#[derive(Debug, Clone)]
pub struct WindowEntry {
    packet: Packet,
    /// Encoded form, so a resend never re-encodes
    wire: Bytes,
    /// Times this packet has been transmitted
    tx_count: u32,
}

impl WindowEntry {
    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn wire(&self) -> &Bytes {
        &self.wire
    }

    pub fn tx_count(&self) -> u32 {
        self.tx_count
    }
}

/// Go-back-N send window
#[derive(Debug)]
pub struct Window {
    entries: VecDeque<WindowEntry>,
    base: SeqNumber,
    capacity: usize,
    duplicate_acks: u32,
}

impl Window {
    /// Create an empty window starting at `base`
    pub fn new(base: SeqNumber, capacity: usize) -> Self {
        assert!(capacity >= 1, "window capacity must be at least 1");
        Window {
            entries: VecDeque::with_capacity(capacity),
            base,
            capacity,
            duplicate_acks: 0,
        }
    }

    /// Admit a packet that has just been transmitted
    ///
    /// Returns `false` and leaves the window untouched when it is full.
    pub fn try_insert(&mut self, packet: Packet) -> bool {
        let wire = packet.to_bytes();
        self.try_insert_encoded(packet, wire)
    }

    /// Same as [`Window::try_insert`] with the wire form already at hand
    pub fn try_insert_encoded(&mut self, packet: Packet, wire: Bytes) -> bool {
        if self.is_full() {
            return false;
        }
        debug_assert!(
            packet.seq >= self.base,
            "packet {} inserted below window base {}",
            packet.seq,
            self.base
        );
        self.entries.push_back(WindowEntry {
            packet,
            wire,
            tx_count: 1,
        });
        true
    }

    /// Slide the window to `new_base`, dropping every packet below it
    ///
    /// Returns the number of packets released.
    ///
    /// # Panics
    ///
    /// Panics if `new_base` is below the current base.
    pub fn advance_base(&mut self, new_base: SeqNumber) -> usize {
        assert!(
            new_base >= self.base,
            "window base cannot move backwards ({} -> {})",
            self.base,
            new_base
        );
        let before = self.entries.len();
        self.entries.retain(|entry| entry.packet.seq >= new_base);
        self.base = new_base;
        before - self.entries.len()
    }

    /// Outstanding packet with exactly this sequence number
    pub fn lookup(&self, seq: SeqNumber) -> Option<&Packet> {
        self.entry(seq).map(WindowEntry::packet)
    }

    pub fn entry(&self, seq: SeqNumber) -> Option<&WindowEntry> {
        self.entries.iter().find(|entry| entry.packet.seq == seq)
    }

    /// Resend every outstanding packet in queue order
    ///
    /// Resets the duplicate-ACK counter and returns the number of packets sent.
    pub fn resend_all<F, E>(&mut self, mut send: F) -> Result<usize, E>
    where
        F: FnMut(&Bytes) -> Result<(), E>,
    {
        for entry in self.entries.iter_mut() {
            send(&entry.wire)?;
            entry.tx_count += 1;
        }
        self.duplicate_acks = 0;
        Ok(self.entries.len())
    }

    /// Resend the single packet numbered `seq`, if it is still outstanding
    pub fn resend<F, E>(&mut self, seq: SeqNumber, send: F) -> Result<bool, E>
    where
        F: FnOnce(&Bytes) -> Result<(), E>,
    {
        match self.entries.iter_mut().find(|entry| entry.packet.seq == seq) {
            Some(entry) => {
                send(&entry.wire)?;
                entry.tx_count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Count one more ACK equal to the base; returns the new count
    pub fn record_duplicate_ack(&mut self) -> u32 {
        self.duplicate_acks += 1;
        self.duplicate_acks
    }

    pub fn reset_duplicate_ack(&mut self) {
        self.duplicate_acks = 0;
    }

    pub fn duplicate_acks(&self) -> u32 {
        self.duplicate_acks
    }

    pub fn base(&self) -> SeqNumber {
        self.base
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Room for at least one more packet
    pub fn has_room(&self) -> bool {
        !self.is_full()
    }

    /// Outstanding packets, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Packet> {
        self.entries.iter().map(WindowEntry::packet)
    }

    /// Outstanding entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &WindowEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn dat(seq: u32) -> Packet {
        Packet::data(SeqNumber::new(seq), Bytes::from(vec![seq as u8; 4]), false)
    }

    fn filled(base: u32, count: u32, capacity: usize) -> Window {
        let mut window = Window::new(SeqNumber::new(base), capacity);
        for seq in base..base + count {
            assert!(window.try_insert(dat(seq)));
        }
        window
    }

    #[test]
    fn test_initial_state() {
        let window = Window::new(SeqNumber::new(726), 7);
        assert_eq!(window.base(), SeqNumber::new(726));
        assert_eq!(window.capacity(), 7);
        assert!(window.is_empty());
        assert!(window.has_room());
        assert_eq!(window.duplicate_acks(), 0);
    }

    #[test]
    fn test_capacity_enforced() {
        let mut window = filled(0, 2, 2);
        assert!(window.is_full());
        assert!(!window.try_insert(dat(2)));
        assert_eq!(window.len(), 2);
        assert!(window.lookup(SeqNumber::new(2)).is_none());
    }

    #[test]
    fn test_advance_base_releases_prefix() {
        let mut window = filled(10, 5, 7);
        let released = window.advance_base(SeqNumber::new(13));

        assert_eq!(released, 3);
        assert_eq!(window.base(), SeqNumber::new(13));
        let remaining: Vec<u32> = window.iter().map(|p| p.seq.as_raw()).collect();
        assert_eq!(remaining, vec![13, 14]);
    }

    #[test]
    fn test_advance_base_past_everything() {
        let mut window = filled(10, 3, 7);
        assert_eq!(window.advance_base(SeqNumber::new(13)), 3);
        assert!(window.is_empty());
        assert!(window.has_room());
    }

    #[test]
    fn test_advance_base_to_same_value() {
        let mut window = filled(10, 3, 7);
        assert_eq!(window.advance_base(SeqNumber::new(10)), 0);
        assert_eq!(window.len(), 3);
    }

    #[test]
    #[should_panic(expected = "cannot move backwards")]
    fn test_advance_base_backwards_panics() {
        let mut window = filled(10, 3, 7);
        window.advance_base(SeqNumber::new(12));
        window.advance_base(SeqNumber::new(11));
    }

    #[test]
    fn test_lookup() {
        let window = filled(5, 3, 7);
        assert_eq!(window.lookup(SeqNumber::new(6)), Some(&dat(6)));
        assert_eq!(window.lookup(SeqNumber::new(8)), None);
        assert_eq!(window.lookup(SeqNumber::new(4)), None);
    }

    #[test]
    fn test_resend_all_in_order() {
        let mut window = filled(20, 4, 7);
        window.record_duplicate_ack();
        window.record_duplicate_ack();

        let mut sent = Vec::new();
        let count = window
            .resend_all(|wire| {
                sent.push(Packet::from_bytes(wire).unwrap().seq.as_raw());
                Ok::<_, Infallible>(())
            })
            .unwrap();

        assert_eq!(count, 4);
        assert_eq!(sent, vec![20, 21, 22, 23]);
        assert_eq!(window.duplicate_acks(), 0);
        assert!(window.entries().all(|e| e.tx_count() == 2));
    }

    #[test]
    fn test_resend_all_stops_on_error() {
        let mut window = filled(0, 3, 7);
        let mut calls = 0;
        let result = window.resend_all(|_| {
            calls += 1;
            if calls == 2 {
                Err("broken")
            } else {
                Ok(())
            }
        });

        assert_eq!(result, Err("broken"));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_resend_single() {
        let mut window = filled(0, 3, 7);
        let mut sent = None;

        let found = window
            .resend(SeqNumber::new(1), |wire| {
                sent = Some(wire.clone());
                Ok::<_, Infallible>(())
            })
            .unwrap();

        assert!(found);
        assert_eq!(sent.unwrap(), dat(1).to_bytes());
        assert_eq!(window.entry(SeqNumber::new(1)).unwrap().tx_count(), 2);
        assert_eq!(window.entry(SeqNumber::new(0)).unwrap().tx_count(), 1);

        let missing = window
            .resend(SeqNumber::new(9), |_| Ok::<_, Infallible>(()))
            .unwrap();
        assert!(!missing);
    }

    #[test]
    fn test_duplicate_ack_counter() {
        let mut window = Window::new(SeqNumber::new(0), 7);
        assert_eq!(window.record_duplicate_ack(), 1);
        assert_eq!(window.record_duplicate_ack(), 2);
        window.reset_duplicate_ack();
        assert_eq!(window.duplicate_acks(), 0);
    }

    #[test]
    fn test_cached_wire_matches_encoding() {
        let window = filled(3, 1, 7);
        let entry = window.entry(SeqNumber::new(3)).unwrap();
        assert_eq!(entry.wire(), &entry.packet().to_bytes());
    }
}
