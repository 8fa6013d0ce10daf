//! Sequence Number Handling
//!
//! BEARS-TP numbers *packets*, not bytes: every SYN, DAT and FIN consumes
//! exactly one sequence number and an ACK carries the next number the
//! receiver expects. Numbers travel as decimal text, so there is no fixed
//! field width to wrap around; the space simply grows by one per packet.

use std::fmt;
use std::ops::{Add, AddAssign};

/// Packet-indexed sequence number
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct SeqNumber(u32);

impl SeqNumber {
    /// Create a new sequence number
    #[inline]
    pub const fn new(value: u32) -> Self {
        SeqNumber(value)
    }

    /// Get the raw sequence number value
    #[inline]
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Increment the sequence number by 1
    ///
    /// # Panics
    /// Panics if the sequence space is exhausted.
    #[inline]
    pub fn increment(&mut self) {
        *self = self.next();
    }

    /// Get the next sequence number
    ///
    /// # Panics
    /// Panics if the sequence space is exhausted.
    #[inline]
    pub fn next(self) -> Self {
        self.checked_next()
            .expect("sequence number space exhausted")
    }

    /// Get the next sequence number, or `None` at the end of the space
    #[inline]
    pub fn checked_next(self) -> Option<Self> {
        self.0.checked_add(1).map(SeqNumber)
    }

    /// Signed distance from this sequence number to `other`
    ///
    /// Positive values mean `other` is ahead of `self`.
    pub fn distance_to(self, other: SeqNumber) -> i64 {
        other.0 as i64 - self.0 as i64
    }
}

impl fmt::Debug for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNumber({})", self.0)
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SeqNumber {
    fn from(value: u32) -> Self {
        SeqNumber(value)
    }
}

impl From<SeqNumber> for u32 {
    fn from(seq: SeqNumber) -> u32 {
        seq.0
    }
}

impl Add<u32> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: u32) -> SeqNumber {
        SeqNumber(
            self.0
                .checked_add(rhs)
                .expect("sequence number space exhausted"),
        )
    }
}

impl AddAssign<u32> for SeqNumber {
    fn add_assign(&mut self, rhs: u32) {
        *self = *self + rhs;
    }
}
