//! BEARS-TP Packet Structures and Serialization
//!
//! Packets travel as delimiter-separated text with a raw binary tail:
//!
//! ```text
//! type|sequenceNumber|checksum|payload
//! ```
//!
//! `type` is one of `syn`, `dat`, `fin`, `ack`; the sequence number and the
//! checksum are unsigned decimal integers. The checksum is the CRC-32 of
//! `type|sequenceNumber|payload` exactly as those bytes appear on the wire.
//! The payload may itself contain `|`, so only the first three delimiters
//! are structural.

use crate::sequence::SeqNumber;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;

/// Field delimiter
pub const DELIMITER: u8 = b'|';

/// Maximum payload carried by a single DAT/FIN packet
///
/// The original deployment keeps whole datagrams under 1472 bytes.
pub const MAX_PAYLOAD_SIZE: usize = 1471;

/// Smallest payload that still meets the throughput target (last packet excepted)
pub const MIN_PAYLOAD_SIZE: usize = 1000;

/// Longest possible header: `syn|4294967295|4294967295|`
pub const MAX_HEADER_SIZE: usize = 3 + 1 + 10 + 1 + 10 + 1;

/// Largest datagram a well-formed packet can produce
pub const MAX_DATAGRAM_SIZE: usize = MAX_HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Connection request carrying the initial sequence number
    Syn,
    /// Data packet with more data to follow
    Dat,
    /// Final data packet of the stream
    Fin,
    /// Cumulative acknowledgement (receiver originated)
    Ack,
}

impl PacketType {
    /// Wire token for this type
    pub fn as_str(self) -> &'static str {
        match self {
            PacketType::Syn => "syn",
            PacketType::Dat => "dat",
            PacketType::Fin => "fin",
            PacketType::Ack => "ack",
        }
    }

    /// Parse a wire token
    pub fn from_token(token: &[u8]) -> Option<Self> {
        match token {
            b"syn" => Some(PacketType::Syn),
            b"dat" => Some(PacketType::Dat),
            b"fin" => Some(PacketType::Fin),
            b"ack" => Some(PacketType::Ack),
            _ => None,
        }
    }

    /// Whether packets of this type may carry a payload
    pub fn carries_payload(self) -> bool {
        matches!(self, PacketType::Dat | PacketType::Fin)
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded BEARS-TP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet type
    pub packet_type: PacketType,
    /// Sequence number (ACK: next expected)
    pub seq: SeqNumber,
    /// Payload data (empty for SYN and ACK)
    pub payload: Bytes,
}

impl Packet {
    /// Create a SYN packet carrying the initial sequence number
    pub fn syn(seq: SeqNumber) -> Self {
        Packet {
            packet_type: PacketType::Syn,
            seq,
            payload: Bytes::new(),
        }
    }

    /// Create an ACK for the next expected sequence number
    pub fn ack(seq: SeqNumber) -> Self {
        Packet {
            packet_type: PacketType::Ack,
            seq,
            payload: Bytes::new(),
        }
    }

    /// Create a DAT packet, or a FIN packet when `is_final` is set
    pub fn data(seq: SeqNumber, payload: Bytes, is_final: bool) -> Self {
        debug_assert!(
            payload.len() <= MAX_PAYLOAD_SIZE,
            "payload of {} bytes exceeds {}",
            payload.len(),
            MAX_PAYLOAD_SIZE
        );
        Packet {
            packet_type: if is_final {
                PacketType::Fin
            } else {
                PacketType::Dat
            },
            seq,
            payload,
        }
    }

    #[inline]
    pub fn is_ack(&self) -> bool {
        self.packet_type == PacketType::Ack
    }

    #[inline]
    pub fn is_fin(&self) -> bool {
        self.packet_type == PacketType::Fin
    }

    /// Checksum of this packet's fields
    pub fn checksum(&self) -> u32 {
        compute_checksum(
            self.packet_type.as_str().as_bytes(),
            self.seq.to_string().as_bytes(),
            &self.payload,
        )
    }

    /// Serialize the packet to wire bytes
    pub fn to_bytes(&self) -> Bytes {
        encode(self.packet_type, self.seq, &self.payload)
    }

    /// Parse and verify a packet from wire bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        decode(bytes)
    }
}

/// Raw field slices of a datagram, before any interpretation
struct RawFields<'a> {
    kind: &'a [u8],
    seq: &'a [u8],
    checksum: &'a [u8],
    payload: &'a [u8],
}

impl<'a> RawFields<'a> {
    fn split(bytes: &'a [u8]) -> Result<Self, PacketError> {
        let mut rest = bytes;
        let mut next_field = |name: &'static str| -> Result<&'a [u8], PacketError> {
            let current: &'a [u8] = rest;
            let at = current
                .iter()
                .position(|&b| b == DELIMITER)
                .ok_or(PacketError::MissingField(name))?;
            rest = &current[at + 1..];
            Ok(&current[..at])
        };

        let kind = next_field("type")?;
        let seq = next_field("sequence number")?;
        // A missing payload section is allowed: `ack|726|1234567`.
        let (checksum, payload) = match rest.iter().position(|&b| b == DELIMITER) {
            Some(at) => (&rest[..at], &rest[at + 1..]),
            None => (rest, &[][..]),
        };

        Ok(RawFields {
            kind,
            seq,
            checksum,
            payload,
        })
    }
}

fn parse_decimal(field: &[u8], what: &'static str) -> Result<u32, PacketError> {
    if field.is_empty() || !field.iter().all(u8::is_ascii_digit) {
        return Err(PacketError::InvalidNumber(what));
    }
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(PacketError::InvalidNumber(what))
}

/// CRC-32 over `kind|seq|payload`
pub fn compute_checksum(kind: &[u8], seq: &[u8], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(&[DELIMITER]);
    hasher.update(seq);
    hasher.update(&[DELIMITER]);
    hasher.update(payload);
    hasher.finalize()
}

/// Encode a packet into wire bytes
pub fn encode(packet_type: PacketType, seq: SeqNumber, payload: &[u8]) -> Bytes {
    let seq_text = seq.to_string();
    let checksum = compute_checksum(packet_type.as_str().as_bytes(), seq_text.as_bytes(), payload);
    let checksum_text = checksum.to_string();

    let mut buf = BytesMut::with_capacity(
        packet_type.as_str().len() + seq_text.len() + checksum_text.len() + 3 + payload.len(),
    );
    buf.put_slice(packet_type.as_str().as_bytes());
    buf.put_u8(DELIMITER);
    buf.put_slice(seq_text.as_bytes());
    buf.put_u8(DELIMITER);
    buf.put_slice(checksum_text.as_bytes());
    buf.put_u8(DELIMITER);
    buf.put_slice(payload);
    buf.freeze()
}

/// Check a datagram's checksum without decoding it
pub fn validate_checksum(bytes: &[u8]) -> bool {
    let Ok(fields) = RawFields::split(bytes) else {
        return false;
    };
    match parse_decimal(fields.checksum, "checksum") {
        Ok(reported) => reported == compute_checksum(fields.kind, fields.seq, fields.payload),
        Err(_) => false,
    }
}

/// Decode a datagram, verifying its checksum
pub fn decode(bytes: &[u8]) -> Result<Packet, PacketError> {
    if bytes.len() > MAX_DATAGRAM_SIZE {
        return Err(PacketError::TooLarge {
            size: bytes.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }

    let fields = RawFields::split(bytes)?;

    let reported = parse_decimal(fields.checksum, "checksum")?;
    let actual = compute_checksum(fields.kind, fields.seq, fields.payload);
    if reported != actual {
        return Err(PacketError::ChecksumMismatch {
            expected: reported,
            actual,
        });
    }

    let packet_type = PacketType::from_token(fields.kind)
        .ok_or_else(|| PacketError::UnknownType(String::from_utf8_lossy(fields.kind).into()))?;
    let seq = SeqNumber::new(parse_decimal(fields.seq, "sequence number")?);

    if !packet_type.carries_payload() && !fields.payload.is_empty() {
        return Err(PacketError::UnexpectedPayload(packet_type));
    }
    if fields.payload.len() > MAX_PAYLOAD_SIZE {
        return Err(PacketError::PayloadTooLarge {
            size: fields.payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    Ok(Packet {
        packet_type,
        seq,
        payload: Bytes::copy_from_slice(fields.payload),
    })
}

/// Packet parsing and validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PacketError {
    #[error("Missing {0} field")]
    MissingField(&'static str),

    #[error("Unknown packet type: {0:?}")]
    UnknownType(String),

    #[error("Invalid {0}")]
    InvalidNumber(&'static str),

    #[error("Checksum mismatch: packet says {expected}, computed {actual}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("{0} packet must not carry a payload")]
    UnexpectedPayload(PacketType),

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Datagram too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
}
