//! BEARS-TP I/O
//!
//! Datagram channels for the protocol core: a UDP socket channel for real
//! transfers and an in-memory channel for threaded tests.

pub mod memory;
pub mod socket;

pub use memory::MemoryChannel;
pub use socket::{resolve, SocketError, UdpChannel};
