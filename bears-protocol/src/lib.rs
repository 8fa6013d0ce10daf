//! BEARS-TP Protocol Core
//!
//! This crate implements the sender side of BEARS-TP, a reliable file
//! transfer protocol over unreliable datagrams: packet codec, sequence
//! numbers, the go-back-N send window, handshake, acknowledgement processing
//! and the transmit loop. A reference receiver state machine and a
//! deterministic loopback channel are included for end-to-end use and tests.

pub mod channel;
pub mod chunk;
pub mod handshake;
pub mod loopback;
pub mod packet;
pub mod receiver;
pub mod sequence;
pub mod session;
pub mod state;
pub mod stats;
pub mod transmit;
pub mod window;

pub use channel::{CancelToken, DatagramChannel, Fault};
pub use chunk::{Chunk, ChunkReader};
pub use handshake::{Handshake, SynResponse};
pub use loopback::Loopback;
pub use packet::{Packet, PacketError, PacketType, MAX_PAYLOAD_SIZE, MIN_PAYLOAD_SIZE};
pub use receiver::{
    serve, Receiver, ReceiverError, ReceiverOptions, ReceiverStats, ReceiverSummary, Reception,
};
pub use sequence::SeqNumber;
pub use session::{SenderError, SenderOptions, SenderSession, SenderSummary};
pub use state::{Phase, SessionState};
pub use stats::{SenderStats, SharedStats};
pub use transmit::{process_ack, AckOutcome};
pub use window::{Window, WindowEntry};
