//! BEARS-TP - reliable file transfer over UDP
//!
//! High-level API over the protocol core and its I/O channels.

pub use bears_io as io;
pub use bears_protocol as protocol;

// Re-export commonly used types
pub use io::{MemoryChannel, SocketError, UdpChannel};
pub use protocol::{
    CancelToken, DatagramChannel, Packet, PacketType, ReceiverOptions, ReceiverSummary,
    SenderError, SenderOptions, SenderSession, SenderStats, SenderSummary, SeqNumber,
    SharedStats,
};

use std::io::{Read, Write};
use std::net::SocketAddr;
use thiserror::Error;
use tracing::info;

/// Errors from the one-call transfer helpers
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("Sender error: {0}")]
    Sender(#[from] SenderError),

    #[error("Receiver error: {0}")]
    Receiver(#[from] protocol::ReceiverError),
}

/// Send everything `input` yields to `host:port` over UDP
pub fn send<R: Read>(
    host: &str,
    port: u16,
    input: R,
    options: SenderOptions,
    cancel: &CancelToken,
    stats: &SharedStats,
) -> Result<SenderSummary, TransferError> {
    let channel = UdpChannel::connect_host(host, port)?;
    info!("Sending to {}:{}", host, port);

    let mut session = SenderSession::new(channel, input, options)?
        .with_cancel_token(cancel.clone())
        .with_stats(SharedStats::clone(stats));
    Ok(session.run()?)
}

/// Receive one transfer on `local` and write it to `output`
pub fn receive<W: Write>(
    local: SocketAddr,
    output: &mut W,
    options: &ReceiverOptions,
    cancel: &CancelToken,
) -> Result<ReceiverSummary, TransferError> {
    let mut channel = UdpChannel::bind(local)?;
    info!("Listening on {}", channel.local_addr()?);
    Ok(protocol::serve(&mut channel, output, options, cancel)?)
}
