//! UDP datagram channel
//!
//! [`UdpChannel`] is a [`DatagramChannel`] over one UDP socket. The sender
//! side connects to a fixed peer; the receiver side binds and adopts the
//! first peer that talks to it.

use bears_protocol::DatagramChannel;
use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// Largest datagram accepted off the wire
const RECV_BUFFER_SIZE: usize = 65_536;

/// Socket setup errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid socket address")]
    InvalidAddress,

    #[error("Could not resolve {0}")]
    Resolve(String),
}

/// UDP socket speaking to a single peer
pub struct UdpChannel {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    read_timeout: Option<Duration>,
    buf: Vec<u8>,
}

impl UdpChannel {
    /// Open a socket on an ephemeral port and connect it to `peer`
    pub fn connect(peer: SocketAddr) -> Result<Self, SocketError> {
        let local = match peer.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = open(local)?;
        socket.connect(peer)?;
        debug!("UDP channel {} -> {}", socket.local_addr()?, peer);

        Ok(UdpChannel::from_socket(socket, Some(peer)))
    }

    /// Resolve `host:port` and connect to it
    ///
    /// IPv4 results are preferred, since `localhost` commonly resolves to
    /// `::1` first while receivers tend to bind IPv4.
    pub fn connect_host(host: &str, port: u16) -> Result<Self, SocketError> {
        let peer = resolve(host, port)?;
        UdpChannel::connect(peer)
    }

    /// Bind to `local` and wait for a peer
    pub fn bind(local: SocketAddr) -> Result<Self, SocketError> {
        let socket = open(local)?;
        debug!("UDP channel listening on {}", socket.local_addr()?);
        Ok(UdpChannel::from_socket(socket, None))
    }

    fn from_socket(socket: UdpSocket, peer: Option<SocketAddr>) -> Self {
        UdpChannel {
            socket,
            peer,
            read_timeout: None,
            buf: vec![0u8; RECV_BUFFER_SIZE],
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.socket.local_addr()?)
    }

    /// Peer address, once known
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        if self.read_timeout != Some(timeout) {
            self.socket.set_read_timeout(Some(timeout))?;
            self.read_timeout = Some(timeout);
        }
        Ok(())
    }
}

impl DatagramChannel for UdpChannel {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        if self.peer.is_none() {
            return Err(io::Error::new(
                ErrorKind::NotConnected,
                "no peer to send to yet",
            ));
        }

        match self.socket.send(datagram) {
            Ok(_) => Ok(()),
            // Datagram sends are fire-and-forget; an unreachable peer is loss.
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::ConnectionRefused | ErrorKind::WouldBlock
                ) =>
            {
                trace!("send dropped: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn recv_timeout(&mut self, timeout: Duration) -> io::Result<Option<Bytes>> {
        if timeout.is_zero() {
            return Ok(None);
        }
        self.set_read_timeout(timeout)?;

        let result = if self.peer.is_some() {
            self.socket.recv(&mut self.buf)
        } else {
            self.socket.recv_from(&mut self.buf).and_then(|(n, from)| {
                debug!("peer {} connected", from);
                self.socket.connect(from)?;
                self.peer = Some(from);
                Ok(n)
            })
        };

        match result {
            Ok(n) => Ok(Some(Bytes::copy_from_slice(&self.buf[..n]))),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::ConnectionRefused
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Create a blocking UDP socket bound to `local`
fn open(local: SocketAddr) -> Result<UdpSocket, SocketError> {
    let domain = if local.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&local.into())?;
    Ok(socket.into())
}

/// Resolve `host:port`, preferring IPv4
pub fn resolve(host: &str, port: u16) -> Result<SocketAddr, SocketError> {
    let candidates: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| SocketError::Resolve(format!("{}:{}: {}", host, port, e)))?
        .collect();

    candidates
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| SocketError::Resolve(format!("{}:{}", host, port)))
}
