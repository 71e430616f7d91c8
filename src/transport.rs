//! TCP transport layer for ISO-on-TCP communication.
//!
//! This module provides the [`TcpTransport`] struct which owns the socket to
//! the controller. The transport layer only knows about sockets and bytes;
//! TPKT/COTP framing lives in [`header`](crate::header).
//!
//! # Design
//!
//! - **Protocol agnostic** - Handles only byte transmission
//! - **Synchronous** - Blocking send/receive bounded by the session timeout
//! - **Leak free** - A failed [`TcpTransport::open`] drops the socket before
//!   the error is returned
//!
//! # Constants
//!
//! - [`DEFAULT_PORT`] - ISO-on-TCP port (102)
//! - [`DEFAULT_TIMEOUT`] - Session timeout (5 seconds)

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddrV4, TcpStream};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::{debug, trace};

use crate::error::{ConnectStep, Result, S7Error};

/// Default ISO-on-TCP port (RFC 1006).
pub const DEFAULT_PORT: u16 = 102;

/// Default timeout for connect, send and receive.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP transport to a single controller.
///
/// Not designed for concurrent use; the owning [`Client`](crate::Client)
/// serializes access through `&mut self`.
pub struct TcpTransport {
    stream: TcpStream,
    remote_addr: SocketAddrV4,
}

impl TcpTransport {
    /// Opens a TCP connection with keepalive enabled.
    ///
    /// # Arguments
    ///
    /// * `addr` - Controller address
    /// * `timeout` - Bound for the connect attempt and for every later send/receive
    ///
    /// # Errors
    ///
    /// Returns [`S7Error::Connect`] naming the failing step with the OS error
    /// code. The socket is closed on every error path.
    pub fn open(addr: SocketAddrV4, timeout: Duration) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| S7Error::connect_io(ConnectStep::Socket, &e))?;

        socket
            .connect_timeout(&SockAddr::from(addr), timeout)
            .map_err(|e| S7Error::connect_io(ConnectStep::Connect, &e))?;

        socket
            .set_keepalive(true)
            .map_err(|e| S7Error::connect_io(ConnectStep::Keepalive, &e))?;

        let stream: TcpStream = socket.into();
        stream
            .set_read_timeout(Some(timeout))
            .and_then(|_| stream.set_write_timeout(Some(timeout)))
            .and_then(|_| stream.set_nodelay(true))
            .map_err(|e| S7Error::connect_io(ConnectStep::Timeout, &e))?;

        debug!(%addr, ?timeout, "tcp transport open");
        Ok(Self {
            stream,
            remote_addr: addr,
        })
    }

    /// Writes the whole buffer.
    ///
    /// # Errors
    ///
    /// `S7Error::Timeout` when the write timeout expires,
    /// `S7Error::ConnectionClosed` when the peer has gone away.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        trace!(len = data.len(), "send");
        self.stream
            .write_all(data)
            .map_err(S7Error::from_transfer)
    }

    /// Reads exactly `len` bytes.
    ///
    /// # Errors
    ///
    /// `S7Error::Timeout` when the read timeout expires,
    /// `S7Error::ConnectionClosed` on EOF before `len` bytes arrived.
    pub fn receive_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        self.stream
            .read_exact(&mut buffer)
            .map_err(S7Error::from_transfer)?;
        trace!(len, "receive");
        Ok(buffer)
    }

    /// Reads whatever is available, up to `max_len` bytes.
    ///
    /// # Errors
    ///
    /// As [`receive_exact`](Self::receive_exact); a zero-length read is
    /// reported as `S7Error::ConnectionClosed`.
    pub fn receive(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; max_len];
        let size = self
            .stream
            .read(&mut buffer)
            .map_err(S7Error::from_transfer)?;
        if size == 0 && max_len > 0 {
            return Err(S7Error::ConnectionClosed);
        }
        buffer.truncate(size);
        Ok(buffer)
    }

    /// Shuts the connection down and releases the socket.
    pub fn close(self) {
        // The peer may already be gone; the descriptor is released on drop regardless.
        let _ = self.stream.shutdown(Shutdown::Both);
        debug!(addr = %self.remote_addr, "tcp transport closed");
    }

    /// Returns the remote controller address.
    pub fn remote_addr(&self) -> SocketAddrV4 {
        self.remote_addr
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("remote_addr", &self.remote_addr)
            .field("local_addr", &self.stream.local_addr().ok())
            .finish()
    }
}
