//! High-level S7 client for reading and writing Siemens data blocks.
//!
//! This module provides the [`Client`] struct, which owns the whole lifecycle
//! of one connection to a controller: endpoint resolution, the TCP transport,
//! the ISO-on-TCP handshake and the data block transfers.
//!
//! # Overview
//!
//! The client handles:
//! - Host resolution (IPv4 literal or forward lookup)
//! - Connection setup with keepalive and a fixed timeout
//! - COTP connect and PDU length negotiation
//! - Reads and writes at offset 0 of a data block, chunked to the PDU size
//! - Session state tracking, so a lost connection is reported by [`Client::connected`]
//!
//! # Example
//!
//! ```no_run
//! use simatic_s7::{BitString, Client};
//!
//! let mut client = Client::new("192.168.0.10", 102, 2);
//! client.connect()?;
//!
//! // 4 bytes of DB 10 as an LSB-first bitstream
//! let bits: BitString = client.fetch(10, 4)?;
//! println!("{bits}");
//!
//! client.send(10, &[0x01, 0x00, 0x00, 0x00])?;
//! client.disconnect();
//! # Ok::<(), simatic_s7::S7Error>(())
//! ```
//!
//! # Thread Safety
//!
//! Every state-changing call takes `&mut self`; one client serves one caller
//! at a time. Socket operations are blocking and bounded by the configured
//! timeout.

use std::fmt;
use std::time::Duration;

use tracing::{info, warn};

use crate::command::ConnectionType;
use crate::error::{Result, S7Error};
use crate::memory::{BitString, MemoryMap};
use crate::resolver::resolve;
use crate::session::{Session, SessionState};
use crate::transport::{DEFAULT_PORT, DEFAULT_TIMEOUT};

/// Configuration for creating an S7 client.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientConfig {
    /// Controller hostname or IPv4 literal.
    pub host: String,
    /// TCP port (default 102).
    pub port: u16,
    /// Rack number (0-7).
    pub rack: u16,
    /// Slot number (0-31).
    pub slot: u16,
    /// Connect and per-transfer timeout.
    #[cfg_attr(feature = "serde", serde(with = "duration_millis"))]
    pub timeout: Duration,
    /// Connection type encoded in the remote TSAP.
    pub connection_type: ConnectionType,
}

impl ClientConfig {
    /// Creates a new client configuration with minimal required parameters.
    ///
    /// Uses port 102, rack 0, a 5 second timeout and a PG connection.
    ///
    /// # Arguments
    ///
    /// * `host` - Controller hostname or IPv4 address
    /// * `slot` - CPU slot number
    ///
    /// # Example
    ///
    /// ```
    /// use simatic_s7::ClientConfig;
    ///
    /// let config = ClientConfig::new("192.168.0.10", 2);
    /// assert_eq!(config.port, 102);
    /// ```
    pub fn new(host: impl Into<String>, slot: u16) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            rack: 0,
            slot,
            timeout: DEFAULT_TIMEOUT,
            connection_type: ConnectionType::default(),
        }
    }

    /// Sets a custom port (default is 102).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the rack number (default is 0).
    ///
    /// # Example
    ///
    /// ```
    /// use simatic_s7::ClientConfig;
    ///
    /// let config = ClientConfig::new("192.168.0.10", 1).with_rack(0);
    /// ```
    pub fn with_rack(mut self, rack: u16) -> Self {
        self.rack = rack;
        self
    }

    /// Sets a custom timeout (default is 5 seconds).
    ///
    /// # Example
    ///
    /// ```
    /// use simatic_s7::ClientConfig;
    /// use std::time::Duration;
    ///
    /// let config = ClientConfig::new("192.168.0.10", 2)
    ///     .with_timeout(Duration::from_secs(2));
    /// ```
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connection type (default is PG).
    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = connection_type;
        self
    }
}

#[cfg(feature = "serde")]
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// S7 client for one controller.
///
/// Created disconnected; [`connect`](Self::connect) establishes the session.
/// No automatic retries or reconnection: after a fault the caller decides
/// whether to connect again.
///
/// # Example
///
/// ```no_run
/// use simatic_s7::{Client, ClientConfig};
/// use std::time::Duration;
///
/// let config = ClientConfig::new("plc.local", 1).with_timeout(Duration::from_secs(2));
/// let mut client = Client::with_config(config);
/// client.connect().unwrap();
///
/// let raw = client.fetch_bytes(1, 16).unwrap();
/// assert_eq!(raw.len(), 16);
/// ```
pub struct Client {
    config: ClientConfig,
    session: Option<Session>,
    state: SessionState,
}

impl Client {
    /// Creates a client for `host:port`, rack 0, `slot`. Performs no I/O.
    pub fn new(host: impl Into<String>, port: u16, slot: u16) -> Self {
        Self::with_config(ClientConfig::new(host, slot).with_port(port))
    }

    /// Creates a client from a full configuration. Performs no I/O.
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            session: None,
            state: SessionState::Disconnected,
        }
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Resolves the endpoint and establishes the session.
    ///
    /// On any failure the partially opened socket is closed and the client
    /// is left [`Faulted`](SessionState::Faulted); a later `connect` may retry.
    ///
    /// # Errors
    ///
    /// - `S7Error::AlreadyConnected` if a session is live
    /// - `S7Error::Resolution` if the host cannot be resolved
    /// - `S7Error::InvalidParameter` for a rack or slot out of range
    /// - `S7Error::Connect` naming the failing setup step
    pub fn connect(&mut self) -> Result<()> {
        if self.connected() {
            return Err(S7Error::AlreadyConnected);
        }
        self.state = SessionState::Connecting;

        let established = resolve(&self.config.host, self.config.port).and_then(|addr| {
            Session::establish(
                addr,
                self.config.timeout,
                self.config.connection_type,
                self.config.rack,
                self.config.slot,
            )
        });

        match established {
            Ok(session) => {
                info!(
                    host = %self.config.host,
                    addr = %session.remote_addr(),
                    rack = self.config.rack,
                    slot = self.config.slot,
                    pdu_length = session.pdu_length(),
                    "connected"
                );
                self.session = Some(session);
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(err) => {
                warn!(host = %self.config.host, error = %err, "connect failed");
                self.state = SessionState::Faulted;
                Err(err)
            }
        }
    }

    /// Returns whether a usable session is held.
    pub fn connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Returns the current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// PDU length negotiated with the controller, while connected.
    pub fn pdu_length(&self) -> Option<u16> {
        self.session.as_ref().map(Session::pdu_length)
    }

    /// Closes the session and releases the socket.
    ///
    /// Returns `true` if a live session was torn down. Safe to call in any
    /// state.
    pub fn disconnect(&mut self) -> bool {
        self.state = SessionState::Disconnected;
        match self.session.take() {
            Some(session) => {
                info!(addr = %session.remote_addr(), "disconnected");
                session.close();
                true
            }
            None => false,
        }
    }

    /// Reads `byte_count` bytes from offset 0 of data block `block` and
    /// builds `M` from the LSB-first bitstream.
    ///
    /// # Errors
    ///
    /// - `S7Error::InvalidParameter` if `byte_count` is 0 (no I/O is done)
    /// - `S7Error::NotConnected` without a session
    /// - `S7Error::Read` if the controller rejects the read; the session stays connected
    /// - transport and framing errors, which fault the session
    ///
    /// # Example
    ///
    /// ```no_run
    /// use simatic_s7::{BitString, Client};
    ///
    /// let mut client = Client::new("192.168.0.10", 102, 2);
    /// client.connect().unwrap();
    ///
    /// let (bits, length): (BitString, usize) = client.fetch(3, 2).unwrap();
    /// assert_eq!(length, 16);
    /// assert_eq!(bits.len(), 16);
    /// ```
    pub fn fetch<M: MemoryMap>(&mut self, block: u16, byte_count: u16) -> Result<M> {
        let bytes = self.fetch_bytes(block, byte_count)?;
        let length = bytes.len() * 8;
        Ok(M::from_bits(BitString::from_bytes(&bytes), length))
    }

    /// Reads `byte_count` raw bytes from offset 0 of data block `block`.
    ///
    /// Same errors as [`fetch`](Self::fetch).
    pub fn fetch_bytes(&mut self, block: u16, byte_count: u16) -> Result<Vec<u8>> {
        if byte_count == 0 {
            return Err(S7Error::invalid_parameter(
                "byte_count",
                "must be greater than 0",
            ));
        }
        let result = self.session_mut()?.read_db(block, byte_count);
        self.track(result)
    }

    /// Writes `payload` at offset 0 of data block `block`.
    ///
    /// Returns `Ok(false)` for an empty payload without touching the
    /// network, `Ok(true)` once the controller acknowledged every byte.
    ///
    /// # Errors
    ///
    /// - `S7Error::NotConnected` without a session
    /// - `S7Error::Write` if the controller rejects the write; the session stays connected
    /// - `S7Error::InvalidParameter` for payloads over 65535 bytes
    /// - transport and framing errors, which fault the session
    pub fn send(&mut self, block: u16, payload: &[u8]) -> Result<bool> {
        if payload.is_empty() {
            return Ok(false);
        }
        let result = self.session_mut()?.write_db(block, payload);
        self.track(result).map(|()| true)
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        match self.state {
            SessionState::Connected => self.session.as_mut().ok_or(S7Error::NotConnected),
            _ => Err(S7Error::NotConnected),
        }
    }

    /// Faults the session when `result` carries an error that leaves the
    /// byte stream unusable.
    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_fatal() {
                warn!(host = %self.config.host, error = %err, "session faulted");
                self.state = SessionState::Faulted;
                if let Some(session) = self.session.take() {
                    session.close();
                }
            }
        }
        result
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("192.168.0.10", 2);
        assert_eq!(config.host, "192.168.0.10");
        assert_eq!(config.port, 102);
        assert_eq!(config.rack, 0);
        assert_eq!(config.slot, 2);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.connection_type, ConnectionType::Pg);
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new("plc", 1)
            .with_port(1102)
            .with_rack(3)
            .with_timeout(Duration::from_millis(250))
            .with_connection_type(ConnectionType::Op);
        assert_eq!(config.port, 1102);
        assert_eq!(config.rack, 3);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.connection_type, ConnectionType::Op);
    }

    #[test]
    fn test_new_is_disconnected() {
        let client = Client::new("192.168.0.10", 102, 2);
        assert!(!client.connected());
        assert_eq!(client.state(), SessionState::Disconnected);
        assert_eq!(client.pdu_length(), None);
        assert_eq!(client.config().port, 102);
    }

    #[test]
    fn test_fetch_requires_connection() {
        let mut client = Client::new("192.168.0.10", 102, 2);
        let err = client.fetch::<BitString>(1, 4).unwrap_err();
        assert!(matches!(err, S7Error::NotConnected));
    }

    #[test]
    fn test_fetch_zero_bytes_rejected() {
        let mut client = Client::new("192.168.0.10", 102, 2);
        let err = client.fetch_bytes(1, 0).unwrap_err();
        assert!(matches!(err, S7Error::InvalidParameter { .. }));
    }

    #[test]
    fn test_send_empty_payload() {
        let mut client = Client::new("192.168.0.10", 102, 2);
        assert!(!client.send(1, &[]).unwrap());
    }

    #[test]
    fn test_send_requires_connection() {
        let mut client = Client::new("192.168.0.10", 102, 2);
        let err = client.send(1, &[1, 2]).unwrap_err();
        assert!(matches!(err, S7Error::NotConnected));
    }

    #[test]
    fn test_disconnect_without_session() {
        let mut client = Client::new("192.168.0.10", 102, 2);
        assert!(!client.disconnect());
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_connect_resolution_failure_faults() {
        let mut client = Client::new("", 102, 2);
        let err = client.connect().unwrap_err();
        assert!(matches!(err, S7Error::Resolution { .. }));
        assert_eq!(client.state(), SessionState::Faulted);
        assert!(!client.connected());
    }

    #[test]
    fn test_connect_invalid_rack() {
        let config = ClientConfig::new("127.0.0.1", 1).with_rack(9);
        let mut client = Client::with_config(config);
        let err = client.connect().unwrap_err();
        assert!(matches!(err, S7Error::InvalidParameter { .. }));
    }
}
