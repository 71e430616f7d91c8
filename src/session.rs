//! Protocol session: ISO-on-TCP handshake and data block transfers.
//!
//! A [`Session`] exists only in the connected state. It is created by
//! [`Session::establish`] after the COTP connection and the S7 PDU
//! negotiation both succeed, and it owns the transport until
//! [`Session::close`] or drop.
//!
//! Every request is correlated with its response through the PDU reference,
//! and every socket round trip runs under a [`SignalGuard`].

use std::fmt;
use std::net::SocketAddrV4;
use std::time::Duration;

use tracing::{debug, warn};

use crate::command::{
    ConnectionRequest, ConnectionType, ReadDbCommand, SetupCommunicationCommand, WriteDbCommand,
    REQUESTED_PDU_LENGTH,
};
use crate::error::{ConnectStep, Result, S7Error};
use crate::guard::SignalGuard;
use crate::header::{unwrap_data, TpktHeader, TPKT_HEADER_SIZE};
use crate::response::{check_connection_confirm, S7Response};
use crate::transport::TcpTransport;

/// Read response overhead inside one PDU.
const READ_OVERHEAD: u16 = 18;
/// Write request overhead inside one PDU.
const WRITE_OVERHEAD: u16 = 28;

/// Connection state of a [`Client`](crate::Client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No session; initial state and state after `disconnect`.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Session established; transfers allowed.
    Connected,
    /// Setup failed or the connection was lost.
    Faulted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Faulted => write!(f, "faulted"),
        }
    }
}

/// An established S7 session.
pub struct Session {
    transport: TcpTransport,
    pdu_length: u16,
    next_ref: u16,
}

/// Rewrites handshake failures as `S7Error::Connect` at `step`.
fn at_step(step: ConnectStep) -> impl FnOnce(S7Error) -> S7Error {
    move |err| match err {
        S7Error::Connect { .. } => err,
        S7Error::Io(e) => S7Error::connect_io(step, &e),
        other => {
            warn!(%step, error = %other, "handshake failed");
            S7Error::Connect { step, code: -1 }
        }
    }
}

impl Session {
    /// Opens the transport and performs the COTP + S7 handshake.
    ///
    /// # Errors
    ///
    /// `S7Error::Connect` naming the failing step, or `S7Error::InvalidParameter`
    /// for an unencodable rack/slot. The socket is closed on every error path.
    pub fn establish(
        addr: SocketAddrV4,
        timeout: Duration,
        connection_type: ConnectionType,
        rack: u16,
        slot: u16,
    ) -> Result<Self> {
        let request = ConnectionRequest::new(connection_type, rack, slot)?;
        let transport = TcpTransport::open(addr, timeout)?;

        let mut session = Self {
            transport,
            pdu_length: 0,
            next_ref: 1,
        };

        let confirm = session
            .exchange(&request.to_bytes())
            .map_err(at_step(ConnectStep::IsoConnect))?;
        check_connection_confirm(&confirm)?;
        debug!(remote_tsap = request.remote_tsap(), "cotp connected");

        let pdu_ref = session.next_pdu_ref();
        let setup = SetupCommunicationCommand::new(pdu_ref, REQUESTED_PDU_LENGTH);
        let granted = session
            .request(&setup.to_bytes()?, pdu_ref)
            .and_then(|response| response.negotiated_pdu_length())
            .map_err(at_step(ConnectStep::Negotiate))?;
        // capped at the requested length
        let pdu_length = granted.min(REQUESTED_PDU_LENGTH);
        if pdu_length <= WRITE_OVERHEAD {
            return Err(S7Error::Connect {
                step: ConnectStep::Negotiate,
                code: pdu_length as i32,
            });
        }

        debug!(granted, pdu_length, "pdu length negotiated");
        session.pdu_length = pdu_length;
        Ok(session)
    }

    /// PDU length in use: the controller's grant, capped at
    /// [`REQUESTED_PDU_LENGTH`].
    pub fn pdu_length(&self) -> u16 {
        self.pdu_length
    }

    /// Largest payload carried by one read request.
    pub fn max_read_chunk(&self) -> u16 {
        self.pdu_length - READ_OVERHEAD
    }

    /// Largest payload carried by one write request.
    pub fn max_write_chunk(&self) -> u16 {
        self.pdu_length - WRITE_OVERHEAD
    }

    fn next_pdu_ref(&mut self) -> u16 {
        let pdu_ref = self.next_ref;
        self.next_ref = self.next_ref.wrapping_add(1).max(1);
        pdu_ref
    }

    /// Sends one frame and returns the TPKT payload of the reply.
    fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        let _guard = SignalGuard::suspend();
        self.transport.send(frame)?;
        let header = self.transport.receive_exact(TPKT_HEADER_SIZE)?;
        let tpkt = TpktHeader::from_bytes(&header)?;
        self.transport.receive_exact(tpkt.payload_len())
    }

    /// Sends one S7 job and returns the matching ack.
    fn request(&mut self, frame: &[u8], pdu_ref: u16) -> Result<S7Response> {
        let payload = self.exchange(frame)?;
        let response = S7Response::from_pdu(unwrap_data(&payload)?)?;
        response.check_pdu_ref(pdu_ref)?;
        Ok(response)
    }

    /// Reads `count` bytes starting at offset 0 of data block `db_number`.
    ///
    /// Requests larger than [`max_read_chunk`](Self::max_read_chunk) are
    /// split into consecutive jobs.
    ///
    /// # Errors
    ///
    /// `S7Error::Read` if the controller rejects any chunk; transport and
    /// framing errors otherwise.
    pub fn read_db(&mut self, db_number: u16, count: u16) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(count as usize);
        let mut offset: u16 = 0;

        while offset < count {
            let chunk = (count - offset).min(self.max_read_chunk());
            let pdu_ref = self.next_pdu_ref();
            let cmd = ReadDbCommand::new(pdu_ref, db_number, offset, chunk)?;
            debug!(db_number, offset, chunk, pdu_ref, "read db");

            let response = self.request(&cmd.to_bytes()?, pdu_ref)?;
            buffer.extend_from_slice(&response.read_payload(chunk as usize)?);
            offset += chunk;
        }

        Ok(buffer)
    }

    /// Writes `data` starting at offset 0 of data block `db_number`.
    ///
    /// # Errors
    ///
    /// `S7Error::Write` if the controller rejects any chunk;
    /// `S7Error::InvalidParameter` if `data` is empty or exceeds 65535 bytes.
    pub fn write_db(&mut self, db_number: u16, data: &[u8]) -> Result<()> {
        if data.len() > u16::MAX as usize {
            return Err(S7Error::invalid_parameter(
                "payload",
                format!("must not exceed {} bytes", u16::MAX),
            ));
        }
        if data.is_empty() {
            return Err(S7Error::invalid_parameter("payload", "must not be empty"));
        }

        let max_chunk = self.max_write_chunk() as usize;
        for (index, chunk) in data.chunks(max_chunk).enumerate() {
            let offset = (index * max_chunk) as u16;
            let pdu_ref = self.next_pdu_ref();
            let cmd = WriteDbCommand::new(pdu_ref, db_number, offset, chunk)?;
            debug!(db_number, offset, chunk = chunk.len(), pdu_ref, "write db");

            self.request(&cmd.to_bytes()?, pdu_ref)?.check_write()?;
        }

        Ok(())
    }

    /// Returns the controller address.
    pub fn remote_addr(&self) -> SocketAddrV4 {
        self.transport.remote_addr()
    }

    /// Closes the transport, consuming the session.
    pub fn close(self) {
        self.transport.close();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.transport)
            .field("pdu_length", &self.pdu_length)
            .finish()
    }
}
