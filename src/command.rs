//! S7 request construction.
//!
//! Each request handles its own serialization into a complete ISO-on-TCP
//! frame (TPKT + COTP + S7 PDU) ready to be written to the socket.
//!
//! # Request Types
//!
//! - [`ConnectionRequest`] - COTP connection request carrying rack/slot TSAPs
//! - [`SetupCommunicationCommand`] - S7 PDU length negotiation
//! - [`ReadDbCommand`] - Read bytes from a data block
//! - [`WriteDbCommand`] - Write bytes to a data block
//!
//! # Example
//!
//! ```
//! use simatic_s7::ReadDbCommand;
//!
//! let cmd = ReadDbCommand::new(0x0001, 10, 0, 4).unwrap();
//! let frame = cmd.to_bytes().unwrap();
//! assert_eq!(frame.len(), 31);
//! ```

use crate::error::{Result, S7Error};
use crate::header::{wrap_data, COTP_CONNECTION_REQUEST, TPKT_HEADER_SIZE};

/// S7 protocol identifier.
pub(crate) const S7_PROTOCOL_ID: u8 = 0x32;
/// ROSCTR: job request.
pub(crate) const ROSCTR_JOB: u8 = 0x01;
/// ROSCTR: acknowledgement with data.
pub(crate) const ROSCTR_ACK_DATA: u8 = 0x03;
/// Function code: read variable.
pub(crate) const FN_READ_VAR: u8 = 0x04;
/// Function code: write variable.
pub(crate) const FN_WRITE_VAR: u8 = 0x05;
/// Function code: setup communication.
pub(crate) const FN_SETUP_COMMUNICATION: u8 = 0xF0;
/// Area code for data blocks.
pub(crate) const AREA_DB: u8 = 0x84;
/// Item transport size: BYTE.
const TRANSPORT_SIZE_BYTE: u8 = 0x02;
/// Data transport size: BYTE/WORD/DWORD, length given in bits.
const DATA_TRANSPORT_BYTES: u8 = 0x04;

/// S7 job header size (no error fields).
pub const S7_JOB_HEADER_SIZE: usize = 10;

/// Local TSAP used by the client (PG/PC side).
pub const LOCAL_TSAP: u16 = 0x0100;

/// PDU length requested during negotiation.
pub const REQUESTED_PDU_LENGTH: u16 = 480;

/// Highest rack number that fits the remote TSAP encoding.
pub const MAX_RACK: u16 = 7;
/// Highest slot number that fits the remote TSAP encoding.
pub const MAX_SLOT: u16 = 31;

/// Connection type announced in the remote TSAP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionType {
    /// Programming device.
    #[default]
    Pg,
    /// Operator panel.
    Op,
    /// Generic S7 basic connection.
    Basic,
}

impl ConnectionType {
    /// Wire code placed in the high byte of the remote TSAP.
    pub fn code(self) -> u8 {
        match self {
            ConnectionType::Pg => 0x01,
            ConnectionType::Op => 0x02,
            ConnectionType::Basic => 0x03,
        }
    }
}

/// Computes the remote TSAP for a rack/slot pair.
///
/// # Errors
///
/// Returns `S7Error::InvalidParameter` if rack > 7 or slot > 31.
///
/// # Example
///
/// ```
/// use simatic_s7::{remote_tsap, ConnectionType};
///
/// // S7-300 CPU in rack 0, slot 2
/// assert_eq!(remote_tsap(ConnectionType::Pg, 0, 2).unwrap(), 0x0102);
/// ```
pub fn remote_tsap(connection_type: ConnectionType, rack: u16, slot: u16) -> Result<u16> {
    if rack > MAX_RACK {
        return Err(S7Error::invalid_parameter(
            "rack",
            format!("must not exceed {}", MAX_RACK),
        ));
    }
    if slot > MAX_SLOT {
        return Err(S7Error::invalid_parameter(
            "slot",
            format!("must not exceed {}", MAX_SLOT),
        ));
    }
    Ok(((connection_type.code() as u16) << 8) | (rack * 0x20 + slot))
}

fn job_header(pdu_ref: u16, param_len: u16, data_len: u16) -> [u8; S7_JOB_HEADER_SIZE] {
    let [ref_hi, ref_lo] = pdu_ref.to_be_bytes();
    let [par_hi, par_lo] = param_len.to_be_bytes();
    let [dat_hi, dat_lo] = data_len.to_be_bytes();
    [
        S7_PROTOCOL_ID,
        ROSCTR_JOB,
        0x00,
        0x00,
        ref_hi,
        ref_lo,
        par_hi,
        par_lo,
        dat_hi,
        dat_lo,
    ]
}

/// Builds the 12-byte variable specification for one DB item.
fn db_item(db_number: u16, start: u16, count: u16) -> [u8; 12] {
    let [cnt_hi, cnt_lo] = count.to_be_bytes();
    let [db_hi, db_lo] = db_number.to_be_bytes();
    let bit_address = (start as u32) << 3;
    [
        0x12, // variable specification
        0x0A, // length of following address specification
        0x10, // syntax id: S7ANY
        TRANSPORT_SIZE_BYTE,
        cnt_hi,
        cnt_lo,
        db_hi,
        db_lo,
        AREA_DB,
        ((bit_address >> 16) & 0xFF) as u8,
        ((bit_address >> 8) & 0xFF) as u8,
        (bit_address & 0xFF) as u8,
    ]
}

/// COTP connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionRequest {
    local_tsap: u16,
    remote_tsap: u16,
}

impl ConnectionRequest {
    /// Creates a connection request for the given rack and slot.
    ///
    /// # Errors
    ///
    /// Returns `S7Error::InvalidParameter` if rack or slot are out of range.
    pub fn new(connection_type: ConnectionType, rack: u16, slot: u16) -> Result<Self> {
        Ok(Self {
            local_tsap: LOCAL_TSAP,
            remote_tsap: remote_tsap(connection_type, rack, slot)?,
        })
    }

    /// Returns the remote TSAP.
    pub fn remote_tsap(&self) -> u16 {
        self.remote_tsap
    }

    /// Serializes the request.
    pub fn to_bytes(&self) -> Vec<u8> {
        let [loc_hi, loc_lo] = self.local_tsap.to_be_bytes();
        let [rem_hi, rem_lo] = self.remote_tsap.to_be_bytes();
        let cotp = [
            0x11, // length indicator
            COTP_CONNECTION_REQUEST,
            0x00,
            0x00, // destination reference
            0x00,
            0x01, // source reference
            0x00, // class 0
            0xC0,
            0x01,
            0x0A, // TPDU size 1024
            0xC1,
            0x02,
            loc_hi,
            loc_lo,
            0xC2,
            0x02,
            rem_hi,
            rem_lo,
        ];
        let len = TPKT_HEADER_SIZE + cotp.len();
        let mut bytes = Vec::with_capacity(len);
        bytes.extend_from_slice(&[0x03, 0x00, 0x00, len as u8]);
        bytes.extend_from_slice(&cotp);
        bytes
    }
}

/// S7 setup communication (PDU negotiation) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupCommunicationCommand {
    pdu_ref: u16,
    pdu_length: u16,
}

impl SetupCommunicationCommand {
    /// Creates a negotiation request asking for `pdu_length` bytes.
    pub fn new(pdu_ref: u16, pdu_length: u16) -> Self {
        Self {
            pdu_ref,
            pdu_length,
        }
    }

    /// Returns the PDU reference.
    pub fn pdu_ref(&self) -> u16 {
        self.pdu_ref
    }

    /// Serializes the command to a complete frame.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let [len_hi, len_lo] = self.pdu_length.to_be_bytes();
        let params = [
            FN_SETUP_COMMUNICATION,
            0x00,
            0x00,
            0x01, // max AmQ calling
            0x00,
            0x01, // max AmQ called
            len_hi,
            len_lo,
        ];
        let mut pdu = Vec::with_capacity(S7_JOB_HEADER_SIZE + params.len());
        pdu.extend_from_slice(&job_header(self.pdu_ref, params.len() as u16, 0));
        pdu.extend_from_slice(&params);
        wrap_data(&pdu)
    }
}

/// Read of `count` bytes from a data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadDbCommand {
    pdu_ref: u16,
    db_number: u16,
    start: u16,
    count: u16,
}

impl ReadDbCommand {
    /// Creates a read command.
    ///
    /// # Arguments
    ///
    /// * `pdu_ref` - Reference echoed by the controller
    /// * `db_number` - Data block number
    /// * `start` - Byte offset inside the block
    /// * `count` - Number of bytes (must be > 0)
    ///
    /// # Errors
    ///
    /// Returns `S7Error::InvalidParameter` if `count` is 0.
    pub fn new(pdu_ref: u16, db_number: u16, start: u16, count: u16) -> Result<Self> {
        if count == 0 {
            return Err(S7Error::invalid_parameter("count", "must be greater than 0"));
        }
        Ok(Self {
            pdu_ref,
            db_number,
            start,
            count,
        })
    }

    /// Returns the PDU reference.
    pub fn pdu_ref(&self) -> u16 {
        self.pdu_ref
    }

    /// Returns the number of bytes requested.
    pub fn count(&self) -> u16 {
        self.count
    }

    /// Serializes the command to a complete frame.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let item = db_item(self.db_number, self.start, self.count);
        let mut pdu = Vec::with_capacity(S7_JOB_HEADER_SIZE + 2 + item.len());
        pdu.extend_from_slice(&job_header(self.pdu_ref, 2 + item.len() as u16, 0));
        pdu.push(FN_READ_VAR);
        pdu.push(0x01); // item count
        pdu.extend_from_slice(&item);
        wrap_data(&pdu)
    }
}

/// Write of a byte payload to a data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteDbCommand {
    pdu_ref: u16,
    db_number: u16,
    start: u16,
    data: Vec<u8>,
}

impl WriteDbCommand {
    /// Creates a write command.
    ///
    /// # Errors
    ///
    /// Returns `S7Error::InvalidParameter` if `data` is empty or longer than
    /// 8191 bytes (the bit length must fit 16 bits).
    pub fn new(pdu_ref: u16, db_number: u16, start: u16, data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(S7Error::invalid_parameter("data", "must not be empty"));
        }
        if data.len() > (u16::MAX / 8) as usize {
            return Err(S7Error::invalid_parameter(
                "data",
                format!("must not exceed {} bytes per request", u16::MAX / 8),
            ));
        }
        Ok(Self {
            pdu_ref,
            db_number,
            start,
            data: data.to_vec(),
        })
    }

    /// Returns the PDU reference.
    pub fn pdu_ref(&self) -> u16 {
        self.pdu_ref
    }

    /// Serializes the command to a complete frame.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let count = self.data.len() as u16;
        let item = db_item(self.db_number, self.start, count);
        let [bits_hi, bits_lo] = (count * 8).to_be_bytes();
        let data_len = 4 + count;

        let mut pdu = Vec::with_capacity(S7_JOB_HEADER_SIZE + 2 + item.len() + data_len as usize);
        pdu.extend_from_slice(&job_header(self.pdu_ref, 2 + item.len() as u16, data_len));
        pdu.push(FN_WRITE_VAR);
        pdu.push(0x01);
        pdu.extend_from_slice(&item);
        pdu.extend_from_slice(&[0x00, DATA_TRANSPORT_BYTES, bits_hi, bits_lo]);
        pdu.extend_from_slice(&self.data);
        wrap_data(&pdu)
    }
}
