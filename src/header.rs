//! TPKT and COTP headers for ISO-on-TCP.
//!
//! Every frame on the wire starts with a 4-byte TPKT header (RFC 1006)
//! followed by a COTP header (ISO 8073). S7 PDUs travel inside COTP data
//! TPDUs.
//!
//! # TPKT Header Structure
//!
//! | Byte | Field | Description |
//! |------|-------|-------------|
//! | 0 | Version | Always 0x03 |
//! | 1 | Reserved | Always 0x00 |
//! | 2-3 | Length | Frame length including this header (big-endian) |
//!
//! # COTP Data Header
//!
//! | Byte | Field | Description |
//! |------|-------|-------------|
//! | 0 | Length indicator | 0x02 |
//! | 1 | PDU type | 0xF0 (DT data) |
//! | 2 | TPDU number | 0x80 (last data unit) |
//!
//! # Example
//!
//! ```
//! use simatic_s7::{TpktHeader, TPKT_HEADER_SIZE};
//!
//! let header = TpktHeader::new(22).unwrap();
//! assert_eq!(header.to_bytes(), [0x03, 0x00, 0x00, 0x16]);
//! assert_eq!(TPKT_HEADER_SIZE, 4);
//! ```

use crate::error::{Result, S7Error};

/// TPKT header size in bytes.
pub const TPKT_HEADER_SIZE: usize = 4;

/// TPKT protocol version (RFC 1006).
pub const TPKT_VERSION: u8 = 0x03;

/// COTP data header size in bytes.
pub const COTP_DATA_HEADER_SIZE: usize = 3;

/// COTP connection request PDU type.
pub const COTP_CONNECTION_REQUEST: u8 = 0xE0;
/// COTP connection confirm PDU type.
pub const COTP_CONNECTION_CONFIRM: u8 = 0xD0;
/// COTP data PDU type.
pub const COTP_DATA: u8 = 0xF0;
/// COTP "last data unit" flag.
const COTP_EOT: u8 = 0x80;

/// TPKT header preceding every ISO-on-TCP frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TpktHeader {
    /// Total frame length, header included.
    pub length: u16,
}

impl TpktHeader {
    /// Creates a header for a frame of `frame_len` bytes (header included).
    ///
    /// # Errors
    ///
    /// Returns `S7Error::InvalidParameter` if the length does not fit the
    /// 16-bit length field or is shorter than the header itself.
    pub fn new(frame_len: usize) -> Result<Self> {
        if frame_len < TPKT_HEADER_SIZE || frame_len > u16::MAX as usize {
            return Err(S7Error::invalid_parameter(
                "frame_len",
                format!(
                    "must be between {} and {} bytes, got {}",
                    TPKT_HEADER_SIZE,
                    u16::MAX,
                    frame_len
                ),
            ));
        }
        Ok(Self {
            length: frame_len as u16,
        })
    }

    /// Serializes the header.
    pub fn to_bytes(self) -> [u8; TPKT_HEADER_SIZE] {
        let [hi, lo] = self.length.to_be_bytes();
        [TPKT_VERSION, 0x00, hi, lo]
    }

    /// Parses a header.
    ///
    /// # Errors
    ///
    /// Returns `S7Error::InvalidResponse` if the slice is too short, the
    /// version byte is wrong, or the announced length is shorter than the header.
    ///
    /// # Example
    ///
    /// ```
    /// use simatic_s7::TpktHeader;
    ///
    /// let header = TpktHeader::from_bytes(&[0x03, 0x00, 0x00, 0x1B]).unwrap();
    /// assert_eq!(header.payload_len(), 23);
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < TPKT_HEADER_SIZE {
            return Err(S7Error::invalid_response(format!(
                "tpkt header too short: expected {} bytes, got {}",
                TPKT_HEADER_SIZE,
                data.len()
            )));
        }
        if data[0] != TPKT_VERSION {
            return Err(S7Error::invalid_response(format!(
                "unexpected tpkt version 0x{:02X}",
                data[0]
            )));
        }
        let length = u16::from_be_bytes([data[2], data[3]]);
        if (length as usize) < TPKT_HEADER_SIZE {
            return Err(S7Error::invalid_response(format!(
                "tpkt length {} shorter than header",
                length
            )));
        }
        Ok(Self { length })
    }

    /// Number of bytes following the TPKT header.
    pub fn payload_len(self) -> usize {
        self.length as usize - TPKT_HEADER_SIZE
    }
}

/// Wraps an S7 PDU into a TPKT + COTP data frame.
///
/// # Errors
///
/// Returns `S7Error::InvalidParameter` if the frame would exceed 65535 bytes.
pub fn wrap_data(pdu: &[u8]) -> Result<Vec<u8>> {
    let frame_len = TPKT_HEADER_SIZE + COTP_DATA_HEADER_SIZE + pdu.len();
    let tpkt = TpktHeader::new(frame_len)?;

    let mut frame = Vec::with_capacity(frame_len);
    frame.extend_from_slice(&tpkt.to_bytes());
    frame.extend_from_slice(&[0x02, COTP_DATA, COTP_EOT]);
    frame.extend_from_slice(pdu);
    Ok(frame)
}

/// Strips the COTP data header from a TPKT payload and returns the S7 PDU.
///
/// # Errors
///
/// Returns `S7Error::InvalidResponse` if the payload is not a complete COTP
/// data unit.
pub fn unwrap_data(payload: &[u8]) -> Result<&[u8]> {
    if payload.len() < COTP_DATA_HEADER_SIZE {
        return Err(S7Error::invalid_response("cotp header too short"));
    }
    if payload[1] != COTP_DATA {
        return Err(S7Error::invalid_response(format!(
            "expected cotp data pdu, got type 0x{:02X}",
            payload[1]
        )));
    }
    if payload[2] & COTP_EOT == 0 {
        return Err(S7Error::invalid_response("fragmented cotp data unit"));
    }
    let header_len = payload[0] as usize + 1;
    if header_len > payload.len() {
        return Err(S7Error::invalid_response("cotp length indicator exceeds frame"));
    }
    Ok(&payload[header_len..])
}
