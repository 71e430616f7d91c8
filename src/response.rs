//! S7 response parsing and validation.
//!
//! # Ack-Data Header Structure
//!
//! | Byte | Field | Description |
//! |------|-------|-------------|
//! | 0 | Protocol ID | Always 0x32 |
//! | 1 | ROSCTR | 0x03 (ack with data) or 0x02 (ack) |
//! | 2-3 | Redundancy | Unused |
//! | 4-5 | PDU reference | Echo of the request reference |
//! | 6-7 | Parameter length | |
//! | 8-9 | Data length | |
//! | 10 | Error class | 0x00 = success |
//! | 11 | Error code | 0x00 = success |
//!
//! # Error Codes
//!
//! Two levels of failure exist. A non-zero header error (class, code) rejects
//! the whole job and is reported as `(class << 8) | code`. Otherwise each data
//! item carries its own return code where `0xFF` means success; any other
//! value (e.g. `0x05` invalid address, `0x0A` object does not exist) is
//! reported as is.
//!
//! # Example
//!
//! ```
//! use simatic_s7::S7Response;
//!
//! let pdu = [
//!     0x32, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x06, 0x00, 0x00, // header
//!     0x04, 0x01, // read var, 1 item
//!     0xFF, 0x04, 0x00, 0x10, 0x12, 0x34, // item: success, 16 bits
//! ];
//!
//! let response = S7Response::from_pdu(&pdu).unwrap();
//! assert_eq!(response.read_payload(2).unwrap(), vec![0x12, 0x34]);
//! ```

use crate::command::{
    FN_READ_VAR, FN_SETUP_COMMUNICATION, FN_WRITE_VAR, ROSCTR_ACK_DATA, S7_PROTOCOL_ID,
};
use crate::error::{ConnectStep, Result, S7Error};
use crate::header::COTP_CONNECTION_CONFIRM;

/// Ack-data header size in bytes.
pub const S7_ACK_HEADER_SIZE: usize = 12;

/// ROSCTR: acknowledgement without data (carries only an error).
const ROSCTR_ACK: u8 = 0x02;

/// Item return code for success.
pub const RETURN_CODE_SUCCESS: u8 = 0xFF;

/// Parsed S7 ack-data response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S7Response {
    /// Message type.
    pub rosctr: u8,
    /// Echoed PDU reference.
    pub pdu_ref: u16,
    /// Header error class (0x00 = success).
    pub error_class: u8,
    /// Header error code (0x00 = success).
    pub error_code: u8,
    /// Parameter block.
    pub params: Vec<u8>,
    /// Data block.
    pub data: Vec<u8>,
}

impl S7Response {
    /// Parses an S7 PDU (the bytes following the COTP header).
    ///
    /// # Errors
    ///
    /// Returns `S7Error::InvalidResponse` if the PDU is truncated, carries a
    /// foreign protocol id, or is not an ack-data message.
    pub fn from_pdu(pdu: &[u8]) -> Result<Self> {
        if pdu.len() < S7_ACK_HEADER_SIZE {
            return Err(S7Error::invalid_response(format!(
                "s7 header too short: expected at least {} bytes, got {}",
                S7_ACK_HEADER_SIZE,
                pdu.len()
            )));
        }
        if pdu[0] != S7_PROTOCOL_ID {
            return Err(S7Error::invalid_response(format!(
                "unexpected protocol id 0x{:02X}",
                pdu[0]
            )));
        }
        if pdu[1] != ROSCTR_ACK_DATA && pdu[1] != ROSCTR_ACK {
            return Err(S7Error::invalid_response(format!(
                "unexpected rosctr 0x{:02X}",
                pdu[1]
            )));
        }

        let param_len = u16::from_be_bytes([pdu[6], pdu[7]]) as usize;
        let data_len = u16::from_be_bytes([pdu[8], pdu[9]]) as usize;
        let body = &pdu[S7_ACK_HEADER_SIZE..];
        if body.len() < param_len + data_len {
            return Err(S7Error::invalid_response(format!(
                "s7 body truncated: announced {} bytes, got {}",
                param_len + data_len,
                body.len()
            )));
        }

        Ok(Self {
            rosctr: pdu[1],
            pdu_ref: u16::from_be_bytes([pdu[4], pdu[5]]),
            error_class: pdu[10],
            error_code: pdu[11],
            params: body[..param_len].to_vec(),
            data: body[param_len..param_len + data_len].to_vec(),
        })
    }

    /// Returns the header-level error as `(class << 8) | code`, if any.
    pub fn header_error(&self) -> Option<u16> {
        if self.error_class == 0 && self.error_code == 0 {
            None
        } else {
            Some(u16::from_be_bytes([self.error_class, self.error_code]))
        }
    }

    /// Validates the PDU reference matches the request.
    ///
    /// # Errors
    ///
    /// Returns `S7Error::PduRefMismatch` if it doesn't.
    pub fn check_pdu_ref(&self, expected: u16) -> Result<()> {
        if self.pdu_ref == expected {
            Ok(())
        } else {
            Err(S7Error::pdu_ref_mismatch(expected, self.pdu_ref))
        }
    }

    fn check_function(&self, function: u8) -> Result<()> {
        match self.params.first() {
            Some(&f) if f == function => Ok(()),
            Some(&f) => Err(S7Error::invalid_response(format!(
                "expected function 0x{:02X}, got 0x{:02X}",
                function, f
            ))),
            None => Err(S7Error::invalid_response("missing parameter block")),
        }
    }

    /// Extracts the PDU length granted by a setup communication response.
    ///
    /// # Errors
    ///
    /// `S7Error::Connect` at [`ConnectStep::Negotiate`] if the controller
    /// refused or granted a zero length; `S7Error::InvalidResponse` if the
    /// parameter block is malformed.
    pub fn negotiated_pdu_length(&self) -> Result<u16> {
        if let Some(code) = self.header_error() {
            return Err(S7Error::Connect {
                step: ConnectStep::Negotiate,
                code: code as i32,
            });
        }
        self.check_function(FN_SETUP_COMMUNICATION)?;
        if self.params.len() < 8 {
            return Err(S7Error::invalid_response("setup communication parameters too short"));
        }
        let length = u16::from_be_bytes([self.params[6], self.params[7]]);
        if length == 0 {
            return Err(S7Error::Connect {
                step: ConnectStep::Negotiate,
                code: 0,
            });
        }
        Ok(length)
    }

    /// Extracts the bytes of a single-item read.
    ///
    /// # Errors
    ///
    /// `S7Error::Read` with the protocol code if the job or the item was
    /// rejected; `S7Error::InvalidResponse` if fewer than `expected` bytes
    /// came back.
    pub fn read_payload(&self, expected: usize) -> Result<Vec<u8>> {
        if let Some(code) = self.header_error() {
            return Err(S7Error::Read { code });
        }
        self.check_function(FN_READ_VAR)?;
        if self.data.is_empty() {
            return Err(S7Error::invalid_response("missing read data item"));
        }
        let return_code = self.data[0];
        if return_code != RETURN_CODE_SUCCESS {
            return Err(S7Error::Read {
                code: return_code as u16,
            });
        }
        if self.data.len() < 4 {
            return Err(S7Error::invalid_response("read data item header too short"));
        }

        let transport_size = self.data[1];
        let raw_len = u16::from_be_bytes([self.data[2], self.data[3]]) as usize;
        let byte_len = match transport_size {
            // BIT: length is 1 bit carried in one byte
            0x03 => raw_len.div_ceil(8),
            // BYTE/WORD/DWORD and INTEGER: length in bits
            0x04 | 0x05 => raw_len / 8,
            // REAL and OCTET STRING: length in bytes
            _ => raw_len,
        };

        let payload = &self.data[4..];
        if byte_len < expected || payload.len() < expected {
            return Err(S7Error::invalid_response(format!(
                "read returned {} bytes, expected {}",
                byte_len.min(payload.len()),
                expected
            )));
        }
        Ok(payload[..expected].to_vec())
    }

    /// Checks the result of a single-item write.
    ///
    /// # Errors
    ///
    /// `S7Error::Write` with the protocol code if the job or the item was
    /// rejected; `S7Error::InvalidResponse` if the item is missing.
    pub fn check_write(&self) -> Result<()> {
        if let Some(code) = self.header_error() {
            return Err(S7Error::Write { code });
        }
        self.check_function(FN_WRITE_VAR)?;
        match self.data.first() {
            Some(&RETURN_CODE_SUCCESS) => Ok(()),
            Some(&code) => Err(S7Error::Write { code: code as u16 }),
            None => Err(S7Error::invalid_response("missing write return code")),
        }
    }
}

/// Validates a COTP connection confirm (the TPKT payload).
///
/// # Errors
///
/// `S7Error::Connect` at [`ConnectStep::IsoConnect`] carrying the received
/// PDU type (e.g. `0x80` for a disconnect request) when the controller did
/// not confirm.
pub fn check_connection_confirm(payload: &[u8]) -> Result<()> {
    match payload.get(1) {
        Some(&COTP_CONNECTION_CONFIRM) => Ok(()),
        Some(&pdu_type) => Err(S7Error::Connect {
            step: ConnectStep::IsoConnect,
            code: pdu_type as i32,
        }),
        None => Err(S7Error::Connect {
            step: ConnectStep::IsoConnect,
            code: -1,
        }),
    }
}
