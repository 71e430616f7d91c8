//! Error types for the S7 client.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for S7 operations.
pub type Result<T> = std::result::Result<T, S7Error>;

/// The setup step at which [`S7Error::Connect`] was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectStep {
    /// Creating the TCP socket.
    Socket,
    /// Establishing the TCP connection.
    Connect,
    /// Enabling `SO_KEEPALIVE`.
    Keepalive,
    /// Applying the read/write timeout.
    Timeout,
    /// COTP connection request (rack/slot TSAP exchange).
    IsoConnect,
    /// S7 setup communication (PDU length negotiation).
    Negotiate,
}

impl fmt::Display for ConnectStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectStep::Socket => "socket",
            ConnectStep::Connect => "connect",
            ConnectStep::Keepalive => "keepalive",
            ConnectStep::Timeout => "timeout",
            ConnectStep::IsoConnect => "iso connect",
            ConnectStep::Negotiate => "pdu negotiation",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during S7 communication.
#[derive(Debug, Error)]
pub enum S7Error {
    /// Host is neither an IPv4 literal nor resolvable to an IPv4 address.
    #[error("Cannot resolve host '{host}' to an IPv4 address")]
    Resolution {
        /// Host string as given by the caller.
        host: String,
    },

    /// Session setup failed.
    ///
    /// `code` is the OS error code for socket-level steps and the protocol
    /// code for handshake steps (`-1` when none is available).
    #[error("Connection failed at {step}: code {code}")]
    Connect {
        /// Step that failed.
        step: ConnectStep,
        /// OS or protocol error code.
        code: i32,
    },

    /// The controller rejected a data block read.
    #[error("Read failed: return code 0x{code:04X}")]
    Read {
        /// Protocol return code.
        code: u16,
    },

    /// The controller rejected a data block write.
    #[error("Write failed: return code 0x{code:04X}")]
    Write {
        /// Protocol return code.
        code: u16,
    },

    /// Operation requires a connected session.
    #[error("Not connected")]
    NotConnected,

    /// `connect` called on a client that already holds a session.
    #[error("Already connected")]
    AlreadyConnected,

    /// Invalid parameter provided.
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// Malformed frame received from the controller.
    #[error("Invalid response: {reason}")]
    InvalidResponse {
        /// Description of the response error.
        reason: String,
    },

    /// PDU reference of the response does not match the request.
    #[error("PDU reference mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    PduRefMismatch {
        /// Reference sent with the request.
        expected: u16,
        /// Reference carried by the response.
        received: u16,
    },

    /// Communication timeout.
    #[error("Communication timeout")]
    Timeout,

    /// The controller closed the TCP connection.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// I/O error during communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl S7Error {
    /// Creates a new `Resolution` error.
    pub fn resolution(host: impl Into<String>) -> Self {
        Self::Resolution { host: host.into() }
    }

    /// Creates a `Connect` error from an I/O error, keeping its OS code.
    ///
    /// # Example
    ///
    /// ```
    /// use simatic_s7::{ConnectStep, S7Error};
    /// use std::io;
    ///
    /// let err = S7Error::connect_io(ConnectStep::Connect, &io::Error::from_raw_os_error(111));
    /// assert!(matches!(err, S7Error::Connect { code: 111, .. }));
    /// ```
    pub fn connect_io(step: ConnectStep, err: &io::Error) -> Self {
        Self::Connect {
            step,
            code: err.raw_os_error().unwrap_or(-1),
        }
    }

    /// Creates a new `InvalidParameter` error.
    ///
    /// # Example
    ///
    /// ```
    /// use simatic_s7::S7Error;
    ///
    /// let err = S7Error::invalid_parameter("byte_count", "must be greater than 0");
    /// ```
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidResponse` error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Creates a new `PduRefMismatch` error.
    pub fn pdu_ref_mismatch(expected: u16, received: u16) -> Self {
        Self::PduRefMismatch { expected, received }
    }

    /// Returns whether this error leaves the byte stream in an unknown state.
    ///
    /// Protocol rejections (`Read`, `Write`) and argument errors keep the
    /// session usable; everything raised by the transport or the framer does not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            S7Error::Timeout
                | S7Error::ConnectionClosed
                | S7Error::Io(_)
                | S7Error::InvalidResponse { .. }
                | S7Error::PduRefMismatch { .. }
        )
    }

    /// Maps an I/O error from a blocking socket call onto the S7 taxonomy.
    pub(crate) fn from_transfer(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => S7Error::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => S7Error::ConnectionClosed,
            _ => S7Error::Io(err),
        }
    }
}
