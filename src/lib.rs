//! # Siemens S7 Client Library
//!
//! A Rust library for reading and writing data blocks on Siemens S7
//! controllers over ISO-on-TCP (RFC 1006, TCP port 102).
//!
//! The client resolves the controller address, opens a keepalive TCP
//! connection, performs the COTP connect and S7 PDU negotiation, and then
//! reads or writes bytes at offset 0 of numbered data blocks. Read results
//! are handed to the caller as an LSB-first ASCII bitstream.
//!
//! ## Features
//!
//! - **Blocking and explicit**: one request, one response, no hidden retries or reconnection
//! - **State tracked**: `Disconnected`, `Connecting`, `Connected`, `Faulted`
//! - **Signal-safe I/O**: `SIGVTALRM` is held pending for the duration of every socket round trip
//! - **No panics**: all errors returned as `Result<T, S7Error>`
//! - **Chunked transfers**: large reads and writes are split to the negotiated PDU size
//!
//! ## Quick Start
//!
//! ```no_run
//! use simatic_s7::{BitString, Client};
//!
//! fn main() -> simatic_s7::Result<()> {
//!     // Rack 0, slot 2 on the default port
//!     let mut client = Client::new("192.168.0.10", 102, 2);
//!     client.connect()?;
//!
//!     // First 4 bytes of DB 1, one character per bit
//!     let bits: BitString = client.fetch(1, 4)?;
//!     println!("DB1 = {bits}");
//!
//!     // Overwrite the first 2 bytes of DB 1
//!     client.send(1, &[0x12, 0x34])?;
//!
//!     client.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! ## Bit Order
//!
//! Character `i * 8 + j` of a [`BitString`] is bit `j` (LSB = 0) of byte `i`:
//!
//! | Bytes | Bitstream |
//! |-------|-----------|
//! | `05` | `10100000` |
//! | `01 80` | `1000000000000001` |
//!
//! Callers plug in their own memory map by implementing [`MemoryMap`].
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, S7Error>`]. Protocol rejections keep the
//! session alive; transport failures fault it.
//!
//! ```no_run
//! use simatic_s7::{BitString, Client, S7Error};
//!
//! let mut client = Client::new("192.168.0.10", 102, 2);
//! client.connect()?;
//!
//! match client.fetch::<BitString>(99, 8) {
//!     Ok(bits) => println!("DB99 = {bits}"),
//!     Err(S7Error::Read { code }) => println!("controller refused: 0x{code:04X}"),
//!     Err(S7Error::Timeout) => println!("no answer, connected = {}", client.connected()),
//!     Err(e) => println!("Error: {}", e),
//! }
//! # Ok::<(), S7Error>(())
//! ```
//!
//! ## Configuration
//!
//! ```no_run
//! use simatic_s7::{Client, ClientConfig, ConnectionType};
//! use std::time::Duration;
//!
//! let config = ClientConfig::new("plc.local", 1)
//!     .with_port(102)                              // default: 102
//!     .with_rack(0)                                // default: 0
//!     .with_timeout(Duration::from_secs(2))        // default: 5s
//!     .with_connection_type(ConnectionType::Op);   // default: PG
//! let client = Client::with_config(config);
//! ```
//!
//! With the `serde` feature, [`ClientConfig`] can be embedded in an
//! application's own configuration file.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod client;
mod command;
mod error;
mod guard;
mod header;
mod memory;
mod resolver;
mod response;
mod session;
mod transport;
pub mod utils;

// Public re-exports
pub use client::{Client, ClientConfig};
pub use command::{
    remote_tsap, ConnectionRequest, ConnectionType, ReadDbCommand, SetupCommunicationCommand,
    WriteDbCommand, LOCAL_TSAP, MAX_RACK, MAX_SLOT, REQUESTED_PDU_LENGTH, S7_JOB_HEADER_SIZE,
};
pub use error::{ConnectStep, Result, S7Error};
pub use guard::SignalGuard;
pub use header::{
    unwrap_data, wrap_data, TpktHeader, COTP_CONNECTION_CONFIRM, COTP_CONNECTION_REQUEST,
    COTP_DATA, COTP_DATA_HEADER_SIZE, TPKT_HEADER_SIZE, TPKT_VERSION,
};
pub use memory::{BitString, MemoryMap};
pub use resolver::resolve;
pub use response::{check_connection_confirm, S7Response, RETURN_CODE_SUCCESS, S7_ACK_HEADER_SIZE};
pub use session::{Session, SessionState};
pub use transport::{TcpTransport, DEFAULT_PORT, DEFAULT_TIMEOUT};
