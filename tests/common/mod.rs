//! Simulated S7 controller for integration tests.
//!
//! Speaks just enough ISO-on-TCP to serve COTP connect, setup communication,
//! and single-item DB read/write jobs against an in-memory block table.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Item return code: object does not exist.
pub const OBJECT_MISSING: u8 = 0x0A;

/// How the controller misbehaves, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Answers every job.
    Normal,
    /// Answers the COTP connection request with a disconnect request.
    RejectConnect,
    /// Closes the socket when the n-th data job (1-based) arrives.
    HangUpOnJob(usize),
}

/// Builder for a simulated controller.
pub struct Controller {
    pdu_length: u16,
    mode: Mode,
    reply_delay: Duration,
    blocks: HashMap<u16, Vec<u8>>,
}

/// Handle to a running controller.
pub struct Running {
    pub port: u16,
    blocks: Arc<Mutex<HashMap<u16, Vec<u8>>>>,
    jobs: Arc<AtomicUsize>,
}

impl Running {
    /// Current contents of a data block.
    pub fn block(&self, db: u16) -> Option<Vec<u8>> {
        self.blocks.lock().unwrap().get(&db).cloned()
    }

    /// Number of read/write jobs received across all connections.
    pub fn jobs(&self) -> usize {
        self.jobs.load(Ordering::SeqCst)
    }
}

impl Controller {
    pub fn new() -> Self {
        Self {
            pdu_length: 480,
            mode: Mode::Normal,
            reply_delay: Duration::ZERO,
            blocks: HashMap::new(),
        }
    }

    pub fn with_block(mut self, db: u16, bytes: Vec<u8>) -> Self {
        self.blocks.insert(db, bytes);
        self
    }

    pub fn with_pdu_length(mut self, pdu_length: u16) -> Self {
        self.pdu_length = pdu_length;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    /// Binds to an ephemeral port and serves connections one at a time.
    pub fn spawn(self) -> Running {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let blocks = Arc::new(Mutex::new(self.blocks));
        let jobs = Arc::new(AtomicUsize::new(0));

        let server = Server {
            pdu_length: self.pdu_length,
            mode: self.mode,
            reply_delay: self.reply_delay,
            blocks: Arc::clone(&blocks),
            jobs: Arc::clone(&jobs),
        };
        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => server.serve(stream),
                    Err(_) => break,
                }
            }
        });

        Running { port, blocks, jobs }
    }
}

struct Server {
    pdu_length: u16,
    mode: Mode,
    reply_delay: Duration,
    blocks: Arc<Mutex<HashMap<u16, Vec<u8>>>>,
    jobs: Arc<AtomicUsize>,
}

impl Server {
    fn serve(&self, mut stream: TcpStream) {
        let mut connection_jobs = 0usize;
        while let Some(payload) = read_frame(&mut stream) {
            let reply = match payload.get(1) {
                Some(0xE0) if self.mode == Mode::RejectConnect => {
                    // disconnect request, reason 0x01
                    vec![0x03, 0x00, 0x00, 0x0B, 0x06, 0x80, 0x00, 0x00, 0x00, 0x01, 0x01]
                }
                Some(0xE0) => connection_confirm(),
                Some(0xF0) => {
                    let pdu = &payload[3..];
                    if pdu.get(10) != Some(&0xF0) {
                        connection_jobs += 1;
                        self.jobs.fetch_add(1, Ordering::SeqCst);
                        if self.mode == Mode::HangUpOnJob(connection_jobs) {
                            return;
                        }
                    }
                    match self.handle_job(pdu) {
                        Some(reply) => reply,
                        None => return,
                    }
                }
                _ => return,
            };

            if !self.reply_delay.is_zero() {
                thread::sleep(self.reply_delay);
            }
            if stream.write_all(&reply).is_err() {
                return;
            }
        }
    }

    fn handle_job(&self, pdu: &[u8]) -> Option<Vec<u8>> {
        let pdu_ref = u16::from_be_bytes([pdu[4], pdu[5]]);
        match pdu[10] {
            0xF0 => {
                let mut params = vec![0xF0, 0x00, 0x00, 0x01, 0x00, 0x01];
                params.extend_from_slice(&self.pdu_length.to_be_bytes());
                Some(ack(pdu_ref, &params, &[]))
            }
            0x04 => {
                let (db, start, count) = parse_item(&pdu[12..24]);
                let blocks = self.blocks.lock().unwrap();
                let data = match blocks.get(&db) {
                    Some(bytes) if start + count <= bytes.len() => {
                        let mut data = vec![0xFF, 0x04];
                        data.extend_from_slice(&((count * 8) as u16).to_be_bytes());
                        data.extend_from_slice(&bytes[start..start + count]);
                        data
                    }
                    _ => vec![OBJECT_MISSING, 0x00, 0x00, 0x00],
                };
                Some(ack(pdu_ref, &[0x04, 0x01], &data))
            }
            0x05 => {
                let (db, start, count) = parse_item(&pdu[12..24]);
                let payload = &pdu[28..28 + count];
                let mut blocks = self.blocks.lock().unwrap();
                let code = match blocks.get_mut(&db) {
                    Some(bytes) if start + count <= bytes.len() => {
                        bytes[start..start + count].copy_from_slice(payload);
                        0xFF
                    }
                    _ => OBJECT_MISSING,
                };
                Some(ack(pdu_ref, &[0x05, 0x01], &[code]))
            }
            _ => None,
        }
    }
}

/// Returns `(db, start byte, byte count)` of a variable specification.
fn parse_item(item: &[u8]) -> (u16, usize, usize) {
    let count = u16::from_be_bytes([item[4], item[5]]) as usize;
    let db = u16::from_be_bytes([item[6], item[7]]);
    let bit_address = u32::from_be_bytes([0, item[9], item[10], item[11]]);
    (db, (bit_address >> 3) as usize, count)
}

/// Reads one TPKT frame and returns its payload; `None` on EOF.
fn read_frame(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).ok()?;
    let len = u16::from_be_bytes([header[2], header[3]]) as usize;
    let mut payload = vec![0u8; len.checked_sub(4)?];
    stream.read_exact(&mut payload).ok()?;
    Some(payload)
}

fn connection_confirm() -> Vec<u8> {
    let cotp = [
        0x11, 0xD0, 0x00, 0x01, 0x00, 0x01, 0x00, 0xC0, 0x01, 0x0A, 0xC1, 0x02, 0x01, 0x00, 0xC2,
        0x02, 0x01, 0x02,
    ];
    tpkt(&cotp)
}

fn ack(pdu_ref: u16, params: &[u8], data: &[u8]) -> Vec<u8> {
    let mut cotp = vec![0x02, 0xF0, 0x80, 0x32, 0x03, 0x00, 0x00];
    cotp.extend_from_slice(&pdu_ref.to_be_bytes());
    cotp.extend_from_slice(&(params.len() as u16).to_be_bytes());
    cotp.extend_from_slice(&(data.len() as u16).to_be_bytes());
    cotp.extend_from_slice(&[0x00, 0x00]);
    cotp.extend_from_slice(params);
    cotp.extend_from_slice(data);
    tpkt(&cotp)
}

fn tpkt(payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x03, 0x00];
    frame.extend_from_slice(&((payload.len() + 4) as u16).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}
