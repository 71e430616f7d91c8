//! Example: reading and writing a data block
//!
//! Run with: cargo run --example read_block -- <host> [slot] [db]
//!
//! Set `RUST_LOG=simatic_s7=debug` to see the handshake and every request.

use std::env;
use std::time::Duration;

use simatic_s7::{BitString, Client, ClientConfig, S7Error};
use tracing_subscriber::EnvFilter;

fn main() -> simatic_s7::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "192.168.0.10".to_string());
    let slot = args.next().and_then(|s| s.parse().ok()).unwrap_or(2);
    let db = args.next().and_then(|s| s.parse().ok()).unwrap_or(1);

    let config = ClientConfig::new(host, slot).with_timeout(Duration::from_secs(2));
    let mut client = Client::with_config(config);
    client.connect()?;
    println!("connected, pdu length {:?}", client.pdu_length());

    // Bitstream view: character i*8+j is bit j of byte i
    let bits: BitString = client.fetch(db, 4)?;
    println!("DB{db}.DBB0..3 = {bits}");
    for (index, c) in bits.as_str().char_indices().filter(|&(_, c)| c == '1') {
        println!("  DBX{}.{} = {}", index / 8, index % 8, c);
    }

    // Flip the first byte and write it back
    let mut bytes = bits.to_bytes();
    bytes[0] = !bytes[0];
    match client.send(db, &bytes[..1]) {
        Ok(written) => println!("write acknowledged: {written}"),
        Err(S7Error::Write { code }) => println!("write refused: 0x{code:04X}"),
        Err(e) => return Err(e),
    }

    client.disconnect();
    Ok(())
}
