//! Host name resolution.
//!
//! The controller is addressed over IPv4 only. A literal dotted-quad is used
//! as is; anything else goes through the system resolver and the first IPv4
//! answer wins. Nothing is cached, so every `connect` resolves again.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs};

use tracing::debug;

use crate::error::{Result, S7Error};

/// Resolves `host` and `port` to an IPv4 socket address.
///
/// # Errors
///
/// Returns [`S7Error::Resolution`] if the host is empty, cannot be looked up,
/// or only resolves to IPv6 addresses.
///
/// # Example
///
/// ```
/// use simatic_s7::resolve;
/// use std::net::{Ipv4Addr, SocketAddrV4};
///
/// let addr = resolve("192.168.0.1", 102).unwrap();
/// assert_eq!(addr, SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, 1), 102));
/// ```
pub fn resolve(host: &str, port: u16) -> Result<SocketAddrV4> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(SocketAddrV4::new(ip, port));
    }
    if host.is_empty() {
        return Err(S7Error::resolution(host));
    }

    let candidates = (host, port)
        .to_socket_addrs()
        .map_err(|_| S7Error::resolution(host))?;

    let addr = candidates
        .filter_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| S7Error::resolution(host))?;

    debug!(host, %addr, "resolved controller host");
    Ok(addr)
}
