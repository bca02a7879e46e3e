//! Connect and bind endpoints for streamer instances.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("cannot advance {ip} by {by}: last octet would exceed 255")]
    AddressExhausted { ip: Ipv4Addr, by: usize },

    #[error("cannot advance port {port} by {by}: would exceed 65535")]
    PortExhausted { port: u16, by: usize },
}

/// Add `by` to the fourth octet of `ip`.
pub fn increment_ip(ip: Ipv4Addr, by: usize) -> Result<Ipv4Addr, EndpointError> {
    let [a, b, c, d] = ip.octets();
    let d = u8::try_from(d as usize + by).map_err(|_| EndpointError::AddressExhausted { ip, by })?;
    Ok(Ipv4Addr::new(a, b, c, d))
}

/// Add `by` to a port number.
pub fn increment_port(port: u16, by: usize) -> Result<u16, EndpointError> {
    u16::try_from(port as usize + by).map_err(|_| EndpointError::PortExhausted { port, by })
}

/// Destination address and port of one streamer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Endpoint of the instance at `offset` (0-based), advancing the address
    /// and/or port by the offset when the matching toggle is set.
    pub fn offset(
        &self,
        offset: usize,
        advance_ip: bool,
        advance_port: bool,
    ) -> Result<Self, EndpointError> {
        let ip = if advance_ip {
            increment_ip(self.ip, offset)?
        } else {
            self.ip
        };
        let port = if advance_port {
            increment_port(self.port, offset)?
        } else {
            self.port
        };
        Ok(Self { ip, port })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Local bind address and port. Either part may be absent; a zero port
/// counts as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindTarget {
    pub ip: Option<Ipv4Addr>,
    pub port: Option<u16>,
}

impl BindTarget {
    /// The `@ip` / `:port` suffix appended to the connect endpoint.
    pub fn suffix(&self) -> String {
        let mut out = String::new();
        if let Some(ip) = self.ip {
            out.push('@');
            out.push_str(&ip.to_string());
        }
        if let Some(port) = self.port.filter(|&p| p != 0) {
            out.push(':');
            out.push_str(&port.to_string());
        }
        out
    }
}
