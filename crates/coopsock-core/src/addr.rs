//! IPv4 socket addresses

use core::fmt;
use core::str::FromStr;
use std::net::{Ipv4Addr, SocketAddrV4};

use crate::byteorder::htonl;

/// An `AF_INET` endpoint: address plus port, both in host order
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SockAddrIn {
    pub addr: Ipv4Addr,
    pub port: u16,
}

impl SockAddrIn {
    /// `0.0.0.0:0`
    pub const UNSPECIFIED: SockAddrIn = SockAddrIn {
        addr: Ipv4Addr::UNSPECIFIED,
        port: 0,
    };

    #[inline]
    pub const fn new(addr: Ipv4Addr, port: u16) -> Self {
        Self { addr, port }
    }

    /// Loopback address with the given port
    #[inline]
    pub const fn localhost(port: u16) -> Self {
        Self::new(Ipv4Addr::LOCALHOST, port)
    }

    /// Same address, different port
    #[inline]
    pub const fn with_port(self, port: u16) -> Self {
        Self { addr: self.addr, port }
    }

    /// Port 0 asks for an ephemeral port
    #[inline]
    pub const fn has_port(&self) -> bool {
        self.port != 0
    }

    /// `INADDR_ANY`
    #[inline]
    pub fn is_any(&self) -> bool {
        self.addr.is_unspecified()
    }

    /// Whether a socket bound to `self` receives traffic sent to `dest`
    pub fn accepts(&self, dest: &SockAddrIn) -> bool {
        self.port == dest.port && (self.is_any() || self.addr == dest.addr)
    }
}

impl Default for SockAddrIn {
    fn default() -> Self {
        Self::UNSPECIFIED
    }
}

impl From<SocketAddrV4> for SockAddrIn {
    fn from(a: SocketAddrV4) -> Self {
        Self::new(*a.ip(), a.port())
    }
}

impl From<SockAddrIn> for SocketAddrV4 {
    fn from(a: SockAddrIn) -> Self {
        SocketAddrV4::new(a.addr, a.port)
    }
}

impl FromStr for SockAddrIn {
    type Err = std::net::AddrParseError;

    /// Parse `"a.b.c.d:port"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddrV4>().map(SockAddrIn::from)
    }
}

impl fmt::Debug for SockAddrIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

impl fmt::Display for SockAddrIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// Parse a dotted quad into a network-order address, like `inet_addr(3)`
///
/// Returns `None` where the C function would return `INADDR_NONE`.
pub fn inet_addr(dotted: &str) -> Option<u32> {
    dotted
        .trim()
        .parse::<Ipv4Addr>()
        .ok()
        .map(|ip| htonl(u32::from(ip)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display() {
        let a: SockAddrIn = "10.0.0.5:80".parse().unwrap();
        assert_eq!(a.addr, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(a.port, 80);
        assert_eq!(a.to_string(), "10.0.0.5:80");
    }

    #[test]
    fn test_any_accepts() {
        let any: SockAddrIn = "0.0.0.0:7000".parse().unwrap();
        assert!(any.is_any());
        assert!(any.accepts(&SockAddrIn::localhost(7000)));
        assert!(!any.accepts(&SockAddrIn::localhost(7001)));

        let lo = SockAddrIn::localhost(7000);
        assert!(!lo.accepts(&"10.0.0.1:7000".parse().unwrap()));
    }

    #[test]
    fn test_inet_addr() {
        assert_eq!(inet_addr("127.0.0.1"), Some(htonl(0x7f00_0001)));
        assert_eq!(inet_addr("300.1.1.1"), None);
        assert_eq!(inet_addr("nope"), None);
    }
}
