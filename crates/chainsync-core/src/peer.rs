//! Peer addresses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::error::CoreError;

/// The authority (ip and port) of a remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerAddress(SocketAddr);

impl PeerAddress {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self(SocketAddr::new(ip, port))
    }

    pub fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PeerAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddr>()
            .map(Self)
            .map_err(|e| CoreError::InvalidAddress(format!("{s}: {e}")))
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let peer: PeerAddress = "10.0.0.7:8333".parse().unwrap();
        assert_eq!(peer.port(), 8333);
        assert_eq!(peer.to_string(), "10.0.0.7:8333");
    }

    #[test]
    fn test_parse_ipv6() {
        let peer: PeerAddress = "[::1]:18333".parse().unwrap();
        assert!(peer.ip().is_ipv6());
    }

    #[test]
    fn test_rejects_missing_port() {
        let err = "10.0.0.7".parse::<PeerAddress>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidAddress(_)));
    }
}
