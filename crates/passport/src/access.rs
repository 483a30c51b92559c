//! Source-address access control.
//!
//! An [`AccessList`] is the set of CIDR networks allowed to use the relay.
//! It is parsed once at startup from a semicolon-separated string such as
//! `10.0.0.0/8;192.168.0.0/16`. The absence of a list means "allow all",
//! which is only safe because the listener then binds to loopback (see
//! [`bind_addr`]).

use crate::error::{PassportError, Result};
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Separator between CIDR entries in the raw access list string.
pub const ENTRY_SEPARATOR: char = ';';

/// Ordered set of networks permitted to use the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessList {
    networks: Vec<IpNet>,
}

impl AccessList {
    /// Build an access list from already-parsed networks.
    #[must_use]
    pub fn new(networks: Vec<IpNet>) -> Self {
        Self {
            networks: networks.into_iter().map(|n| n.trunc()).collect(),
        }
    }

    /// Parse a raw `cidr;cidr;...` string.
    ///
    /// Returns `Ok(None)` for an empty (or all-whitespace) string, meaning no
    /// restriction. Empty segments between separators are skipped. Any entry
    /// that is not valid CIDR notation is an error; a bare address without a
    /// prefix length is rejected.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let mut networks = Vec::new();
        for entry in raw.split(ENTRY_SEPARATOR) {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let net = entry
                .parse::<IpNet>()
                .map_err(|e| PassportError::InvalidCidr {
                    entry: entry.to_string(),
                    reason: e.to_string(),
                })?;
            networks.push(net);
        }

        if networks.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::new(networks)))
    }

    /// Whether `ip` falls inside at least one listed network.
    #[must_use]
    pub fn contains(&self, ip: &IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.networks.iter().any(|net| net.contains(&ip))
    }

    /// The configured networks, in the order they were given.
    #[must_use]
    pub fn networks(&self) -> &[IpNet] {
        &self.networks
    }
}

impl std::fmt::Display for AccessList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, net) in self.networks.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", ENTRY_SEPARATOR)?;
            }
            write!(f, "{}", net)?;
        }
        Ok(())
    }
}

/// Decide whether a connection from `raw_remote` may use the relay.
///
/// `raw_remote` is the peer address as text, normally `ip:port` or
/// `[v6]:port`; a bare IP is accepted too. With no access list every
/// source is allowed. With a list, an unparseable address is denied.
#[must_use]
pub fn is_authorized(access: Option<&AccessList>, raw_remote: &str) -> bool {
    let Some(access) = access else {
        return true;
    };

    match parse_remote_ip(raw_remote) {
        Some(ip) => access.contains(&ip),
        None => false,
    }
}

fn parse_remote_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    raw.parse::<IpAddr>().ok()
}

/// Interface the listener binds to.
///
/// All interfaces when an access list restricts who may connect, loopback
/// otherwise, so an unconfigured relay is never an open proxy.
#[must_use]
pub fn bind_addr(access: Option<&AccessList>) -> IpAddr {
    if access.is_some() {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }
}
