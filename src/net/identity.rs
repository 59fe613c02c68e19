//! Local host identity.
//!
//! # Responsibilities
//! - Discover the IP addresses owned by this process's host
//! - Merge operator-supplied addresses (NAT, addresses not bound locally)
//!
//! # Design Decisions
//! - Resolved once at startup, immutable afterwards
//! - Every interface address counts, so multi-homed hosts match rules keyed
//!   by any of their addresses
//! - The outbound probe uses a connected UDP socket; no packet is sent
//! - Loopback only counts when configured: `debug.127.0.0.1` would otherwise
//!   match every host
//! - Failure is not fatal: an empty identity turns local-debug and
//!   host-keyed rules into no-ops

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use thiserror::Error;

use crate::config::schema::IdentityConfig;

/// Host address resolution failed.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("local identity unavailable: {0}")]
    Unavailable(String),
}

/// The set of literal IP addresses owned by this host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalIdentity {
    addrs: BTreeSet<String>,
}

impl LocalIdentity {
    pub fn from_addrs<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addrs: addrs.into_iter().map(Into::into).collect(),
        }
    }

    /// Identity used when resolution failed.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Discover this host's addresses.
    pub fn resolve(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let mut discovered = Vec::new();

        if config.discover_interfaces {
            match interface_addresses() {
                Ok(addrs) => discovered.extend(addrs),
                Err(e) => tracing::warn!(error = %e, "Interface address discovery failed"),
            }
        }

        match probe_outbound_ip(&config.probe_address) {
            Ok(ip) => discovered.push(ip),
            Err(e) => {
                tracing::warn!(
                    probe = %config.probe_address,
                    error = %e,
                    "Outbound address probe failed"
                );
            }
        }

        let identity = Self::from_discovered(config, discovered)?;
        tracing::info!(addresses = ?identity.addrs, "Resolved local identity");
        Ok(identity)
    }

    /// Merge discovered addresses with the configured ones.
    pub fn from_discovered<I>(config: &IdentityConfig, discovered: I) -> Result<Self, IdentityError>
    where
        I: IntoIterator<Item = IpAddr>,
    {
        let mut addrs = BTreeSet::new();

        for extra in &config.extra_addresses {
            let ip: IpAddr = extra.parse().map_err(|_| {
                IdentityError::Unavailable(format!("invalid extra address '{extra}'"))
            })?;
            addrs.insert(ip.to_string());
        }

        for ip in discovered {
            if usable(&ip) && !ip.is_loopback() {
                addrs.insert(ip.to_string());
            }
        }

        if addrs.is_empty() {
            return Err(IdentityError::Unavailable(
                "no address discovered and none configured".to_string(),
            ));
        }

        if config.include_loopback {
            addrs.insert(Ipv4Addr::LOCALHOST.to_string());
            addrs.insert(Ipv6Addr::LOCALHOST.to_string());
        }

        Ok(Self { addrs })
    }

    pub fn contains(&self, host: &str) -> bool {
        self.addrs.contains(host)
    }

    /// Addresses in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addrs.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }
}

/// Addresses a rule could name. IPv6 link-local needs a scope id, so it never can.
fn usable(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !v4.is_unspecified(),
        IpAddr::V6(v6) => !v6.is_unspecified() && (v6.segments()[0] & 0xffc0) != 0xfe80,
    }
}

/// Every address bound to an interface of this host.
#[cfg(unix)]
fn interface_addresses() -> Result<Vec<IpAddr>, nix::Error> {
    use std::net::{SocketAddrV4, SocketAddrV6};

    let mut addrs = Vec::new();
    for ifaddr in nix::ifaddrs::getifaddrs()? {
        let Some(address) = ifaddr.address else {
            continue;
        };
        if let Some(v4) = address.as_sockaddr_in() {
            addrs.push(IpAddr::V4(*SocketAddrV4::from(*v4).ip()));
        } else if let Some(v6) = address.as_sockaddr_in6() {
            addrs.push(IpAddr::V6(*SocketAddrV6::from(*v6).ip()));
        }
    }
    Ok(addrs)
}

#[cfg(not(unix))]
fn interface_addresses() -> std::io::Result<Vec<IpAddr>> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "interface enumeration not supported on this platform",
    ))
}

/// Address the OS would use to reach `probe`.
fn probe_outbound_ip(probe: &str) -> std::io::Result<IpAddr> {
    let target: SocketAddr = probe
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let bind = if target.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket = UdpSocket::bind(bind)?;
    socket.connect(target)?;
    let ip = socket.local_addr()?.ip();
    if ip.is_unspecified() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            "no route to probe address",
        ));
    }
    Ok(ip)
}
