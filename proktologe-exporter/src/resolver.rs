//! External address resolution from the local interface table.
//!
//! The external address is the first public IPv4 address found while walking
//! the interfaces in the order the operating system reports them. No outside
//! service is consulted.

use std::net::{IpAddr, Ipv4Addr};

use pnet::datalink::NetworkInterface;
use thiserror::Error;
use tracing::trace;

/// Address resolution errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("public IP not found")]
    PublicIpNotFound,
}

/// Snapshot of one local network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    /// Interface name (e.g. `eth0`).
    pub name: String,
    /// Administratively up.
    pub is_up: bool,
    /// Flagged as loopback.
    pub is_loopback: bool,
    /// Assigned addresses, in the order reported by the OS.
    pub ips: Vec<IpAddr>,
}

impl InterfaceInfo {
    /// Create an interface snapshot that is up and not loopback.
    pub fn new(name: impl Into<String>, ips: Vec<IpAddr>) -> Self {
        Self {
            name: name.into(),
            is_up: true,
            is_loopback: false,
            ips,
        }
    }
}

impl From<&NetworkInterface> for InterfaceInfo {
    fn from(iface: &NetworkInterface) -> Self {
        Self {
            name: iface.name.clone(),
            is_up: iface.is_up(),
            is_loopback: iface.is_loopback(),
            ips: iface.ips.iter().map(|net| net.ip()).collect(),
        }
    }
}

/// Check whether an IPv4 address is publicly routable.
///
/// Private (`10/8`, `172.16/12`, `192.168/16`), loopback, link-local unicast
/// (`169.254/16`) and link-local multicast (`224.0.0/24`) addresses are not.
/// Everything else is.
pub fn is_public_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    let link_local_multicast = octets[0] == 224 && octets[1] == 0 && octets[2] == 0;

    !(ip.is_loopback() || ip.is_link_local() || link_local_multicast || ip.is_private())
}

/// IPv4 form of an address, if it has one.
fn as_ipv4(ip: IpAddr) -> Option<Ipv4Addr> {
    match ip {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    }
}

/// Select the external address from an interface table.
///
/// First match wins: interface order, then address order within the
/// interface.
pub fn select_external_address(interfaces: &[InterfaceInfo]) -> Result<Ipv4Addr, ResolveError> {
    for iface in interfaces {
        if !iface.is_up || iface.is_loopback {
            trace!(interface = %iface.name, "Skipping interface");
            continue;
        }

        for ip in &iface.ips {
            if ip.is_loopback() {
                continue;
            }
            let Some(v4) = as_ipv4(*ip) else {
                continue;
            };
            if is_public_ipv4(v4) {
                return Ok(v4);
            }
        }
    }

    Err(ResolveError::PublicIpNotFound)
}

/// Source of the external address used for a scrape.
pub trait AddressResolver: Send + Sync {
    /// Resolve the external address.
    fn resolve(&self) -> Result<Ipv4Addr, ResolveError>;
}

/// Resolver backed by the live interface table.
///
/// Interfaces are enumerated on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl SystemResolver {
    /// Enumerate the local interfaces.
    pub fn interfaces() -> Vec<InterfaceInfo> {
        pnet::datalink::interfaces()
            .iter()
            .map(InterfaceInfo::from)
            .collect()
    }
}

impl AddressResolver for SystemResolver {
    fn resolve(&self) -> Result<Ipv4Addr, ResolveError> {
        select_external_address(&Self::interfaces())
    }
}

/// Resolver over a fixed interface table.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    interfaces: Vec<InterfaceInfo>,
}

impl StaticResolver {
    /// Create a resolver over the given interfaces.
    pub fn new(interfaces: Vec<InterfaceInfo>) -> Self {
        Self { interfaces }
    }
}

impl AddressResolver for StaticResolver {
    fn resolve(&self) -> Result<Ipv4Addr, ResolveError> {
        select_external_address(&self.interfaces)
    }
}
