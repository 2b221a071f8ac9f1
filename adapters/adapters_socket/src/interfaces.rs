//! Local Interfaces Module
//!
//! Enumerates the addresses of the host's network interfaces and expands a wildcard
//! endpoint host into the concrete hosts it is reachable at.

use entities_network::{AddressFamily, ProtocolSupport, SocketAddress};

use crate::error::{Result, TransportError};
use crate::resolver::AddressResolver;
use crate::sys::{Platform, Sys};

/// Local interface address queries
pub struct LocalInterfaces;

impl LocalInterfaces {
    /// Addresses of every non-loopback interface of the enabled families
    ///
    /// Unspecified addresses, and IPv6 loopback addresses on interfaces not flagged as
    /// loopback, are left out. Ports are 0.
    pub fn enumerate(protocol: ProtocolSupport) -> Result<Vec<SocketAddress>> {
        let addresses = Sys::local_addresses(protocol).map_err(|e| TransportError::socket(&e))?;
        Ok(addresses
            .into_iter()
            .filter(|addr| protocol.allows(addr.family()))
            .filter(|addr| !addr.is_unspecified())
            .filter(|addr| !(addr.family() == AddressFamily::Ipv6 && addr.is_loopback()))
            .collect())
    }

    /// Hosts a wildcard endpoint should be published under
    ///
    /// # Arguments
    ///
    /// * `host` - Endpoint host; empty or a wildcard address triggers expansion
    /// * `protocol` - Address families to consider
    ///
    /// # Returns
    ///
    /// For a wildcard host, the numeric hosts of every local interface except IPv6
    /// link-local ones, falling back to the loopback hosts when there are none. For any
    /// other host, an empty list.
    pub fn hosts_for_wildcard_expansion(host: &str, protocol: ProtocolSupport) -> Result<Vec<String>> {
        if !host.is_empty() && !AddressResolver::is_wildcard(host, protocol) {
            return Ok(Vec::new());
        }

        let mut hosts: Vec<String> = Self::enumerate(protocol)?
            .into_iter()
            .filter(|addr| !addr.is_link_local())
            .map(|addr| addr.host())
            .collect();

        if hosts.is_empty() {
            log::debug!("no usable interface addresses; expanding `{}` to loopback", host);
            if protocol.allows_ipv4() {
                hosts.push("127.0.0.1".to_string());
            }
            if protocol.allows_ipv6() {
                hosts.push("::1".to_string());
            }
        }
        Ok(hosts)
    }
}
