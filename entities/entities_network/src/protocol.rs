//! Protocol Support Module
//!
//! Selects which address families resolution, interface enumeration and wildcard expansion
//! consider.

use crate::address::AddressFamily;

/// Enabled IP protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolSupport {
    /// IPv4 addresses only
    Ipv4Only,
    /// IPv6 addresses only
    Ipv6Only,
    /// Both IPv4 and IPv6 addresses
    Both,
}

impl ProtocolSupport {
    pub fn allows_ipv4(&self) -> bool {
        !matches!(self, ProtocolSupport::Ipv6Only)
    }

    pub fn allows_ipv6(&self) -> bool {
        !matches!(self, ProtocolSupport::Ipv4Only)
    }

    /// Whether addresses of `family` are considered
    pub fn allows(&self, family: AddressFamily) -> bool {
        match family {
            AddressFamily::Ipv4 => self.allows_ipv4(),
            AddressFamily::Ipv6 => self.allows_ipv6(),
        }
    }

    /// The enabled families, IPv4 first
    pub fn families(&self) -> Vec<AddressFamily> {
        [AddressFamily::Ipv4, AddressFamily::Ipv6]
            .into_iter()
            .filter(|family| self.allows(*family))
            .collect()
    }
}
