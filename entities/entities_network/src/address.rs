//! Socket Address Module
//!
//! Provides the canonical representation of an IP socket address. A `SocketAddress` is a
//! tagged variant holding either an IPv4 or an IPv6 payload together with a port; it is
//! always fully populated, so comparison and rendering never see partial state.
//!
//! The order relation is: address family first (IPv4 before IPv6), then port, then the raw
//! address bytes compared in memory order. The same relation is used to deduplicate
//! resolution results in `ResolvedAddressSet`.

use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// Address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressFamily {
    /// IPv4
    Ipv4,
    /// IPv6
    Ipv6,
}

impl AddressFamily {
    /// Family of an IP address
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

/// Family-tagged socket address
///
/// Equality and ordering consider only the family, the port and the address bytes. IPv6
/// flow information and scope identifiers are not part of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketAddress {
    /// IPv4 address in network byte order plus port
    V4 { ip: [u8; 4], port: u16 },
    /// IPv6 address in network byte order plus port
    V6 { ip: [u8; 16], port: u16 },
}

impl SocketAddress {
    /// Create a socket address from an IP address and a port
    pub fn new(ip: IpAddr, port: u16) -> Self {
        match ip {
            IpAddr::V4(v4) => SocketAddress::V4 { ip: v4.octets(), port },
            IpAddr::V6(v6) => SocketAddress::V6 { ip: v6.octets(), port },
        }
    }

    /// The wildcard ("any") address of the given family with port 0
    pub fn unspecified(family: AddressFamily) -> Self {
        match family {
            AddressFamily::Ipv4 => SocketAddress::V4 { ip: [0; 4], port: 0 },
            AddressFamily::Ipv6 => SocketAddress::V6 { ip: [0; 16], port: 0 },
        }
    }

    /// The loopback address of the given family
    pub fn loopback(family: AddressFamily, port: u16) -> Self {
        match family {
            AddressFamily::Ipv4 => Self::new(Ipv4Addr::LOCALHOST.into(), port),
            AddressFamily::Ipv6 => Self::new(Ipv6Addr::LOCALHOST.into(), port),
        }
    }

    /// Address family tag
    pub fn family(&self) -> AddressFamily {
        match self {
            SocketAddress::V4 { .. } => AddressFamily::Ipv4,
            SocketAddress::V6 { .. } => AddressFamily::Ipv6,
        }
    }

    /// Port in host byte order
    pub fn port(&self) -> u16 {
        match self {
            SocketAddress::V4 { port, .. } | SocketAddress::V6 { port, .. } => *port,
        }
    }

    /// Copy of this address with a different port
    pub fn with_port(self, port: u16) -> Self {
        match self {
            SocketAddress::V4 { ip, .. } => SocketAddress::V4 { ip, port },
            SocketAddress::V6 { ip, .. } => SocketAddress::V6 { ip, port },
        }
    }

    /// IP address without the port
    pub fn ip(&self) -> IpAddr {
        match self {
            SocketAddress::V4 { ip, .. } => IpAddr::V4(Ipv4Addr::from(*ip)),
            SocketAddress::V6 { ip, .. } => IpAddr::V6(Ipv6Addr::from(*ip)),
        }
    }

    /// Numeric host rendering, never involving a reverse lookup
    pub fn host(&self) -> String {
        self.ip().to_string()
    }

    /// Whether this is the IPv4 or IPv6 wildcard address
    pub fn is_unspecified(&self) -> bool {
        match self {
            SocketAddress::V4 { ip, .. } => *ip == [0; 4],
            SocketAddress::V6 { ip, .. } => *ip == [0; 16],
        }
    }

    /// Whether this is a loopback address
    pub fn is_loopback(&self) -> bool {
        self.ip().is_loopback()
    }

    /// Whether this is an IPv6 link-local unicast address (fe80::/10)
    ///
    /// Such addresses are unusable without a scope qualifier and are never published.
    pub fn is_link_local(&self) -> bool {
        match self {
            SocketAddress::V4 { .. } => false,
            SocketAddress::V6 { ip, .. } => ip[0] == 0xfe && (ip[1] & 0xc0) == 0x80,
        }
    }

    /// Convert to the standard library representation
    pub fn to_std(&self) -> SocketAddr {
        SocketAddr::new(self.ip(), self.port())
    }
}

impl Ord for SocketAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SocketAddress::V4 { ip: a, port: pa }, SocketAddress::V4 { ip: b, port: pb }) => {
                pa.cmp(pb).then_with(|| a.cmp(b))
            }
            (SocketAddress::V6 { ip: a, port: pa }, SocketAddress::V6 { ip: b, port: pb }) => {
                pa.cmp(pb).then_with(|| a.cmp(b))
            }
            _ => self.family().cmp(&other.family()),
        }
    }
}

impl PartialOrd for SocketAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host(), self.port())
    }
}

impl From<SocketAddr> for SocketAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl From<SocketAddrV4> for SocketAddress {
    fn from(addr: SocketAddrV4) -> Self {
        SocketAddress::V4 { ip: addr.ip().octets(), port: addr.port() }
    }
}

impl From<SocketAddrV6> for SocketAddress {
    fn from(addr: SocketAddrV6) -> Self {
        SocketAddress::V6 { ip: addr.ip().octets(), port: addr.port() }
    }
}

impl From<SocketAddress> for SocketAddr {
    fn from(addr: SocketAddress) -> Self {
        addr.to_std()
    }
}

/// Ordered, deduplicated sequence of resolved addresses
///
/// Insertion order is preserved; an address equal (under the `SocketAddress` order) to one
/// already present is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAddressSet {
    addresses: Vec<SocketAddress>,
}

impl ResolvedAddressSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an address unless an equal one is already present
    ///
    /// # Returns
    ///
    /// `true` if the address was added
    pub fn insert(&mut self, addr: SocketAddress) -> bool {
        if self.addresses.iter().any(|a| a.cmp(&addr) == Ordering::Equal) {
            return false;
        }
        self.addresses.push(addr);
        true
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// First resolved address, if any
    pub fn first(&self) -> Option<&SocketAddress> {
        self.addresses.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SocketAddress> {
        self.addresses.iter()
    }

    pub fn as_slice(&self) -> &[SocketAddress] {
        &self.addresses
    }

    pub fn into_vec(self) -> Vec<SocketAddress> {
        self.addresses
    }
}

impl FromIterator<SocketAddress> for ResolvedAddressSet {
    fn from_iter<I: IntoIterator<Item = SocketAddress>>(iter: I) -> Self {
        let mut set = ResolvedAddressSet::new();
        for addr in iter {
            set.insert(addr);
        }
        set
    }
}

impl IntoIterator for ResolvedAddressSet {
    type Item = SocketAddress;
    type IntoIter = std::vec::IntoIter<SocketAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResolvedAddressSet {
    type Item = &'a SocketAddress;
    type IntoIter = std::slice::Iter<'a, SocketAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v4(a: u8, b: u8, c: u8, d: u8, port: u16) -> SocketAddress {
        SocketAddress::new(Ipv4Addr::new(a, b, c, d).into(), port)
    }

    #[test]
    fn test_family_orders_before_port() {
        let ipv4 = v4(255, 255, 255, 255, 65535);
        let ipv6 = SocketAddress::new(Ipv6Addr::UNSPECIFIED.into(), 0);
        assert!(ipv4 < ipv6);
        assert_eq!(ipv6.cmp(&ipv4), Ordering::Greater);
    }

    #[test]
    fn test_port_orders_before_address() {
        let low_port = v4(10, 0, 0, 9, 1);
        let high_port = v4(10, 0, 0, 1, 2);
        assert!(low_port < high_port);
    }

    #[test]
    fn test_ipv6_compares_bytes_in_memory_order() {
        let a = SocketAddress::V6 { ip: [0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff], port: 80 };
        let b = SocketAddress::V6 { ip: [0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x00], port: 80 };
        assert!(a < b);
    }

    #[test]
    fn test_display_is_numeric_host_and_port() {
        assert_eq!(v4(127, 0, 0, 1, 4061).to_string(), "127.0.0.1:4061");
        let v6 = SocketAddress::loopback(AddressFamily::Ipv6, 10000);
        assert_eq!(v6.to_string(), "::1:10000");
    }

    #[test]
    fn test_port_extraction_and_replacement() {
        let addr = v4(192, 168, 1, 7, 0).with_port(12000);
        assert_eq!(addr.port(), 12000);
        assert_eq!(addr.family(), AddressFamily::Ipv4);
        assert_eq!(addr.host(), "192.168.1.7");
    }

    #[test]
    fn test_unspecified_and_link_local() {
        assert!(SocketAddress::unspecified(AddressFamily::Ipv4).is_unspecified());
        assert!(SocketAddress::unspecified(AddressFamily::Ipv6).is_unspecified());
        assert!(!SocketAddress::loopback(AddressFamily::Ipv4, 0).is_unspecified());

        let link_local: Ipv6Addr = "fe80::1".parse().unwrap();
        assert!(SocketAddress::new(link_local.into(), 0).is_link_local());
        let global: Ipv6Addr = "2001:db8::1".parse().unwrap();
        assert!(!SocketAddress::new(global.into(), 0).is_link_local());
        assert!(!v4(169, 254, 0, 1, 0).is_link_local());
    }

    #[test]
    fn test_std_conversion() {
        let std_addr: SocketAddr = "[2001:db8::5]:443".parse().unwrap();
        let addr = SocketAddress::from(std_addr);
        assert_eq!(addr.port(), 443);
        assert_eq!(SocketAddr::from(addr), std_addr);
    }

    #[test]
    fn test_resolved_set_deduplicates_in_order() {
        let a = v4(10, 0, 0, 1, 80);
        let b = v4(10, 0, 0, 2, 80);
        let set: ResolvedAddressSet = vec![a, b, a, b, a].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.as_slice(), &[a, b]);
        assert_eq!(set.first(), Some(&a));
    }

    #[test]
    fn test_resolved_set_distinguishes_ports() {
        let mut set = ResolvedAddressSet::new();
        assert!(set.insert(v4(10, 0, 0, 1, 80)));
        assert!(set.insert(v4(10, 0, 0, 1, 81)));
        assert_eq!(set.len(), 2);
    }

    fn any_address() -> impl Strategy<Value = SocketAddress> {
        prop_oneof![
            (any::<[u8; 4]>(), any::<u16>()).prop_map(|(ip, port)| SocketAddress::V4 { ip, port }),
            (any::<[u8; 16]>(), any::<u16>()).prop_map(|(ip, port)| SocketAddress::V6 { ip, port }),
        ]
    }

    proptest! {
        #[test]
        fn test_compare_is_reflexive(a in any_address()) {
            prop_assert_eq!(a.cmp(&a), Ordering::Equal);
        }

        #[test]
        fn test_compare_is_antisymmetric(a in any_address(), b in any_address()) {
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
            prop_assert_eq!(a.cmp(&b) == Ordering::Equal, a == b);
        }

        #[test]
        fn test_compare_is_transitive(a in any_address(), b in any_address(), c in any_address()) {
            if a <= b && b <= c {
                prop_assert!(a <= c);
            }
            if a < b && b < c {
                prop_assert!(a < c);
            }
        }
    }
}
