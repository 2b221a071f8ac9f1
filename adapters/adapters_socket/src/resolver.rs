//! Address Resolution Module
//!
//! Turns host names and literals into socket addresses.
//!
//! ## Lookups
//!
//! - [`AddressResolver::resolve_for_bind`]: the address a server socket binds to. An empty
//!   host means the wildcard address.
//! - [`AddressResolver::resolve`]: the first address of a host. An empty host means the
//!   loopback address.
//! - [`AddressResolver::resolve_all`]: every distinct address of a host, in resolver order.
//!   When blocking lookups are not allowed only numeric literals are accepted, and a host
//!   name yields an empty set instead of an error.
//!
//! A resolver that answers "try again" is asked up to five more times before the failure
//! is reported. A lookup that succeeds but returns nothing usable is reported as an
//! [`TransportError::AddressResolution`] error without a resolver code.

use entities_network::{ProtocolSupport, ResolvedAddressSet, SocketAddress};

use crate::error::{DnsErrorCode, Result, TransportError};
use crate::retry;
use crate::sys::{Platform, Sys};

/// Additional attempts after a "try again" answer
const DNS_RETRIES: usize = 5;

/// Host name resolution
pub struct AddressResolver;

impl AddressResolver {
    /// Resolve the local address a server socket binds to
    ///
    /// # Arguments
    ///
    /// * `host` - Host name or literal; empty selects the wildcard address
    /// * `port` - Port to attach to the result
    /// * `protocol` - Address families to consider
    pub fn resolve_for_bind(host: &str, port: u16, protocol: ProtocolSupport) -> Result<SocketAddress> {
        Self::first(host, port, protocol, true)
    }

    /// Resolve the first address of a host; empty selects the loopback address
    pub fn resolve(host: &str, port: u16, protocol: ProtocolSupport) -> Result<SocketAddress> {
        Self::first(host, port, protocol, false)
    }

    /// Resolve every distinct address of a host
    ///
    /// # Arguments
    ///
    /// * `host` - Host name or literal
    /// * `port` - Port to attach to every result
    /// * `protocol` - Address families to consider
    /// * `allow_blocking_dns` - Whether a network lookup may be performed. When `false`,
    ///   only numeric literals resolve and a name returns an empty set.
    ///
    /// # Returns
    ///
    /// * `Ok(ResolvedAddressSet)` - Distinct addresses in resolver order
    /// * `Err(TransportError::AddressResolution)` - Lookup failed or found nothing
    pub fn resolve_all(
        host: &str,
        port: u16,
        protocol: ProtocolSupport,
        allow_blocking_dns: bool,
    ) -> Result<ResolvedAddressSet> {
        let addresses = match Self::lookup(host, protocol, false, !allow_blocking_dns) {
            Ok(addresses) => addresses,
            Err(Some(code)) if !allow_blocking_dns && code.is_no_name() => {
                log::trace!("`{}` is not a numeric address; skipping lookup", host);
                return Ok(ResolvedAddressSet::new());
            }
            Err(code) => return Err(resolution_error(host, code)),
        };
        let set: ResolvedAddressSet = addresses.into_iter().map(|a| a.with_port(port)).collect();
        if set.is_empty() {
            return Err(resolution_error(host, None));
        }
        Ok(set)
    }

    /// Whether `host` denotes the wildcard (unspecified) address
    ///
    /// Hosts that fail to resolve are not wildcards. An empty host resolves to the loopback
    /// address and is therefore not a wildcard either.
    pub fn is_wildcard(host: &str, protocol: ProtocolSupport) -> bool {
        Self::resolve(host, 0, protocol)
            .map(|addr| addr.is_unspecified())
            .unwrap_or(false)
    }

    fn first(host: &str, port: u16, protocol: ProtocolSupport, passive: bool) -> Result<SocketAddress> {
        let addresses = Self::lookup(host, protocol, passive, false)
            .map_err(|code| resolution_error(host, code))?;
        addresses
            .first()
            .map(|addr| addr.with_port(port))
            .ok_or_else(|| resolution_error(host, None))
    }

    fn lookup(
        host: &str,
        protocol: ProtocolSupport,
        passive: bool,
        numeric_only: bool,
    ) -> std::result::Result<Vec<SocketAddress>, Option<DnsErrorCode>> {
        if host.contains('\0') {
            return Err(None);
        }
        retry::bounded(
            DNS_RETRIES,
            || Sys::lookup(host, protocol, passive, numeric_only).map_err(DnsErrorCode::new),
            |code| {
                let again = code.is_try_again();
                if again {
                    log::debug!("resolver asked to retry lookup of `{}`", host);
                }
                again
            },
        )
        .map_err(Some)
    }
}

fn resolution_error(host: &str, code: Option<DnsErrorCode>) -> TransportError {
    TransportError::AddressResolution {
        host: host.to_string(),
        code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entities_network::AddressFamily;

    #[test]
    fn test_resolve_all_numeric_ipv4() {
        let set = AddressResolver::resolve_all("127.0.0.1", 4061, ProtocolSupport::Ipv4Only, false).unwrap();
        assert_eq!(set.len(), 1);
        let addr = set.first().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:4061");
    }

    #[test]
    fn test_resolve_all_name_without_blocking_dns() {
        let set =
            AddressResolver::resolve_all("no-such-host.invalid", 80, ProtocolSupport::Both, false).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_resolve_all_wrong_family_fails() {
        let err = AddressResolver::resolve_all("127.0.0.1", 80, ProtocolSupport::Ipv6Only, true).unwrap_err();
        assert!(matches!(err, TransportError::AddressResolution { .. }));
    }

    #[test]
    fn test_resolve_for_bind_empty_is_wildcard() {
        let addr = AddressResolver::resolve_for_bind("", 10000, ProtocolSupport::Ipv4Only).unwrap();
        assert!(addr.is_unspecified());
        assert_eq!(addr.port(), 10000);
    }

    #[test]
    fn test_resolve_empty_is_loopback() {
        let addr = AddressResolver::resolve("", 10000, ProtocolSupport::Ipv4Only).unwrap();
        assert!(addr.is_loopback());
        assert_eq!(addr.family(), AddressFamily::Ipv4);
    }

    #[test]
    fn test_nul_in_host_has_no_code() {
        let err = AddressResolver::resolve("bad\0host", 0, ProtocolSupport::Both).unwrap_err();
        assert_eq!(
            err,
            TransportError::AddressResolution {
                host: "bad\0host".to_string(),
                code: None
            }
        );
    }

    #[test]
    fn test_is_wildcard() {
        assert!(AddressResolver::is_wildcard("0.0.0.0", ProtocolSupport::Ipv4Only));
        assert!(AddressResolver::is_wildcard("::", ProtocolSupport::Ipv6Only));
        assert!(!AddressResolver::is_wildcard("", ProtocolSupport::Ipv4Only));
        assert!(!AddressResolver::is_wildcard("127.0.0.1", ProtocolSupport::Ipv4Only));
        assert!(!AddressResolver::is_wildcard("bad\0host", ProtocolSupport::Both));
    }
}
