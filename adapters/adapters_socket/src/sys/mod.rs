//! Platform Module
//!
//! The single seam between the transport layer and the operating system's socket API.
//! Every platform-specific error code, readiness primitive, name lookup and interface
//! enumeration is expressed through the [`Platform`] trait; exactly one implementation is
//! selected at build time and exported as [`Sys`]. Nothing outside this module matches on
//! raw platform constants.

use std::io;
use std::mem;
use std::ptr;

use entities_network::{ProtocolSupport, SocketAddress};
use socket2::SockAddr;

use crate::error::Result;
use crate::pipe::NotificationPipe;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub(crate) type Sys = unix::UnixPlatform;
#[cfg(windows)]
pub(crate) type Sys = windows::WindowsPlatform;

/// Readiness condition awaited by a readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Data (or a pending connection) can be read
    Readable,
    /// Data can be written, or a pending connect has completed
    Writable,
}

/// Operating-system socket facilities
pub(crate) trait Platform {
    /// Default TCP buffer size applied when no size is configured (0 = platform default)
    const DEFAULT_TCP_BUFFER_SIZE: i32;

    /// Whether a completed connect must be checked for a spurious self-connection
    const SELF_CONNECT_CHECK: bool;

    /// Last error recorded by the socket API on the calling thread
    fn last_error() -> i32;

    fn is_interrupted(code: i32) -> bool;
    /// Peer-side failures that only abort one pending connection of a listener
    fn is_accept_aborted(code: i32) -> bool;
    fn is_no_buffers(code: i32) -> bool;
    fn is_would_block(code: i32) -> bool;
    fn is_connect_in_progress(code: i32) -> bool;
    fn is_connection_refused(code: i32) -> bool;
    fn is_connect_failed(code: i32) -> bool;
    fn is_connection_lost(code: i32) -> bool;
    fn is_not_connected(code: i32) -> bool;
    fn is_recv_truncated(code: i32) -> bool;
    /// A shutdown failure that only means the peer is already gone
    fn is_shutdown_benign(code: i32) -> bool;

    /// Human-readable rendering of a socket error code
    fn describe(code: i32) -> String;
    /// Human-readable rendering of a name-resolution error code
    fn describe_dns(code: i32) -> String;

    /// The resolver asks for the lookup to be repeated
    fn is_dns_try_again(code: i32) -> bool;
    /// The host is unknown, or not a numeric literal in a numeric-only lookup
    fn is_dns_no_name(code: i32) -> bool;

    /// One `getaddrinfo`-style lookup attempt
    ///
    /// An empty `host` asks for the wildcard address when `passive` is set and for the
    /// loopback address otherwise. Results carry port 0.
    fn lookup(
        host: &str,
        protocol: ProtocolSupport,
        passive: bool,
        numeric_only: bool,
    ) -> std::result::Result<Vec<SocketAddress>, i32>;

    /// Wait for `readiness` on `socket`; `Ok(false)` means the timeout expired
    fn wait(socket: &socket2::Socket, readiness: Readiness, timeout_ms: i32) -> io::Result<bool>;

    /// Addresses of all non-loopback interfaces of the enabled families
    fn local_addresses(protocol: ProtocolSupport) -> io::Result<Vec<SocketAddress>>;

    /// IPv6 interface index for an interface name or number ("" = any interface)
    fn interface_index(interface: &str) -> Result<u32>;

    /// Bidirectional wakeup pipe
    fn pipe() -> Result<NotificationPipe>;
}

/// Decode a raw `sockaddr` of `len` bytes
///
/// The bytes are copied into zeroed storage first, so the decoded address is always fully
/// initialised. Families other than IPv4 and IPv6 yield `None`.
///
/// # Safety
///
/// `raw` must be null or point to at least `len` readable bytes.
pub(crate) unsafe fn address_from_raw<T>(raw: *const T, len: usize) -> Option<SocketAddress> {
    if raw.is_null() || len == 0 {
        return None;
    }
    let decoded = SockAddr::try_init(|storage, storage_len| {
        unsafe {
            let len = len.min(mem::size_of_val(&*storage));
            ptr::copy_nonoverlapping(raw as *const u8, storage as *mut u8, len);
            *storage_len = len as _;
        }
        Ok(())
    });
    decoded
        .ok()
        .and_then(|(_, addr)| addr.as_socket())
        .map(SocketAddress::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddr};

    #[test]
    fn test_address_from_raw_round_trips_std_address() {
        let std_addr = SocketAddr::new(Ipv4Addr::new(192, 0, 2, 10).into(), 7000);
        let sock_addr = SockAddr::from(std_addr);
        let decoded = unsafe { address_from_raw(sock_addr.as_ptr(), sock_addr.len() as usize) };
        assert_eq!(decoded, Some(SocketAddress::from(std_addr)));
    }

    #[test]
    fn test_address_from_raw_null() {
        let decoded = unsafe { address_from_raw::<u8>(ptr::null(), 16) };
        assert_eq!(decoded, None);
    }

    #[test]
    fn test_wait_times_out_on_idle_socket() {
        let socket = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, None).unwrap();
        socket
            .bind(&SockAddr::from(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0)))
            .unwrap();
        assert!(!Sys::wait(&socket, Readiness::Readable, 0).unwrap());
        assert!(Sys::wait(&socket, Readiness::Writable, 0).unwrap());
    }
}
