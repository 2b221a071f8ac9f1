//! Unix Platform Module
//!
//! BSD-socket implementation of the platform layer: `errno` classification, `poll(2)`
//! readiness, `getaddrinfo(3)` lookups, `getifaddrs(3)` interface enumeration and a native
//! `pipe(2)` for wakeups.

use std::ffi::{CStr, CString};
use std::fs::File;
use std::io;
use std::net::{SocketAddrV4, SocketAddrV6};
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd};
use std::ptr;

use entities_network::{ProtocolSupport, SocketAddress};
use nix::errno::Errno;
use nix::ifaddrs::getifaddrs;
use nix::net::if_::{if_nametoindex, InterfaceFlags};

use super::{address_from_raw, Platform, Readiness};
use crate::error::{ErrorCode, Result, TransportError};
use crate::pipe::{NotificationPipe, PipeEnd};

/// Unix socket facilities
pub(crate) struct UnixPlatform;

impl Platform for UnixPlatform {
    const DEFAULT_TCP_BUFFER_SIZE: i32 = 0;

    // Linux may complete a connect to an ephemeral local port with the socket itself.
    const SELF_CONNECT_CHECK: bool = cfg!(target_os = "linux");

    fn last_error() -> i32 {
        io::Error::last_os_error().raw_os_error().unwrap_or(0)
    }

    fn is_interrupted(code: i32) -> bool {
        code == libc::EINTR || code == libc::EPROTO
    }

    fn is_accept_aborted(code: i32) -> bool {
        code == libc::ECONNABORTED || code == libc::ECONNRESET || code == libc::ETIMEDOUT
    }

    fn is_no_buffers(code: i32) -> bool {
        code == libc::ENOBUFS
    }

    fn is_would_block(code: i32) -> bool {
        code == libc::EAGAIN || code == libc::EWOULDBLOCK
    }

    fn is_connect_in_progress(code: i32) -> bool {
        code == libc::EINPROGRESS
    }

    fn is_connection_refused(code: i32) -> bool {
        code == libc::ECONNREFUSED
    }

    fn is_connect_failed(code: i32) -> bool {
        matches!(
            code,
            libc::ECONNREFUSED
                | libc::ETIMEDOUT
                | libc::ENETUNREACH
                | libc::EHOSTUNREACH
                | libc::ECONNRESET
                | libc::ESHUTDOWN
                | libc::ECONNABORTED
        )
    }

    fn is_connection_lost(code: i32) -> bool {
        matches!(
            code,
            libc::ECONNRESET | libc::ENOTCONN | libc::ESHUTDOWN | libc::ECONNABORTED | libc::EPIPE
        )
    }

    fn is_not_connected(code: i32) -> bool {
        // BSD-derived kernels report EINVAL for a socket the peer has already reset.
        if cfg!(any(target_vendor = "apple", target_os = "freebsd")) && code == libc::EINVAL {
            return true;
        }
        code == libc::ENOTCONN
    }

    fn is_recv_truncated(_code: i32) -> bool {
        false
    }

    fn is_shutdown_benign(code: i32) -> bool {
        Self::is_not_connected(code)
    }

    fn describe(code: i32) -> String {
        Errno::from_i32(code).desc().to_string()
    }

    fn describe_dns(code: i32) -> String {
        // SAFETY: gai_strerror returns a pointer to a static, NUL-terminated message.
        unsafe { CStr::from_ptr(libc::gai_strerror(code)) }
            .to_string_lossy()
            .into_owned()
    }

    fn is_dns_try_again(code: i32) -> bool {
        code == libc::EAI_AGAIN
    }

    fn is_dns_no_name(code: i32) -> bool {
        code == libc::EAI_NONAME
    }

    fn lookup(
        host: &str,
        protocol: ProtocolSupport,
        passive: bool,
        numeric_only: bool,
    ) -> std::result::Result<Vec<SocketAddress>, i32> {
        let node = if host.is_empty() {
            None
        } else {
            Some(CString::new(host).map_err(|_| libc::EAI_NONAME)?)
        };
        // SAFETY: addrinfo is a plain C struct; all-zero is the documented "no hints" value.
        let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
        hints.ai_family = match protocol {
            ProtocolSupport::Ipv4Only => libc::AF_INET,
            ProtocolSupport::Ipv6Only => libc::AF_INET6,
            ProtocolSupport::Both => libc::AF_UNSPEC,
        };
        if passive {
            hints.ai_flags |= libc::AI_PASSIVE;
        }
        if numeric_only {
            hints.ai_flags |= libc::AI_NUMERICHOST;
        }

        let node_ptr = node.as_ref().map_or(ptr::null(), |n| n.as_ptr());
        // With no node name a service is required; the port is patched in afterwards.
        let service_ptr: *const libc::c_char = if node.is_none() {
            b"1\0".as_ptr().cast()
        } else {
            ptr::null()
        };
        let mut info: *mut libc::addrinfo = ptr::null_mut();
        // SAFETY: all pointers are valid for the duration of the call.
        let rs = unsafe { libc::getaddrinfo(node_ptr, service_ptr, &hints, &mut info) };
        if rs != 0 {
            return Err(rs);
        }

        let mut addresses = Vec::new();
        let mut cursor = info;
        while !cursor.is_null() {
            // SAFETY: cursor walks the list getaddrinfo allocated; it is freed below.
            let entry = unsafe { &*cursor };
            if let Some(addr) = unsafe { address_from_raw(entry.ai_addr.cast_const(), entry.ai_addrlen as usize) } {
                addresses.push(addr.with_port(0));
            }
            cursor = entry.ai_next;
        }
        // SAFETY: info came from a successful getaddrinfo call.
        unsafe { libc::freeaddrinfo(info) };
        Ok(addresses)
    }

    fn wait(socket: &socket2::Socket, readiness: Readiness, timeout_ms: i32) -> io::Result<bool> {
        let mut pfd = libc::pollfd {
            fd: socket.as_raw_fd(),
            events: match readiness {
                Readiness::Readable => libc::POLLIN,
                Readiness::Writable => libc::POLLOUT,
            },
            revents: 0,
        };
        // SAFETY: pfd is a single valid pollfd.
        match unsafe { libc::poll(&mut pfd, 1, timeout_ms) } {
            -1 => Err(io::Error::last_os_error()),
            0 => Ok(false),
            _ => Ok(true),
        }
    }

    fn local_addresses(protocol: ProtocolSupport) -> io::Result<Vec<SocketAddress>> {
        let mut addresses = Vec::new();
        for ifaddr in getifaddrs()? {
            if ifaddr.flags.contains(InterfaceFlags::IFF_LOOPBACK) {
                continue;
            }
            let Some(storage) = ifaddr.address else {
                continue;
            };
            if let Some(sin) = storage.as_sockaddr_in() {
                if protocol.allows_ipv4() {
                    addresses.push(SocketAddress::from(SocketAddrV4::from(*sin)));
                }
            } else if let Some(sin6) = storage.as_sockaddr_in6() {
                if protocol.allows_ipv6() {
                    addresses.push(SocketAddress::from(SocketAddrV6::from(*sin6)));
                }
            }
        }
        Ok(addresses)
    }

    fn interface_index(interface: &str) -> Result<u32> {
        if interface.is_empty() {
            return Ok(0);
        }
        if let Ok(index) = interface.parse::<u32>() {
            return Ok(index);
        }
        if_nametoindex(interface).map_err(|errno| TransportError::Socket(ErrorCode::new(errno as i32)))
    }

    fn pipe() -> Result<NotificationPipe> {
        let mut fds = [0 as libc::c_int; 2];
        // SAFETY: fds has room for the two descriptors pipe(2) writes.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(TransportError::Syscall(ErrorCode::last()));
        }
        // SAFETY: both descriptors were just created and are owned by nobody else.
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        set_fd_blocking(&read)?;
        set_fd_blocking(&write)?;
        Ok(NotificationPipe::from_ends(
            PipeEnd::Native(File::from(read)),
            PipeEnd::Native(File::from(write)),
        ))
    }
}

/// Clear `O_NONBLOCK` on a raw descriptor
fn set_fd_blocking(fd: &OwnedFd) -> Result<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: raw is an open descriptor owned by fd.
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFL) };
    if flags < 0 {
        return Err(TransportError::Socket(ErrorCode::last()));
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(raw, libc::F_SETFL, flags & !libc::O_NONBLOCK) } < 0 {
        return Err(TransportError::Socket(ErrorCode::last()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupted_includes_eproto() {
        assert!(UnixPlatform::is_interrupted(libc::EINTR));
        assert!(UnixPlatform::is_interrupted(libc::EPROTO));
        assert!(!UnixPlatform::is_interrupted(libc::EAGAIN));
    }

    #[test]
    fn test_connect_failed_set() {
        for code in [libc::ECONNREFUSED, libc::ETIMEDOUT, libc::ENETUNREACH, libc::EHOSTUNREACH] {
            assert!(UnixPlatform::is_connect_failed(code));
        }
        assert!(!UnixPlatform::is_connect_failed(libc::EINPROGRESS));
    }

    #[test]
    fn test_describe_dns_no_name() {
        assert!(!UnixPlatform::describe_dns(libc::EAI_NONAME).is_empty());
    }

    #[test]
    fn test_lookup_numeric_loopback() {
        let addrs = UnixPlatform::lookup("127.0.0.1", ProtocolSupport::Ipv4Only, false, true).unwrap();
        assert!(!addrs.is_empty());
        assert!(addrs.iter().all(|a| a.is_loopback() && a.port() == 0));
    }

    #[test]
    fn test_lookup_numeric_only_rejects_names() {
        let rs = UnixPlatform::lookup("no-such-host.invalid", ProtocolSupport::Both, false, true);
        assert_eq!(rs, Err(libc::EAI_NONAME));
    }

    #[test]
    fn test_interface_index_numeric() {
        assert_eq!(UnixPlatform::interface_index("").unwrap(), 0);
        assert_eq!(UnixPlatform::interface_index("3").unwrap(), 3);
    }

    #[test]
    fn test_native_pipe_is_blocking() {
        let pipe = UnixPlatform::pipe().unwrap();
        let (read, write) = pipe.into_ends();
        for end in [&read, &write] {
            // SAFETY: the descriptor is open for the duration of the test.
            let flags = unsafe { libc::fcntl(end.as_raw_fd(), libc::F_GETFL) };
            assert_eq!(flags & libc::O_NONBLOCK, 0);
        }
    }
}
