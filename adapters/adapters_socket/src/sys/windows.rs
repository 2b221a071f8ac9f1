//! Windows Platform Module
//!
//! Winsock implementation of the platform layer. Readiness uses `WSAPoll`, interface
//! enumeration queries `SIO_ADDRESS_LIST_QUERY` on a throwaway socket per family, and the
//! wakeup pipe is a loopback TCP pair since Winsock cannot poll anonymous pipes.

use std::ffi::CString;
use std::io;
use std::os::windows::io::AsRawSocket;
use std::ptr;

use entities_network::{AddressFamily, ProtocolSupport, SocketAddress};
use windows_sys::Win32::Networking::WinSock as ws;

use super::{address_from_raw, Platform, Readiness};
use crate::error::Result;
use crate::pipe::NotificationPipe;

/// Winsock facilities
pub(crate) struct WindowsPlatform;

impl Platform for WindowsPlatform {
    const DEFAULT_TCP_BUFFER_SIZE: i32 = 128 * 1024;
    const SELF_CONNECT_CHECK: bool = false;

    fn last_error() -> i32 {
        // SAFETY: reads thread-local Winsock state only.
        unsafe { ws::WSAGetLastError() }
    }

    fn is_interrupted(code: i32) -> bool {
        code == ws::WSAEINTR
    }

    fn is_accept_aborted(code: i32) -> bool {
        code == ws::WSAECONNABORTED || code == ws::WSAECONNRESET || code == ws::WSAETIMEDOUT
    }

    fn is_no_buffers(code: i32) -> bool {
        code == ws::WSAENOBUFS || code == ws::WSAEFAULT
    }

    fn is_would_block(code: i32) -> bool {
        code == ws::WSAEWOULDBLOCK || code == ws::WSA_IO_PENDING || code == ws::WSA_IO_INCOMPLETE
    }

    fn is_connect_in_progress(code: i32) -> bool {
        code == ws::WSAEWOULDBLOCK || code == ws::WSA_IO_PENDING || code == ws::WSA_IO_INCOMPLETE
    }

    fn is_connection_refused(code: i32) -> bool {
        code == ws::WSAECONNREFUSED
    }

    fn is_connect_failed(code: i32) -> bool {
        [
            ws::WSAECONNREFUSED,
            ws::WSAETIMEDOUT,
            ws::WSAENETUNREACH,
            ws::WSAEHOSTUNREACH,
            ws::WSAECONNRESET,
            ws::WSAESHUTDOWN,
            ws::WSAECONNABORTED,
        ]
        .contains(&code)
    }

    fn is_connection_lost(code: i32) -> bool {
        [
            ws::WSAECONNRESET,
            ws::WSAESHUTDOWN,
            ws::WSAENOTCONN,
            ws::WSAECONNABORTED,
        ]
        .contains(&code)
    }

    fn is_not_connected(code: i32) -> bool {
        code == ws::WSAENOTCONN
    }

    fn is_recv_truncated(code: i32) -> bool {
        code == ws::WSAEMSGSIZE
    }

    fn is_shutdown_benign(code: i32) -> bool {
        code == ws::WSAENOTCONN || code == ws::WSAECONNRESET
    }

    fn describe(code: i32) -> String {
        match winsock_name(code) {
            Some(name) => name.to_string(),
            None => format!("unknown socket error: {}", code),
        }
    }

    fn describe_dns(code: i32) -> String {
        Self::describe(code)
    }

    fn is_dns_try_again(code: i32) -> bool {
        code == ws::WSATRY_AGAIN
    }

    fn is_dns_no_name(code: i32) -> bool {
        code == ws::WSAHOST_NOT_FOUND
    }

    fn lookup(
        host: &str,
        protocol: ProtocolSupport,
        passive: bool,
        numeric_only: bool,
    ) -> std::result::Result<Vec<SocketAddress>, i32> {
        // getaddrinfo needs an initialised Winsock; socket2 performs WSAStartup once.
        let _ = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, None);

        let node = if host.is_empty() {
            None
        } else {
            Some(CString::new(host).map_err(|_| ws::WSAHOST_NOT_FOUND)?)
        };
        // SAFETY: ADDRINFOA is a plain C struct; all-zero means "no hints".
        let mut hints: ws::ADDRINFOA = unsafe { std::mem::zeroed() };
        hints.ai_family = match protocol {
            ProtocolSupport::Ipv4Only => ws::AF_INET as i32,
            ProtocolSupport::Ipv6Only => ws::AF_INET6 as i32,
            ProtocolSupport::Both => ws::AF_UNSPEC as i32,
        };
        if passive {
            hints.ai_flags |= ws::AI_PASSIVE as i32;
        }
        if numeric_only {
            hints.ai_flags |= ws::AI_NUMERICHOST as i32;
        }

        let node_ptr = node.as_ref().map_or(ptr::null(), |n| n.as_ptr() as *const u8);
        let service_ptr: *const u8 = if node.is_none() { b"1\0".as_ptr() } else { ptr::null() };
        let mut info: *mut ws::ADDRINFOA = ptr::null_mut();
        // SAFETY: all pointers are valid for the duration of the call.
        let rs = unsafe { ws::getaddrinfo(node_ptr, service_ptr, &hints, &mut info) };
        if rs != 0 {
            return Err(rs);
        }

        let mut addresses = Vec::new();
        let mut cursor = info;
        while !cursor.is_null() {
            // SAFETY: cursor walks the list getaddrinfo allocated; it is freed below.
            let entry = unsafe { &*cursor };
            if let Some(addr) = unsafe { address_from_raw(entry.ai_addr.cast_const(), entry.ai_addrlen) } {
                addresses.push(addr.with_port(0));
            }
            cursor = entry.ai_next;
        }
        // SAFETY: info came from a successful getaddrinfo call.
        unsafe { ws::freeaddrinfo(info) };
        Ok(addresses)
    }

    fn wait(socket: &socket2::Socket, readiness: Readiness, timeout_ms: i32) -> io::Result<bool> {
        let fd = socket.as_raw_socket() as ws::SOCKET;
        match readiness {
            Readiness::Readable => poll_readable(fd, timeout_ms),
            // A refused connect only shows up in the except set.
            Readiness::Writable => select_writable(fd, timeout_ms),
        }
    }

    fn local_addresses(protocol: ProtocolSupport) -> io::Result<Vec<SocketAddress>> {
        let mut addresses = Vec::new();
        for family in protocol.families() {
            let domain = match family {
                AddressFamily::Ipv4 => socket2::Domain::IPV4,
                AddressFamily::Ipv6 => socket2::Domain::IPV6,
            };
            let query_socket = socket2::Socket::new(domain, socket2::Type::STREAM, None)?;
            addresses.extend(address_list(&query_socket)?);
        }
        Ok(addresses)
    }

    fn interface_index(interface: &str) -> Result<u32> {
        Ok(interface.parse::<u32>().unwrap_or(0))
    }

    fn pipe() -> Result<NotificationPipe> {
        NotificationPipe::loopback()
    }
}

/// Query the interface address list bound to a socket of the queried family
fn address_list(socket: &socket2::Socket) -> io::Result<Vec<SocketAddress>> {
    // u64 storage keeps the pointer-bearing list aligned.
    let mut buffer: Vec<u64> = vec![0; 128];
    loop {
        let mut needed: u32 = 0;
        // SAFETY: buffer is writable for its full length; no overlapped I/O is requested.
        let rs = unsafe {
            ws::WSAIoctl(
                socket.as_raw_socket() as ws::SOCKET,
                ws::SIO_ADDRESS_LIST_QUERY,
                ptr::null(),
                0,
                buffer.as_mut_ptr().cast(),
                (buffer.len() * 8) as u32,
                &mut needed,
                ptr::null_mut(),
                None,
            )
        };
        if rs == ws::SOCKET_ERROR {
            let code = WindowsPlatform::last_error();
            if code == ws::WSAEFAULT && needed as usize > buffer.len() * 8 {
                buffer.resize((needed as usize).div_ceil(8), 0);
                continue;
            }
            return Err(io::Error::from_raw_os_error(code));
        }
        break;
    }

    // SAFETY: the ioctl filled buffer with a SOCKET_ADDRESS_LIST.
    let list = unsafe { &*(buffer.as_ptr() as *const ws::SOCKET_ADDRESS_LIST) };
    let count = list.iAddressCount.max(0) as usize;
    let entries = unsafe { std::slice::from_raw_parts(list.Address.as_ptr(), count) };
    Ok(entries
        .iter()
        .filter_map(|entry| unsafe {
            address_from_raw(entry.lpSockaddr.cast_const(), entry.iSockaddrLength.max(0) as usize)
        })
        .collect())
}

/// Symbolic Winsock error names
fn winsock_name(code: i32) -> Option<&'static str> {
    let name = match code {
        ws::WSAEINTR => "WSAEINTR",
        ws::WSAEBADF => "WSAEBADF",
        ws::WSAEACCES => "WSAEACCES",
        ws::WSAEFAULT => "WSAEFAULT",
        ws::WSAEINVAL => "WSAEINVAL",
        ws::WSAEMFILE => "WSAEMFILE",
        ws::WSAEWOULDBLOCK => "WSAEWOULDBLOCK",
        ws::WSAEINPROGRESS => "WSAEINPROGRESS",
        ws::WSAEALREADY => "WSAEALREADY",
        ws::WSAENOTSOCK => "WSAENOTSOCK",
        ws::WSAEDESTADDRREQ => "WSAEDESTADDRREQ",
        ws::WSAEMSGSIZE => "WSAEMSGSIZE",
        ws::WSAEPROTOTYPE => "WSAEPROTOTYPE",
        ws::WSAENOPROTOOPT => "WSAENOPROTOOPT",
        ws::WSAEPROTONOSUPPORT => "WSAEPROTONOSUPPORT",
        ws::WSAESOCKTNOSUPPORT => "WSAESOCKTNOSUPPORT",
        ws::WSAEOPNOTSUPP => "WSAEOPNOTSUPP",
        ws::WSAEPFNOSUPPORT => "WSAEPFNOSUPPORT",
        ws::WSAEAFNOSUPPORT => "WSAEAFNOSUPPORT",
        ws::WSAEADDRINUSE => "WSAEADDRINUSE",
        ws::WSAEADDRNOTAVAIL => "WSAEADDRNOTAVAIL",
        ws::WSAENETDOWN => "WSAENETDOWN",
        ws::WSAENETUNREACH => "WSAENETUNREACH",
        ws::WSAENETRESET => "WSAENETRESET",
        ws::WSAECONNABORTED => "WSAECONNABORTED",
        ws::WSAECONNRESET => "WSAECONNRESET",
        ws::WSAENOBUFS => "WSAENOBUFS",
        ws::WSAEISCONN => "WSAEISCONN",
        ws::WSAENOTCONN => "WSAENOTCONN",
        ws::WSAESHUTDOWN => "WSAESHUTDOWN",
        ws::WSAETOOMANYREFS => "WSAETOOMANYREFS",
        ws::WSAETIMEDOUT => "WSAETIMEDOUT",
        ws::WSAECONNREFUSED => "WSAECONNREFUSED",
        ws::WSAELOOP => "WSAELOOP",
        ws::WSAENAMETOOLONG => "WSAENAMETOOLONG",
        ws::WSAEHOSTDOWN => "WSAEHOSTDOWN",
        ws::WSAEHOSTUNREACH => "WSAEHOSTUNREACH",
        ws::WSAENOTEMPTY => "WSAENOTEMPTY",
        ws::WSAEPROCLIM => "WSAEPROCLIM",
        ws::WSAEUSERS => "WSAEUSERS",
        ws::WSAEDQUOT => "WSAEDQUOT",
        ws::WSAESTALE => "WSAESTALE",
        ws::WSAEREMOTE => "WSAEREMOTE",
        ws::WSAEDISCON => "WSAEDISCON",
        ws::WSASYSNOTREADY => "WSASYSNOTREADY",
        ws::WSAVERNOTSUPPORTED => "WSAVERNOTSUPPORTED",
        ws::WSANOTINITIALISED => "WSANOTINITIALISED",
        ws::WSAHOST_NOT_FOUND => "WSAHOST_NOT_FOUND",
        ws::WSATRY_AGAIN => "WSATRY_AGAIN",
        ws::WSANO_RECOVERY => "WSANO_RECOVERY",
        ws::WSANO_DATA => "WSANO_DATA",
        _ => return None,
    };
    Some(name)
}

fn poll_readable(fd: ws::SOCKET, timeout_ms: i32) -> io::Result<bool> {
    let mut pfd = ws::WSAPOLLFD {
        fd,
        events: ws::POLLRDNORM,
        revents: 0,
    };
    // SAFETY: pfd is a single valid WSAPOLLFD.
    match unsafe { ws::WSAPoll(&mut pfd, 1, timeout_ms) } {
        ws::SOCKET_ERROR => Err(io::Error::from_raw_os_error(WindowsPlatform::last_error())),
        0 => Ok(false),
        _ => Ok(true),
    }
}

fn single_fd_set(fd: ws::SOCKET) -> ws::FD_SET {
    let mut set = ws::FD_SET {
        fd_count: 1,
        fd_array: [0; 64],
    };
    set.fd_array[0] = fd;
    set
}

fn select_writable(fd: ws::SOCKET, timeout_ms: i32) -> io::Result<bool> {
    let mut write_set = single_fd_set(fd);
    let mut except_set = single_fd_set(fd);
    let timeout = ws::TIMEVAL {
        tv_sec: timeout_ms.max(0) / 1000,
        tv_usec: (timeout_ms.max(0) % 1000) * 1000,
    };
    let timeout_ptr = if timeout_ms < 0 { ptr::null() } else { &timeout as *const ws::TIMEVAL };
    // SAFETY: both sets and the timeout outlive the call; nfds is ignored on Windows.
    match unsafe { ws::select(0, ptr::null_mut(), &mut write_set, &mut except_set, timeout_ptr) } {
        ws::SOCKET_ERROR => Err(io::Error::from_raw_os_error(WindowsPlatform::last_error())),
        0 => Ok(false),
        _ => Ok(true),
    }
}
