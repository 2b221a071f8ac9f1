//! Socket Module
//!
//! Provides the owned socket handle the rest of the transport is built on. The handle wraps
//! a `socket2` socket together with its address family and type, and exposes the option
//! setters, address queries and shutdown operations the transport needs.
//!
//! ## Ownership
//!
//! Operations that configure a handle consume it and give it back on success:
//!
//! ```no_run
//! use adapters_socket::{SocketHandle, SocketType};
//! use entities_network::AddressFamily;
//!
//! let handle = SocketHandle::create(SocketType::Stream, AddressFamily::Ipv4)?
//!     .set_blocking(false)?
//!     .set_reuse_address(true)?;
//! # Ok::<(), adapters_socket::TransportError>(())
//! ```
//!
//! When such an operation fails the handle is dropped, and with it the descriptor is
//! closed, after the error code has been captured. A failed setter therefore never leaks
//! a descriptor and never reports the error of the close instead of its own.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, TcpListener, TcpStream, UdpSocket};
#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};
#[cfg(windows)]
use std::os::windows::io::{AsRawSocket, RawSocket};

use entities_network::{AddressFamily, ProtocolSupport, SocketAddress};
use socket2::{Domain, Protocol, Socket as Socket2, Type};

use crate::config::TransportConfig;
use crate::error::{ErrorCode, Result, TransportError};
use crate::logger::WarningSink;
use crate::resolver::AddressResolver;
use crate::sys::{Platform, Sys};

/// Socket type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketType {
    /// Stream socket (TCP)
    Stream,
    /// Datagram socket (UDP)
    Datagram,
}

impl From<SocketType> for Type {
    fn from(ty: SocketType) -> Self {
        match ty {
            SocketType::Stream => Type::STREAM,
            SocketType::Datagram => Type::DGRAM,
        }
    }
}

impl SocketType {
    fn protocol(&self) -> Protocol {
        match self {
            SocketType::Stream => Protocol::TCP,
            SocketType::Datagram => Protocol::UDP,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SocketType::Stream => "TCP",
            SocketType::Datagram => "UDP",
        }
    }
}

/// Socket buffer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Receive,
    Send,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferKind::Receive => f.write_str("receive"),
            BufferKind::Send => f.write_str("send"),
        }
    }
}

pub(crate) fn domain_of(family: AddressFamily) -> Domain {
    match family {
        AddressFamily::Ipv4 => Domain::IPV4,
        AddressFamily::Ipv6 => Domain::IPV6,
    }
}

/// Owned socket handle
///
/// Dropping the handle closes the socket.
pub struct SocketHandle {
    inner: Socket2,
    family: AddressFamily,
    socket_type: SocketType,
}

impl SocketHandle {
    /// Create a new socket
    ///
    /// Stream sockets are created with Nagle's algorithm disabled and keep-alive enabled.
    /// The blocking mode is left at the platform default (blocking).
    ///
    /// # Arguments
    ///
    /// * `socket_type` - Stream (TCP) or Datagram (UDP)
    /// * `family` - Address family (IPv4 or IPv6)
    ///
    /// # Returns
    ///
    /// * `Ok(SocketHandle)` - Created socket
    /// * `Err(TransportError::Socket)` - Socket creation or initial configuration failed
    pub fn create(socket_type: SocketType, family: AddressFamily) -> Result<Self> {
        let inner = Socket2::new(domain_of(family), socket_type.into(), Some(socket_type.protocol()))
            .map_err(|e| TransportError::socket(&e))?;
        let handle = Self::from_parts(inner, family, socket_type);
        match socket_type {
            SocketType::Stream => handle.set_tcp_no_delay()?.set_keep_alive(),
            SocketType::Datagram => Ok(handle),
        }
    }

    pub(crate) fn from_parts(inner: Socket2, family: AddressFamily, socket_type: SocketType) -> Self {
        Self {
            inner,
            family,
            socket_type,
        }
    }

    /// Run a configuration step, closing the handle if it fails
    fn configure(self, op: impl FnOnce(&Socket2) -> io::Result<()>) -> Result<Self> {
        match op(&self.inner) {
            Ok(()) => Ok(self),
            Err(err) => {
                let code = ErrorCode::from(&err);
                drop(self);
                Err(TransportError::Socket(code))
            }
        }
    }

    pub fn set_tcp_no_delay(self) -> Result<Self> {
        self.configure(|s| s.set_nodelay(true))
    }

    pub fn set_keep_alive(self) -> Result<Self> {
        self.configure(|s| s.set_keepalive(true))
    }

    /// Switch between blocking and non-blocking mode
    pub fn set_blocking(self, blocking: bool) -> Result<Self> {
        self.configure(|s| s.set_nonblocking(!blocking))
    }

    /// Set socket option for reuse address
    pub fn set_reuse_address(self, reuse: bool) -> Result<Self> {
        self.configure(|s| s.set_reuse_address(reuse))
    }

    pub fn set_send_buffer_size(self, size: usize) -> Result<Self> {
        self.configure(|s| s.set_send_buffer_size(size))
    }

    /// Send buffer size the kernel actually granted
    pub fn send_buffer_size(&self) -> Result<usize> {
        self.inner
            .send_buffer_size()
            .map_err(|e| TransportError::socket(&e))
    }

    pub fn set_recv_buffer_size(self, size: usize) -> Result<Self> {
        self.configure(|s| s.set_recv_buffer_size(size))
    }

    /// Receive buffer size the kernel actually granted
    pub fn recv_buffer_size(&self) -> Result<usize> {
        self.inner
            .recv_buffer_size()
            .map_err(|e| TransportError::socket(&e))
    }

    /// Request a buffer size and warn if the kernel grants less
    ///
    /// # Arguments
    ///
    /// * `kind` - Receive or send buffer
    /// * `requested` - Size in bytes; `0` or less leaves the buffer untouched
    /// * `sink` - Receives the warning when the granted size is smaller
    ///
    /// # Returns
    ///
    /// * `Ok(SocketHandle)` - The configured handle
    /// * `Err(TransportError::Socket)` - The option could not be set or read back
    pub fn apply_buffer_size(
        self,
        kind: BufferKind,
        requested: i32,
        sink: &dyn WarningSink,
    ) -> Result<Self> {
        if requested <= 0 {
            return Ok(self);
        }
        let requested = requested as usize;
        let handle = match kind {
            BufferKind::Receive => self.set_recv_buffer_size(requested)?,
            BufferKind::Send => self.set_send_buffer_size(requested)?,
        };
        let granted = match kind {
            BufferKind::Receive => handle.recv_buffer_size()?,
            BufferKind::Send => handle.send_buffer_size()?,
        };
        if granted < requested {
            sink.warning(&format!(
                "{} {} buffer size: requested size of {} adjusted to {}",
                handle.socket_type.label(),
                kind,
                requested,
                granted
            ));
        }
        Ok(handle)
    }

    /// Apply the configured TCP buffer sizes
    pub fn apply_tcp_buffer_sizes(
        self,
        config: &TransportConfig,
        sink: &dyn WarningSink,
    ) -> Result<Self> {
        self.apply_buffer_size(BufferKind::Receive, config.tcp_recv_buffer_size, sink)?
            .apply_buffer_size(BufferKind::Send, config.tcp_send_buffer_size, sink)
    }

    /// Join a multicast group
    ///
    /// # Arguments
    ///
    /// * `group` - Group address; its family selects IPv4 or IPv6 membership
    /// * `interface` - For IPv4, a host name or address resolved to the local interface;
    ///   for IPv6, an interface index or name. Empty selects the default interface.
    pub fn join_multicast_group(self, group: &SocketAddress, interface: &str) -> Result<Self> {
        match group.ip() {
            IpAddr::V4(group_ip) => {
                let iface = ipv4_interface(interface)?;
                self.configure(|s| s.join_multicast_v4(&group_ip, &iface))
            }
            IpAddr::V6(group_ip) => {
                let index = Sys::interface_index(interface)?;
                self.configure(|s| s.join_multicast_v6(&group_ip, index))
            }
        }
    }

    /// Select the outgoing interface for multicast datagrams
    pub fn set_multicast_interface(self, interface: &str) -> Result<Self> {
        match self.family {
            AddressFamily::Ipv4 => {
                let iface = ipv4_interface(interface)?;
                self.configure(|s| s.set_multicast_if_v4(&iface))
            }
            AddressFamily::Ipv6 => {
                let index = Sys::interface_index(interface)?;
                self.configure(|s| s.set_multicast_if_v6(index))
            }
        }
    }

    /// Set the multicast TTL (IPv4) or hop limit (IPv6)
    pub fn set_multicast_ttl(self, ttl: u32) -> Result<Self> {
        match self.family {
            AddressFamily::Ipv4 => self.configure(|s| s.set_multicast_ttl_v4(ttl)),
            AddressFamily::Ipv6 => self.configure(|s| s.set_multicast_hops_v6(ttl)),
        }
    }

    /// Get the local address
    pub fn local_address(&self) -> Result<SocketAddress> {
        let addr = self
            .inner
            .local_addr()
            .map_err(|e| TransportError::socket(&e))?;
        addr.as_socket()
            .map(SocketAddress::from)
            .ok_or(TransportError::Socket(ErrorCode::NONE))
    }

    /// Get the peer address, or `None` if the socket is not connected
    pub fn remote_address(&self) -> Result<Option<SocketAddress>> {
        match self.inner.peer_addr() {
            Ok(addr) => Ok(addr.as_socket().map(SocketAddress::from)),
            Err(err) => {
                let code = ErrorCode::from(&err);
                if code.not_connected() {
                    Ok(None)
                } else {
                    Err(TransportError::Socket(code))
                }
            }
        }
    }

    /// Shut down the sending direction; a peer that is already gone is not an error
    pub fn shutdown_write(&self) -> Result<()> {
        self.shutdown(Shutdown::Write)
    }

    /// Shut down both directions; a peer that is already gone is not an error
    pub fn shutdown_read_write(&self) -> Result<()> {
        self.shutdown(Shutdown::Both)
    }

    fn shutdown(&self, how: Shutdown) -> Result<()> {
        match self.inner.shutdown(how) {
            Ok(()) => Ok(()),
            Err(err) => {
                let code = ErrorCode::from(&err);
                if Sys::is_shutdown_benign(code.raw()) {
                    Ok(())
                } else {
                    Err(TransportError::Socket(code))
                }
            }
        }
    }

    /// Get the raw file descriptor (Unix) or socket handle (Windows)
    #[cfg(unix)]
    pub fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }

    #[cfg(windows)]
    pub fn as_raw_socket(&self) -> RawSocket {
        self.inner.as_raw_socket()
    }

    /// Get the underlying socket2 socket
    pub fn inner(&self) -> &Socket2 {
        &self.inner
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn socket_type(&self) -> SocketType {
        self.socket_type
    }

    pub fn into_tcp_stream(self) -> TcpStream {
        self.inner.into()
    }

    pub fn into_tcp_listener(self) -> TcpListener {
        self.inner.into()
    }

    pub fn into_udp_socket(self) -> UdpSocket {
        self.inner.into()
    }
}

/// Local IPv4 interface address for multicast options ("" = any)
fn ipv4_interface(interface: &str) -> Result<Ipv4Addr> {
    if interface.is_empty() {
        return Ok(Ipv4Addr::UNSPECIFIED);
    }
    match AddressResolver::resolve(interface, 0, ProtocolSupport::Ipv4Only)?.ip() {
        IpAddr::V4(ip) => Ok(ip),
        IpAddr::V6(_) => Ok(Ipv4Addr::UNSPECIFIED),
    }
}

impl fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketHandle")
            .field("family", &self.family)
            .field("socket_type", &self.socket_type)
            .field("local", &self.local_address().ok())
            .finish()
    }
}

/// Renders `local address = <addr>` and `remote address = <addr>` on two lines
impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local = match self.local_address() {
            Ok(addr) => addr,
            Err(_) => return f.write_str("<closed>"),
        };
        write!(f, "local address = {}", local)?;
        match self.remote_address() {
            Ok(Some(remote)) => write!(f, "\nremote address = {}", remote),
            _ => f.write_str("\nremote address = <not connected>"),
        }
    }
}

impl Read for SocketHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for SocketHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
