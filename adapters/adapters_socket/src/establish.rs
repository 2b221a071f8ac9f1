//! Connection Establishment Module
//!
//! Bind, listen, connect and accept with uniform interrupt handling and timeouts.
//!
//! ## Overview
//!
//! - **bind**: binds and reports the address actually bound (useful with port 0)
//! - **listen**: starts listening, retrying interrupted calls
//! - **connect**: starts a connect; with a non-zero timeout it also waits for completion
//! - **finish_connect**: completes a connect that was reported as in progress
//! - **accept**: accepts one connection, waiting up to a timeout on a non-blocking listener
//! - **wait_ready**: waits for a handle to become readable or writable
//!
//! Operations that take a [`SocketHandle`] by value close it on failure; the caller only
//! gets it back on success. `accept` borrows the listener, which stays open whatever the
//! outcome.
//!
//! On Linux a connect to a local ephemeral port can be completed by the kernel with the
//! connecting socket itself. Such a self-connection is reported as
//! [`TransportError::ConnectionRefused`] carrying [`ErrorCode::NONE`].

use entities_network::{SocketAddress, Timeout};
use socket2::SockAddr;

use crate::error::{ErrorCode, Result, TransportError};
use crate::retry;
use crate::socket::{SocketHandle, SocketType};
use crate::sys::{Platform, Readiness, Sys};

/// Result of starting a connect
#[derive(Debug)]
pub enum ConnectOutcome {
    /// The connection is established
    Connected(SocketHandle),
    /// The connection is still being established; complete it with
    /// [`ConnectionEstablisher::finish_connect`]
    InProgress(SocketHandle),
}

impl ConnectOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectOutcome::Connected(_))
    }

    /// The handle, connected or not
    pub fn into_handle(self) -> SocketHandle {
        match self {
            ConnectOutcome::Connected(handle) | ConnectOutcome::InProgress(handle) => handle,
        }
    }
}

/// Connection establishment operations
pub struct ConnectionEstablisher;

impl ConnectionEstablisher {
    /// Bind a socket to an address
    ///
    /// # Arguments
    ///
    /// * `handle` - Socket to bind; closed if binding fails
    /// * `addr` - Local address; port 0 lets the system choose
    ///
    /// # Returns
    ///
    /// * `Ok((SocketHandle, SocketAddress))` - The bound socket and the address actually bound
    /// * `Err(TransportError::Socket)` - Binding failed
    pub fn bind(handle: SocketHandle, addr: &SocketAddress) -> Result<(SocketHandle, SocketAddress)> {
        let target = SockAddr::from(addr.to_std());
        if let Err(err) = handle.inner().bind(&target) {
            return Err(TransportError::socket(&err));
        }
        let bound = handle.local_address()?;
        Ok((handle, bound))
    }

    /// Start listening for connections
    pub fn listen(handle: SocketHandle, backlog: i32) -> Result<SocketHandle> {
        retry::until_settled(
            || handle.inner().listen(backlog),
            |err| ErrorCode::from(err).was_interrupted(),
        )
        .map_err(|err| TransportError::socket(&err))?;
        Ok(handle)
    }

    /// Connect to a remote address
    ///
    /// # Arguments
    ///
    /// * `handle` - Socket to connect; closed if the connect fails
    /// * `addr` - Remote address
    /// * `timeout` - How long to wait for a non-blocking connect to complete. With
    ///   [`Timeout::Immediate`] a pending connect is returned as
    ///   [`ConnectOutcome::InProgress`].
    ///
    /// # Returns
    ///
    /// * `Ok(ConnectOutcome)` - Connected, or still in progress
    /// * `Err(TransportError::ConnectionRefused)` - The peer refused, or the socket
    ///   connected to itself
    /// * `Err(TransportError::ConnectFailed)` - The peer could not be reached
    /// * `Err(TransportError::ConnectTimeout)` - The connect did not complete in time
    /// * `Err(TransportError::Socket)` - Any other failure
    pub fn connect(handle: SocketHandle, addr: &SocketAddress, timeout: Timeout) -> Result<ConnectOutcome> {
        let target = SockAddr::from(addr.to_std());
        let attempt = retry::until_settled(
            || handle.inner().connect(&target),
            |err| ErrorCode::from(err).was_interrupted(),
        );
        if let Err(err) = attempt {
            let code = ErrorCode::from(&err);
            if !code.connect_in_progress() {
                return Err(TransportError::connect(code));
            }
            if timeout.is_immediate() {
                return Ok(ConnectOutcome::InProgress(handle));
            }
            return Self::finish_connect(handle, timeout).map(ConnectOutcome::Connected);
        }
        check_self_connect(&handle, Some(*addr))?;
        Ok(ConnectOutcome::Connected(handle))
    }

    /// Complete a connect that was reported as in progress
    ///
    /// With [`Timeout::Immediate`] the pending error is read without waiting; otherwise
    /// the handle is first awaited for writability.
    pub fn finish_connect(handle: SocketHandle, timeout: Timeout) -> Result<SocketHandle> {
        if !timeout.is_immediate() && !Self::wait_ready(&handle, Readiness::Writable, timeout)? {
            return Err(TransportError::ConnectTimeout);
        }
        match handle.inner().take_error() {
            Ok(None) => {}
            Ok(Some(err)) => return Err(TransportError::connect(ErrorCode::from(&err))),
            Err(err) => return Err(TransportError::socket(&err)),
        }
        check_self_connect(&handle, None)?;
        Ok(handle)
    }

    /// Accept one incoming connection
    ///
    /// Connections aborted by the peer before they could be accepted are skipped. On a
    /// non-blocking listener with nothing pending, waits up to `timeout` for a connection.
    /// The accepted socket has Nagle's algorithm disabled and keep-alive enabled.
    ///
    /// # Arguments
    ///
    /// * `listener` - Listening socket; never closed by this call
    /// * `timeout` - Longest wait for a pending connection
    ///
    /// # Returns
    ///
    /// * `Ok(SocketHandle)` - The accepted connection
    /// * `Err(TransportError::Timeout)` - Nothing arrived within `timeout`
    /// * `Err(TransportError::Socket)` - Any other failure
    pub fn accept(listener: &SocketHandle, timeout: Timeout) -> Result<SocketHandle> {
        loop {
            let attempt = retry::until_settled(
                || listener.inner().accept(),
                |err| ErrorCode::from(err).accept_was_interrupted(),
            );
            match attempt {
                Ok((socket, _)) => {
                    return SocketHandle::from_parts(socket, listener.family(), SocketType::Stream)
                        .set_tcp_no_delay()?
                        .set_keep_alive();
                }
                Err(err) => {
                    let code = ErrorCode::from(&err);
                    if !code.would_block() {
                        return Err(TransportError::Socket(code));
                    }
                    if !Self::wait_ready(listener, Readiness::Readable, timeout)? {
                        return Err(TransportError::Timeout);
                    }
                }
            }
        }
    }

    /// Wait until a handle is readable or writable
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The handle is ready
    /// * `Ok(false)` - The timeout expired first
    /// * `Err(TransportError::Socket)` - The wait itself failed
    pub fn wait_ready(handle: &SocketHandle, readiness: Readiness, timeout: Timeout) -> Result<bool> {
        let timeout_ms = timeout.as_poll_millis();
        retry::until_settled(
            || Sys::wait(handle.inner(), readiness, timeout_ms),
            |err| ErrorCode::from(err).was_interrupted(),
        )
        .map_err(|err| TransportError::socket(&err))
    }
}

/// Reject a connection whose local and peer addresses are the same
fn check_self_connect(handle: &SocketHandle, peer: Option<SocketAddress>) -> Result<()> {
    if !Sys::SELF_CONNECT_CHECK {
        return Ok(());
    }
    let peer = match peer {
        Some(peer) => peer,
        None => match handle.remote_address()? {
            Some(peer) => peer,
            None => return Ok(()),
        },
    };
    let local = handle.local_address()?;
    if local == peer {
        log::debug!("connection to {} completed with itself", peer);
        return Err(TransportError::ConnectionRefused(ErrorCode::NONE));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use entities_network::AddressFamily;
    use std::time::{Duration, Instant};

    fn listener() -> (SocketHandle, SocketAddress) {
        let handle = SocketHandle::create(SocketType::Stream, AddressFamily::Ipv4)
            .unwrap()
            .set_blocking(false)
            .unwrap();
        let (handle, bound) =
            ConnectionEstablisher::bind(handle, &SocketAddress::loopback(AddressFamily::Ipv4, 0)).unwrap();
        (ConnectionEstablisher::listen(handle, 16).unwrap(), bound)
    }

    fn client() -> SocketHandle {
        SocketHandle::create(SocketType::Stream, AddressFamily::Ipv4)
            .unwrap()
            .set_blocking(false)
            .unwrap()
    }

    #[test]
    fn test_bind_reports_chosen_port() {
        let (_listener, bound) = listener();
        assert!(bound.is_loopback());
        assert_ne!(bound.port(), 0);
    }

    #[test]
    fn test_bind_conflict_fails() {
        let (_listener, bound) = listener();
        let second = SocketHandle::create(SocketType::Stream, AddressFamily::Ipv4).unwrap();
        let err = ConnectionEstablisher::bind(second, &bound).unwrap_err();
        assert!(matches!(err, TransportError::Socket(code) if !code.is_none()));
    }

    #[test]
    fn test_accept_immediate_times_out() {
        let (listener, _) = listener();
        let err = ConnectionEstablisher::accept(&listener, Timeout::Immediate).unwrap_err();
        assert_eq!(err, TransportError::Timeout);
        // The listener survives a timeout.
        assert!(listener.local_address().is_ok());
    }

    #[test]
    fn test_connect_and_accept() {
        let (listener, bound) = listener();
        let outcome = ConnectionEstablisher::connect(client(), &bound, Timeout::Immediate).unwrap();
        let connecting = match outcome {
            ConnectOutcome::Connected(handle) => handle,
            ConnectOutcome::InProgress(handle) => {
                ConnectionEstablisher::finish_connect(handle, Timeout::from_millis(5_000)).unwrap()
            }
        };

        let accepted = ConnectionEstablisher::accept(&listener, Timeout::from_millis(5_000)).unwrap();
        assert!(accepted.inner().nodelay().unwrap());
        assert_eq!(accepted.remote_address().unwrap(), Some(connecting.local_address().unwrap()));
        assert_eq!(connecting.remote_address().unwrap(), Some(bound));
    }

    #[test]
    fn test_connect_with_timeout_waits_for_completion() {
        let (_listener, bound) = listener();
        let outcome = ConnectionEstablisher::connect(client(), &bound, Timeout::from_millis(5_000)).unwrap();
        assert!(outcome.is_connected());
    }

    #[test]
    fn test_connect_refused() {
        // Bind without listening so the port is known to be closed.
        let (idle, closed) = ConnectionEstablisher::bind(
            SocketHandle::create(SocketType::Stream, AddressFamily::Ipv4).unwrap(),
            &SocketAddress::loopback(AddressFamily::Ipv4, 0),
        )
        .unwrap();

        let blocking = SocketHandle::create(SocketType::Stream, AddressFamily::Ipv4).unwrap();
        let err = ConnectionEstablisher::connect(blocking, &closed, Timeout::Infinite).unwrap_err();
        assert!(matches!(
            err,
            TransportError::ConnectionRefused(_) | TransportError::ConnectFailed(_)
        ));
        drop(idle);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_connect_to_own_address_is_refused() {
        for blocking in [true, false] {
            let handle = SocketHandle::create(SocketType::Stream, AddressFamily::Ipv4)
                .unwrap()
                .set_blocking(blocking)
                .unwrap();
            let (handle, own) =
                ConnectionEstablisher::bind(handle, &SocketAddress::loopback(AddressFamily::Ipv4, 0)).unwrap();
            let err = ConnectionEstablisher::connect(handle, &own, Timeout::from_millis(1_000)).unwrap_err();
            assert_eq!(err, TransportError::ConnectionRefused(ErrorCode::NONE));
        }
    }

    #[test]
    fn test_wait_ready_reports_writable_connection() {
        let (_listener, bound) = listener();
        let connected = ConnectionEstablisher::connect(client(), &bound, Timeout::from_millis(5_000))
            .unwrap()
            .into_handle();
        let started = Instant::now();
        assert!(ConnectionEstablisher::wait_ready(&connected, Readiness::Writable, Timeout::Infinite).unwrap());
        assert!(!ConnectionEstablisher::wait_ready(&connected, Readiness::Readable, Timeout::Immediate).unwrap());
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
