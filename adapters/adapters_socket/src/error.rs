//! Error Module
//!
//! Platform error codes and the transport error taxonomy.
//!
//! ## Overview
//!
//! Every socket failure is captured as an [`ErrorCode`] at the moment the failing call
//! returns, before any cleanup can overwrite the thread's last-error state. Callers never
//! compare raw codes themselves; they ask the code what *kind* of failure it is
//! (`was_interrupted`, `would_block`, `connect_failed`, ...), and the answer is the same on
//! every platform even though the underlying constants differ.
//!
//! Failures that escape an operation are reported as a [`TransportError`]:
//!
//! - **AddressResolution**: a name lookup failed or produced nothing usable
//! - **Socket**: generic socket failure
//! - **ConnectionRefused** / **ConnectFailed**: the connect attempt itself failed
//! - **ConnectTimeout** / **Timeout**: a bounded wait expired
//! - **Syscall**: a non-socket system call failed

use std::fmt;
use std::io;

use thiserror::Error;

use crate::sys::{Platform, Sys};

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Platform socket error code
///
/// Code `0` ([`ErrorCode::NONE`]) means "no corresponding system error" and is used for
/// conditions detected by the transport itself, such as a self-connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(i32);

impl ErrorCode {
    pub const NONE: ErrorCode = ErrorCode(0);

    pub fn new(raw: i32) -> Self {
        ErrorCode(raw)
    }

    /// Capture the calling thread's last socket error
    ///
    /// Must be called immediately after the failing call, before any other socket API use.
    pub fn last() -> Self {
        ErrorCode(Sys::last_error())
    }

    pub fn raw(&self) -> i32 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// The call was interrupted and can simply be repeated
    pub fn was_interrupted(&self) -> bool {
        Sys::is_interrupted(self.0)
    }

    /// An `accept` failed only for the connection being accepted; the listener is fine
    pub fn accept_was_interrupted(&self) -> bool {
        self.was_interrupted() || Sys::is_accept_aborted(self.0)
    }

    pub fn no_buffers(&self) -> bool {
        Sys::is_no_buffers(self.0)
    }

    pub fn would_block(&self) -> bool {
        Sys::is_would_block(self.0)
    }

    /// A non-blocking connect was started and has not completed yet
    pub fn connect_in_progress(&self) -> bool {
        Sys::is_connect_in_progress(self.0)
    }

    pub fn connection_refused(&self) -> bool {
        Sys::is_connection_refused(self.0)
    }

    /// The connect attempt failed in a way that says nothing about the local socket
    pub fn connect_failed(&self) -> bool {
        Sys::is_connect_failed(self.0)
    }

    /// An established connection has been lost
    pub fn connection_lost(&self) -> bool {
        Sys::is_connection_lost(self.0)
    }

    pub fn not_connected(&self) -> bool {
        Sys::is_not_connected(self.0)
    }

    /// A datagram was larger than the receive buffer
    pub fn recv_truncated(&self) -> bool {
        Sys::is_recv_truncated(self.0)
    }

    /// Human-readable description
    pub fn describe(&self) -> String {
        if self.is_none() {
            "no corresponding system error".to_string()
        } else {
            Sys::describe(self.0)
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl From<&io::Error> for ErrorCode {
    fn from(err: &io::Error) -> Self {
        err.raw_os_error().map(ErrorCode).unwrap_or(ErrorCode::NONE)
    }
}

impl From<io::Error> for ErrorCode {
    fn from(err: io::Error) -> Self {
        ErrorCode::from(&err)
    }
}

/// Describe the calling thread's last socket error
pub fn last_error_to_string() -> String {
    ErrorCode::last().describe()
}

/// Name-resolution error code, as returned by `getaddrinfo`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DnsErrorCode(i32);

impl DnsErrorCode {
    pub fn new(raw: i32) -> Self {
        DnsErrorCode(raw)
    }

    pub fn raw(&self) -> i32 {
        self.0
    }

    /// The resolver asks for the lookup to be repeated
    pub fn is_try_again(&self) -> bool {
        Sys::is_dns_try_again(self.0)
    }

    /// The host is unknown, or not a literal in a numeric-only lookup
    pub fn is_no_name(&self) -> bool {
        Sys::is_dns_no_name(self.0)
    }

    pub fn describe(&self) -> String {
        Sys::describe_dns(self.0)
    }
}

impl fmt::Display for DnsErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn describe_dns(code: &Option<DnsErrorCode>) -> String {
    match code {
        Some(code) => code.describe(),
        None => "no address found".to_string(),
    }
}

/// Transport error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Name resolution failed; `code` is `None` when no resolver error applies
    #[error("cannot resolve `{host}`: {}", describe_dns(.code))]
    AddressResolution {
        host: String,
        code: Option<DnsErrorCode>,
    },
    #[error("socket error: {0}")]
    Socket(ErrorCode),
    #[error("connection refused: {0}")]
    ConnectionRefused(ErrorCode),
    #[error("connect failed: {0}")]
    ConnectFailed(ErrorCode),
    #[error("connect timed out")]
    ConnectTimeout,
    #[error("operation timed out")]
    Timeout,
    #[error("system call failed: {0}")]
    Syscall(ErrorCode),
}

impl TransportError {
    /// Generic socket error from a failed `std`/`socket2` call
    pub fn socket(err: &io::Error) -> Self {
        TransportError::Socket(ErrorCode::from(err))
    }

    /// Classify the error of a failed connect attempt
    ///
    /// Refusals are reported as `ConnectionRefused`, other connect failures as
    /// `ConnectFailed`, and everything else as a generic `Socket` error.
    pub fn connect(code: ErrorCode) -> Self {
        if code.connection_refused() {
            TransportError::ConnectionRefused(code)
        } else if code.connect_failed() {
            TransportError::ConnectFailed(code)
        } else {
            TransportError::Socket(code)
        }
    }

    /// Platform error code carried by this error, if any
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            TransportError::Socket(code)
            | TransportError::ConnectionRefused(code)
            | TransportError::ConnectFailed(code)
            | TransportError::Syscall(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::ConnectTimeout | TransportError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    const REFUSED: i32 = libc::ECONNREFUSED;
    #[cfg(windows)]
    const REFUSED: i32 = windows_sys::Win32::Networking::WinSock::WSAECONNREFUSED;

    #[cfg(unix)]
    const UNREACHABLE: i32 = libc::ENETUNREACH;
    #[cfg(windows)]
    const UNREACHABLE: i32 = windows_sys::Win32::Networking::WinSock::WSAENETUNREACH;

    #[test]
    fn test_none_describes_itself() {
        assert!(ErrorCode::NONE.is_none());
        assert_eq!(ErrorCode::NONE.describe(), "no corresponding system error");
    }

    #[test]
    fn test_from_io_error() {
        let err = io::Error::from_raw_os_error(REFUSED);
        assert_eq!(ErrorCode::from(&err), ErrorCode::new(REFUSED));

        let synthetic = io::Error::new(io::ErrorKind::Other, "no os code");
        assert_eq!(ErrorCode::from(synthetic), ErrorCode::NONE);
    }

    #[test]
    fn test_connect_classification() {
        assert_eq!(
            TransportError::connect(ErrorCode::new(REFUSED)),
            TransportError::ConnectionRefused(ErrorCode::new(REFUSED))
        );
        assert_eq!(
            TransportError::connect(ErrorCode::new(UNREACHABLE)),
            TransportError::ConnectFailed(ErrorCode::new(UNREACHABLE))
        );
        assert!(matches!(
            TransportError::connect(ErrorCode::NONE),
            TransportError::Socket(_)
        ));
    }

    #[test]
    fn test_refused_is_also_connect_failed() {
        let code = ErrorCode::new(REFUSED);
        assert!(code.connection_refused());
        assert!(code.connect_failed());
        assert!(!code.was_interrupted());
    }

    #[test]
    fn test_code_accessor() {
        assert_eq!(TransportError::Timeout.code(), None);
        assert_eq!(
            TransportError::Syscall(ErrorCode::new(REFUSED)).code(),
            Some(ErrorCode::new(REFUSED))
        );
        assert!(TransportError::ConnectTimeout.is_timeout());
    }

    #[test]
    fn test_resolution_error_without_code() {
        let err = TransportError::AddressResolution {
            host: "bad\0host".to_string(),
            code: None,
        };
        assert!(err.to_string().contains("no address found"));
    }
}
