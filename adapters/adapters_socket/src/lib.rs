//! Adapters Layer: Portable Socket Transport
//!
//! Provides the platform networking layer a message-oriented transport is built on:
//! name resolution, connection establishment with timeouts, socket options, interface
//! enumeration and a wakeup pipe, with the same behavior on every supported platform.
//!
//! ## Overview
//!
//! The `adapters_socket` crate provides:
//! - **Error classification**: [`ErrorCode`] predicates and the [`TransportError`] taxonomy
//! - **Resolution**: [`AddressResolver`] for bind, connect and publish lookups
//! - **Sockets**: [`SocketHandle`] creation, options, addresses and shutdown
//! - **Connection establishment**: [`ConnectionEstablisher`] bind, listen, connect,
//!   finish-connect and accept
//! - **Interfaces**: [`LocalInterfaces`] enumeration and wildcard expansion
//! - **Wakeups**: [`NotificationPipe`]
//! - **Configuration**: [`TransportConfig`] read through a [`PropertySource`]
//!
//! ## Architecture
//!
//! This crate is part of the adapters layer. It depends on:
//! - `entities_network`: address, protocol and timeout types
//! - `socket2`: portable socket calls
//! - `libc` / `nix` (Unix) and `windows-sys` (Windows): everything `socket2` does not cover
//!
//! All platform differences are confined to a private platform module; the public API is
//! identical everywhere.
//!
//! ## Example
//!
//! ```no_run
//! use adapters_socket::{AddressResolver, ConnectionEstablisher, SocketHandle, SocketType};
//! use entities_network::{ProtocolSupport, Timeout};
//!
//! let addr = AddressResolver::resolve("localhost", 4061, ProtocolSupport::Ipv4Only)?;
//! let handle = SocketHandle::create(SocketType::Stream, addr.family())?.set_blocking(false)?;
//! let connected = ConnectionEstablisher::connect(handle, &addr, Timeout::from_millis(500))?;
//! println!("{}", connected.into_handle());
//! # Ok::<(), adapters_socket::TransportError>(())
//! ```
//!
//! ## See Also
//!
//! - [`entities_network`](../entities_network/index.html): address and timeout types

pub mod config;
pub mod error;
pub mod establish;
pub mod interfaces;
pub mod logger;
pub mod pipe;
pub mod resolver;
pub mod socket;

mod retry;
mod sys;

pub use config::{PropertySource, TransportConfig, TCP_RCV_SIZE_KEY, TCP_SND_SIZE_KEY};
pub use error::{last_error_to_string, DnsErrorCode, ErrorCode, Result, TransportError};
pub use establish::{ConnectOutcome, ConnectionEstablisher};
pub use interfaces::LocalInterfaces;
pub use logger::{LogWarningSink, WarningSink};
pub use pipe::{NotificationPipe, PipeEnd};
pub use resolver::AddressResolver;
pub use socket::{BufferKind, SocketHandle, SocketType};
pub use sys::Readiness;
