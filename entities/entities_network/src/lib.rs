//! Entities Layer: Network Data Model
//!
//! This crate provides the platform-independent data model shared by the socket transport
//! layer: family-tagged socket addresses, the protocol support policy that governs which
//! address families are considered, and the timeout representation used by every blocking
//! operation.
//!
//! ## Overview
//!
//! The `entities_network` crate is part of the entities layer. As the innermost layer it has
//! no dependencies on operating-system facilities or on other crates in the workspace; the
//! adapters layer converts these types to and from the native socket API.
//!
//! ## Modules
//!
//! - **[`address`](address/index.html)**: `SocketAddress`, a tagged IPv4/IPv6 address plus
//!   port with a total order (family, then port, then address bytes), numeric `host:port`
//!   rendering, and `ResolvedAddressSet`, the deduplicated result of a name lookup.
//!
//! - **[`protocol`](protocol/index.html)**: `ProtocolSupport`, selecting IPv4, IPv6 or both.
//!
//! - **[`timeout`](timeout/index.html)**: `Timeout`, the shared "return immediately / bounded
//!   wait / block indefinitely" policy.
//!
//! ## Usage
//!
//! ```rust
//! use entities_network::{SocketAddress, ResolvedAddressSet, Timeout};
//! use std::net::Ipv4Addr;
//!
//! let addr = SocketAddress::new(Ipv4Addr::LOCALHOST.into(), 4061);
//! assert_eq!(addr.to_string(), "127.0.0.1:4061");
//!
//! let mut set = ResolvedAddressSet::new();
//! assert!(set.insert(addr));
//! assert!(!set.insert(addr));
//!
//! assert_eq!(Timeout::from_millis(-1), Timeout::Infinite);
//! ```

pub mod address;
pub mod protocol;
pub mod timeout;

pub use address::{AddressFamily, ResolvedAddressSet, SocketAddress};
pub use protocol::ProtocolSupport;
pub use timeout::Timeout;
