//! Configuration Module
//!
//! Transport tuning read from a key/value property source.
//!
//! The transport does not own a configuration system; it reads the few integers it needs
//! through [`PropertySource`], which the embedding application implements over whatever
//! store it has. A plain `HashMap<String, String>` works out of the box.
//!
//! ## Keys
//!
//! | Key                      | Meaning                                   |
//! |--------------------------|-------------------------------------------|
//! | `Transport.TCP.RcvSize`  | TCP receive buffer size in bytes          |
//! | `Transport.TCP.SndSize`  | TCP send buffer size in bytes             |
//!
//! A size of `0` or less leaves the operating system's default in place.

use std::collections::HashMap;

use crate::sys::{Platform, Sys};

/// Property key for the TCP receive buffer size
pub const TCP_RCV_SIZE_KEY: &str = "Transport.TCP.RcvSize";
/// Property key for the TCP send buffer size
pub const TCP_SND_SIZE_KEY: &str = "Transport.TCP.SndSize";

/// Source of integer configuration properties
#[cfg_attr(test, mockall::automock)]
pub trait PropertySource {
    /// Value of `key` as an integer, or `default` when unset or not an integer
    fn property_as_int_with_default(&self, key: &str, default: i32) -> i32;
}

impl PropertySource for HashMap<String, String> {
    fn property_as_int_with_default(&self, key: &str, default: i32) -> i32 {
        match self.get(key) {
            None => default,
            Some(value) => value.trim().parse().unwrap_or_else(|_| {
                log::debug!("property `{}` is not an integer: `{}`", key, value);
                default
            }),
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Requested TCP receive buffer size (0 = platform default)
    pub tcp_recv_buffer_size: i32,
    /// Requested TCP send buffer size (0 = platform default)
    pub tcp_send_buffer_size: i32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tcp_recv_buffer_size: Sys::DEFAULT_TCP_BUFFER_SIZE,
            tcp_send_buffer_size: Sys::DEFAULT_TCP_BUFFER_SIZE,
        }
    }
}

impl TransportConfig {
    /// Read the configuration, falling back to the platform defaults for unset keys
    pub fn from_properties(properties: &dyn PropertySource) -> Self {
        let defaults = Self::default();
        Self {
            tcp_recv_buffer_size: properties
                .property_as_int_with_default(TCP_RCV_SIZE_KEY, defaults.tcp_recv_buffer_size),
            tcp_send_buffer_size: properties
                .property_as_int_with_default(TCP_SND_SIZE_KEY, defaults.tcp_send_buffer_size),
        }
    }
}
