//! Notification Pipe Module
//!
//! A pair of connected, blocking byte channels used to wake a thread that is waiting for
//! socket readiness: one thread writes a byte to the write end, the waiting thread sees the
//! read end become readable.
//!
//! On Unix the pair is a native `pipe(2)`. Where anonymous pipes cannot take part in socket
//! readiness waits the pair is emulated with a loopback TCP connection; that emulation is
//! also available everywhere through [`NotificationPipe::loopback`].

use std::fs::File;
use std::io::{self, Read, Write};
#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};

use entities_network::{AddressFamily, SocketAddress, Timeout};

use crate::error::Result;
use crate::establish::ConnectionEstablisher;
use crate::socket::{SocketHandle, SocketType};
use crate::sys::{Platform, Sys};

/// One end of a notification pipe
#[derive(Debug)]
pub enum PipeEnd {
    /// Native pipe descriptor
    Native(File),
    /// Loopback TCP socket
    Loopback(SocketHandle),
}

impl Read for PipeEnd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            PipeEnd::Native(file) => file.read(buf),
            PipeEnd::Loopback(socket) => socket.read(buf),
        }
    }
}

impl Write for PipeEnd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            PipeEnd::Native(file) => file.write(buf),
            PipeEnd::Loopback(socket) => socket.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            PipeEnd::Native(file) => file.flush(),
            PipeEnd::Loopback(socket) => socket.flush(),
        }
    }
}

#[cfg(unix)]
impl AsRawFd for PipeEnd {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            PipeEnd::Native(file) => file.as_raw_fd(),
            PipeEnd::Loopback(socket) => socket.as_raw_fd(),
        }
    }
}

/// Connected read/write pair for waking a waiting thread
#[derive(Debug)]
pub struct NotificationPipe {
    read_end: PipeEnd,
    write_end: PipeEnd,
}

impl NotificationPipe {
    /// Create a pipe using the platform's preferred mechanism
    ///
    /// # Returns
    ///
    /// * `Ok(NotificationPipe)` - Both ends in blocking mode
    /// * `Err(TransportError::Syscall)` - The native pipe could not be created
    /// * `Err(TransportError::Socket)` - Configuring the ends, or the loopback
    ///   emulation, failed
    pub fn create() -> Result<Self> {
        Sys::pipe()
    }

    /// Create a pipe from a loopback TCP connection
    ///
    /// The connecting socket becomes the read end and the accepted socket the write end.
    /// The temporary listener is closed before returning, and every socket created so far
    /// is closed if a step fails.
    pub fn loopback() -> Result<Self> {
        let listener = SocketHandle::create(SocketType::Stream, AddressFamily::Ipv4)?;
        let (listener, bound) =
            ConnectionEstablisher::bind(listener, &SocketAddress::loopback(AddressFamily::Ipv4, 0))?;
        let listener = ConnectionEstablisher::listen(listener, 1)?;

        let connecting = SocketHandle::create(SocketType::Stream, AddressFamily::Ipv4)?;
        let connecting = ConnectionEstablisher::connect(connecting, &bound, Timeout::Infinite)?
            .into_handle()
            .set_blocking(true)?;
        let accepted = ConnectionEstablisher::accept(&listener, Timeout::Infinite)?.set_blocking(true)?;
        drop(listener);

        log::trace!("loopback notification pipe on {}", bound);
        Ok(Self::from_ends(
            PipeEnd::Loopback(connecting),
            PipeEnd::Loopback(accepted),
        ))
    }

    pub(crate) fn from_ends(read_end: PipeEnd, write_end: PipeEnd) -> Self {
        Self { read_end, write_end }
    }

    pub fn read_end(&mut self) -> &mut PipeEnd {
        &mut self.read_end
    }

    pub fn write_end(&mut self) -> &mut PipeEnd {
        &mut self.write_end
    }

    /// Split into `(read_end, write_end)`
    pub fn into_ends(self) -> (PipeEnd, PipeEnd) {
        (self.read_end, self.write_end)
    }
}
