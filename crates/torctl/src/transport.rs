//! Socket Handle: owns the transport, exposes line-oriented read and raw
//! write, and reports closed state.
//!
//! The core treats TCP and Unix-domain sockets identically — both are just
//! a [`Transport`]. Opening the transport (the factory concern named out of
//! scope in the top-level spec) lives here only as the two thin
//! constructors the public API promises (`from_port`, `from_socket_file`);
//! everything past "here is an open duplex byte stream" is transport-agnostic.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::Path;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::error::SocketError;

/// An open, duplex, byte-oriented connection to a control port.
///
/// Implemented identically for TCP and Unix-domain sockets; the controller
/// never branches on which one it has.
pub trait Transport: Read + Write + Send {
  /// Produces an independent handle to the same underlying connection,
  /// the way [`TcpStream::try_clone`] / [`UnixStream::try_clone`] do —
  /// reads and writes through either handle observe the same stream.
  fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>>;

  /// Shuts down one or both directions of the connection. Used by `close`
  /// to unblock a reader thread that is parked in a blocking read.
  fn shutdown(&self, how: Shutdown) -> io::Result<()>;
}

impl Transport for TcpStream {
  fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>> {
    Ok(Box::new(self.try_clone()?))
  }

  fn shutdown(&self, how: Shutdown) -> io::Result<()> {
    TcpStream::shutdown(self, how)
  }
}

#[cfg(unix)]
impl Transport for UnixStream {
  fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>> {
    Ok(Box::new(self.try_clone()?))
  }

  fn shutdown(&self, how: Shutdown) -> io::Result<()> {
    UnixStream::shutdown(self, how)
  }
}

/// Owns one [`Transport`] and hands out independent reader/writer handles
/// cloned from it, plus the single handle `close` uses to shut the
/// connection down in both directions.
pub struct SocketHandle {
  transport: Box<dyn Transport>,
}

impl SocketHandle {
  /// Wraps an already-open transport (the constructor named in the public
  /// API surface).
  #[must_use]
  pub fn new(transport: Box<dyn Transport>) -> Self {
    Self { transport }
  }

  /// Opens a TCP connection to a control port.
  pub fn from_port(host: &str, port: u16) -> Result<Self, SocketError> {
    let addr = (host, port)
      .to_socket_addrs()
      .map_err(SocketError)?
      .next()
      .ok_or_else(|| {
        SocketError(io::Error::new(
          io::ErrorKind::InvalidInput,
          format!("no addresses resolved for {host}:{port}"),
        ))
      })?;
    let stream = TcpStream::connect(addr).map_err(SocketError)?;
    Ok(Self::new(Box::new(stream)))
  }

  /// Opens a Unix-domain socket connection to a control port.
  #[cfg(unix)]
  pub fn from_socket_file(path: impl AsRef<Path>) -> Result<Self, SocketError> {
    let stream = UnixStream::connect(path.as_ref()).map_err(SocketError)?;
    Ok(Self::new(Box::new(stream)))
  }

  /// An independent handle for the reader loop.
  pub(crate) fn clone_for_reader(&self) -> io::Result<Box<dyn Transport>> {
    self.transport.try_clone_transport()
  }

  /// An independent handle for the writer gate.
  pub(crate) fn clone_for_writer(&self) -> io::Result<Box<dyn Transport>> {
    self.transport.try_clone_transport()
  }

  /// Shuts down both directions, unblocking any thread parked in a
  /// blocking read or write on a cloned handle. Ignores "not connected"
  /// errors, matching `close`'s idempotence contract.
  pub(crate) fn shutdown(&self) {
    if let Err(err) = self.transport.shutdown(Shutdown::Both) {
      if err.kind() != io::ErrorKind::NotConnected {
        log::debug!("socket shutdown returned non-fatal error: {err}");
      }
    }
  }
}
