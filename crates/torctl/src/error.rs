//! Error taxonomy for the controller core.
//!
//! Ordered by locality, narrowest first: a [`ProtocolError`] is local to one
//! malformed frame, a [`SocketError`] happens only while opening a transport,
//! [`SocketClosed`] is raised to any in-flight caller once the connection is
//! torn down, and [`ControllerError`] is the umbrella callers can match on
//! without caring which of the above fired.

use std::io;

/// A malformed or truncated protocol frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
  #[error("reply line too short: {0:?}")]
  LineTooShort(Vec<u8>),
  #[error("reply line not terminated by CRLF: {0:?}")]
  MissingCrlf(Vec<u8>),
  #[error("unrecognized divider byte {0:?}")]
  UnrecognizedDivider(u8),
  #[error("connection closed mid-message")]
  TruncatedMessage,
  #[error("status code is not three decimal digits: {0:?}")]
  InvalidStatusCode(Vec<u8>),
}

/// A transport could not be established by a factory function.
#[derive(Debug, thiserror::Error)]
#[error("failed to open control connection: {0}")]
pub struct SocketError(#[from] pub io::Error);

/// An operation was attempted on a connection that is no longer running.
#[derive(Debug, thiserror::Error)]
#[error("control connection is closed")]
pub struct SocketClosed;

/// Umbrella error type returned by the public API.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
  #[error(transparent)]
  Protocol(#[from] ProtocolError),
  #[error(transparent)]
  Socket(#[from] SocketError),
  #[error(transparent)]
  Closed(#[from] SocketClosed),
}

pub type Result<T> = std::result::Result<T, ControllerError>;
