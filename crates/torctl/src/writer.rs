//! Writer Gate: serializes outbound commands so at most one command per
//! controller is in flight at a time.
//!
//! The control protocol carries no request identifiers; serializing writers
//! and waiting for the matching reply before releasing the gate is the only
//! way to pair a command with its reply. That pairing is the central
//! invariant of this module (spec §4.3).

use std::io::Write;

use parking_lot::Mutex;

use crate::error::{ControllerError, SocketError};
use crate::message::Message;
use crate::reply_slot::ReplySlot;
use crate::transport::Transport;

pub(crate) struct WriterGate {
  writer: Mutex<Box<dyn Transport>>,
}

impl WriterGate {
  pub(crate) fn new(transport: Box<dyn Transport>) -> Self {
    Self {
      writer: Mutex::new(transport),
    }
  }

  /// Normalizes, writes, and waits for the matching reply — one atomic
  /// operation from the caller's perspective. Holding `writer`'s lock
  /// across the entire wait is what linearizes concurrent `send` callers:
  /// the *i*-th reply the reader deposits pairs with the *i*-th command
  /// written here.
  pub(crate) fn send(
    &self,
    command: &str,
    reply_slot: &ReplySlot,
  ) -> Result<Message, ControllerError> {
    let normalized = normalize_command(command);
    let mut writer = self.writer.lock();
    reply_slot.prepare_for_next_command();
    writer
      .write_all(normalized.as_bytes())
      .map_err(SocketError)?;
    writer.flush().map_err(SocketError)?;
    let message = reply_slot.wait()?;
    Ok(message)
  }
}

/// Trims a trailing `\r`/`\n` (in either order, however many) and appends
/// exactly one `\r\n`.
fn normalize_command(command: &str) -> String {
  let trimmed = command.trim_end_matches(['\r', '\n']);
  format!("{trimmed}\r\n")
}
