//! Reader Loop: the sole consumer of the socket. Continuously parses
//! Messages and routes them to the Event Queue or the Reply Slot, so that a
//! slow event handler can never stall the socket (spec §4.2).

use std::io::BufReader;
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::controller::Inner;
use crate::parser::{self, BufReadLineSource, ParseError};
use crate::transport::Transport;

/// Runs until a transport-level error (or clean peer disconnect) occurs, or
/// until the owning controller is closed and shuts the socket down from
/// under it — both unblock the in-progress `read_line` with an I/O error.
pub(crate) fn run(inner: Arc<Inner>, transport: Box<dyn Transport>) {
  let mut source = BufReadLineSource::new(BufReader::new(transport));

  loop {
    match parser::read_message(&mut source) {
      Ok(Some(message)) => {
        if message.is_event() {
          trace!("reader: routing event to dispatcher");
          inner.event_queue.push(message);
        } else {
          trace!("reader: routing reply to waiting sender");
          inner.reply_slot.deposit(message);
        }
      }
      Ok(None) => {
        debug!("reader: connection closed by peer");
        inner.notify_closed_from_reader();
        return;
      }
      Err(ParseError::Protocol(error)) => {
        warn!("reader: discarding malformed message: {error}");
        inner.reply_slot.deposit_protocol_error(error);
      }
      Err(ParseError::Io(error)) => {
        debug!("reader: transport error, tearing down connection: {error}");
        inner.notify_closed_from_reader();
        return;
      }
    }
  }
}
