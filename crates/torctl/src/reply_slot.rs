//! The single-slot rendezvous the Reader Loop uses to hand a solicited
//! [`Message`] to the `send` caller waiting for it.

use log::warn;
use parking_lot::{Condvar, Mutex};

use crate::error::{ControllerError, ProtocolError, SocketClosed};
use crate::message::Message;

enum Slot {
  Empty,
  Ready(Message),
  Protocol(ProtocolError),
  Closed,
}

pub(crate) struct ReplySlot {
  slot: Mutex<Slot>,
  condvar: Condvar,
}

impl ReplySlot {
  pub(crate) fn new() -> Self {
    Self {
      slot: Mutex::new(Slot::Empty),
      condvar: Condvar::new(),
    }
  }

  /// Clears a prior `Closed` state so a freshly (re)connected controller
  /// can accept new waiters. Called at the start of `connect`.
  pub(crate) fn reset(&self) {
    *self.slot.lock() = Slot::Empty;
  }

  /// Called by the Writer Gate immediately before writing a new command,
  /// while still holding the gate's lock. Discards any stale state left
  /// behind by a `ProtocolError` the Reader Loop encountered while no
  /// `send` call was in flight (the control protocol never sends an
  /// unsolicited non-event reply, so this should be rare) — without this,
  /// such a leftover would be mistakenly handed to the next caller as if
  /// it were their reply.
  pub(crate) fn prepare_for_next_command(&self) {
    let mut slot = self.slot.lock();
    if matches!(&*slot, Slot::Protocol(_)) {
      warn!("discarding stale reply-slot state before sending next command");
      *slot = Slot::Empty;
    }
  }

  /// Called by the Reader Loop when it reads a non-event `Message`.
  /// Wakes exactly the caller waiting in `wait`.
  pub(crate) fn deposit(&self, message: Message) {
    let mut slot = self.slot.lock();
    *slot = Slot::Ready(message);
    self.condvar.notify_one();
  }

  /// Called by the Reader Loop when a `ProtocolError` is encountered while
  /// a reply is expected. Chosen policy (documented in DESIGN.md): rather
  /// than let a pending `send` hang forever on a desynced stream, the
  /// error is surfaced to it directly as `ControllerError::Protocol`
  /// instead of `SocketClosed` — the connection itself is not torn down.
  pub(crate) fn deposit_protocol_error(&self, error: ProtocolError) {
    let mut slot = self.slot.lock();
    *slot = Slot::Protocol(error);
    self.condvar.notify_one();
  }

  /// Called on connection teardown. Wakes any waiter with `SocketClosed`.
  pub(crate) fn close(&self) {
    let mut slot = self.slot.lock();
    *slot = Slot::Closed;
    self.condvar.notify_all();
  }

  /// Blocks until the Reader Loop deposits a reply, a protocol error, or
  /// the connection closes. Consumes the deposited slot contents.
  pub(crate) fn wait(&self) -> Result<Message, ControllerError> {
    let mut slot = self.slot.lock();
    loop {
      match &*slot {
        Slot::Ready(_) => {
          let Slot::Ready(message) = std::mem::replace(&mut *slot, Slot::Empty) else {
            unreachable!()
          };
          return Ok(message);
        }
        Slot::Protocol(_) => {
          let Slot::Protocol(error) = std::mem::replace(&mut *slot, Slot::Empty) else {
            unreachable!()
          };
          return Err(ControllerError::Protocol(error));
        }
        Slot::Closed => return Err(ControllerError::Closed(SocketClosed)),
        Slot::Empty => self.condvar.wait(&mut slot),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::message::{Divider, ReplyLine};
  use std::sync::Arc;
  use std::thread;
  use std::time::Duration;

  fn ok_message() -> Message {
    Message::new(
      vec![ReplyLine {
        status_code: "250".into(),
        divider: Divider::End,
        content: "OK".into(),
      }],
      b"250 OK\r\n".to_vec(),
    )
  }

  #[test]
  fn wait_blocks_until_deposit() {
    let slot = Arc::new(ReplySlot::new());
    let waiter = {
      let slot = slot.clone();
      thread::spawn(move || slot.wait())
    };
    thread::sleep(Duration::from_millis(20));
    slot.deposit(ok_message());
    let msg = waiter.join().unwrap().unwrap();
    assert_eq!(msg.to_string(), "OK");
  }

  #[test]
  fn close_wakes_waiter_with_error() {
    let slot = Arc::new(ReplySlot::new());
    let waiter = {
      let slot = slot.clone();
      thread::spawn(move || slot.wait())
    };
    thread::sleep(Duration::from_millis(20));
    slot.close();
    assert!(matches!(
      waiter.join().unwrap().unwrap_err(),
      ControllerError::Closed(_)
    ));
  }

  #[test]
  fn protocol_error_wakes_waiter_without_closing() {
    let slot = Arc::new(ReplySlot::new());
    let waiter = {
      let slot = slot.clone();
      thread::spawn(move || slot.wait())
    };
    thread::sleep(Duration::from_millis(20));
    slot.deposit_protocol_error(ProtocolError::TruncatedMessage);
    assert!(matches!(
      waiter.join().unwrap().unwrap_err(),
      ControllerError::Protocol(_)
    ));
  }
}
