//! Event Queue + Event Dispatcher: a FIFO of unsolicited `650` Messages and
//! the worker loop that drains it without ever blocking the socket reader.
//!
//! Shutdown discipline (spec §4.4, a testable property in §8): events
//! enqueued before `close()` is invoked must still reach `handle_event`
//! before `close()` returns. The dispatcher only exits once `running` is
//! false *and* the queue is empty — never before.

use std::collections::VecDeque;

use log::{trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::event_sink::EventHandler;
use crate::message::Message;

struct State {
  queue: VecDeque<Message>,
  running: bool,
}

pub(crate) struct EventQueue {
  state: Mutex<State>,
  condvar: Condvar,
}

impl EventQueue {
  pub(crate) fn new() -> Self {
    Self {
      state: Mutex::new(State {
        queue: VecDeque::new(),
        running: true,
      }),
      condvar: Condvar::new(),
    }
  }

  /// Re-arms the queue for a fresh connect/dispatcher cycle.
  pub(crate) fn restart(&self) {
    let mut state = self.state.lock();
    state.running = true;
  }

  /// Pushed by the Reader Loop whenever it reads a `650` message.
  pub(crate) fn push(&self, message: Message) {
    let mut state = self.state.lock();
    state.queue.push_back(message);
    self.condvar.notify_one();
  }

  /// Signals the dispatcher to wind down: it keeps draining whatever is
  /// already queued, then exits once the queue is empty. Does not discard
  /// anything already enqueued.
  pub(crate) fn stop(&self) {
    let mut state = self.state.lock();
    state.running = false;
    self.condvar.notify_all();
  }

  /// Runs on the dispatcher's dedicated worker thread until `stop` has
  /// been called and the queue has been fully drained.
  pub(crate) fn run_dispatcher(&self, handler: &dyn EventHandler) {
    loop {
      let next = {
        let mut state = self.state.lock();
        loop {
          if let Some(message) = state.queue.pop_front() {
            break Some(message);
          }
          if !state.running {
            break None;
          }
          self.condvar.wait(&mut state);
        }
      };
      match next {
        Some(message) => {
          trace!("dispatching event: {}", message.status_code(-1));
          handler.handle_event(message);
        }
        None => {
          trace!("event dispatcher draining complete, exiting");
          return;
        }
      }
    }
  }
}

impl Drop for EventQueue {
  fn drop(&mut self) {
    let state = self.state.lock();
    if !state.queue.is_empty() {
      warn!(
        "event queue dropped with {} undelivered events",
        state.queue.len()
      );
    }
  }
}
