//! Capability object that replaces the original "subclass and override
//! `handle_event`" pattern with explicit callback registration, the way a
//! Rust library exposes an event sink (spec §9 Design Notes).

use crate::message::Message;

/// Receives `650` event [`Message`]s, invoked synchronously on the
/// dispatcher thread. Must never call `Controller::send` / `Controller::msg`
/// on the same controller from within `handle_event` (spec §4.3):
/// the call ties up the dispatcher thread until the matching reply
/// arrives, stalling every event still queued behind this one, and a
/// concurrent `close()` cannot finish until that `send` itself returns
/// (it blocks on joining this very thread). Make the call from another
/// thread instead.
pub trait EventHandler: Send + Sync {
  fn handle_event(&self, message: Message);
}

/// Adapts a plain closure into an [`EventHandler`].
pub struct FnEventHandler<F>(F);

impl<F> FnEventHandler<F>
where
  F: Fn(Message) + Send + Sync,
{
  pub fn new(f: F) -> Self {
    Self(f)
  }
}

impl<F> EventHandler for FnEventHandler<F>
where
  F: Fn(Message) + Send + Sync,
{
  fn handle_event(&self, message: Message) {
    (self.0)(message)
  }
}

/// An event sink that discards every event. Used as the default handler
/// for callers who only care about solicited replies.
pub struct NullEventHandler;

impl EventHandler for NullEventHandler {
  fn handle_event(&self, _message: Message) {}
}
