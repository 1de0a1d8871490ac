//! Status Listener Registry: fans out `INIT`/`CLOSED`/`RESET` transitions
//! to subscribers, optionally asynchronously.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::controller::Controller;

/// A transition a status listener is notified of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
  Init,
  Reset,
  Closed,
}

/// Opaque handle returned by `add_status_listener`, used to remove a
/// listener later.
///
/// The original protocol removes listeners "by identity"; Rust closures
/// have no stable identity to compare by, so this crate hands back a
/// token at registration time instead (documented as an Open Question
/// resolution in DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ListenerFn = dyn Fn(Controller, StatusEvent, SystemTime) + Send + Sync;

struct Entry {
  id: ListenerId,
  callback: Arc<ListenerFn>,
  spawn_async: bool,
}

/// Ordered set of `(listener, spawn_async)` pairs, protected by its own
/// mutex separate from connection state — notifications take a snapshot
/// under the lock and invoke callbacks with the lock released, so a
/// listener that calls back into `add_status_listener` / `remove_status_listener`
/// cannot deadlock against the registry.
pub(crate) struct StatusListenerRegistry {
  next_id: AtomicU64,
  listeners: Mutex<Vec<Entry>>,
}

impl StatusListenerRegistry {
  pub(crate) fn new() -> Self {
    Self {
      next_id: AtomicU64::new(1),
      listeners: Mutex::new(Vec::new()),
    }
  }

  pub(crate) fn add(
    &self,
    callback: impl Fn(Controller, StatusEvent, SystemTime) + Send + Sync + 'static,
    spawn_async: bool,
  ) -> ListenerId {
    let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
    self.listeners.lock().push(Entry {
      id,
      callback: Arc::new(callback),
      spawn_async,
    });
    id
  }

  pub(crate) fn remove(&self, id: ListenerId) {
    self.listeners.lock().retain(|e| e.id != id);
  }

  /// Notifies every registered listener of `event`, in registration order.
  /// Synchronous listeners run on the calling (transitioning) thread before
  /// this call returns; `spawn_async` listeners run on a fresh worker and
  /// may still be running when this call returns.
  pub(crate) fn notify(&self, controller: &Controller, event: StatusEvent) {
    let timestamp = SystemTime::now();
    let snapshot: Vec<(Arc<ListenerFn>, bool)> = self
      .listeners
      .lock()
      .iter()
      .map(|e| (e.callback.clone(), e.spawn_async))
      .collect();

    for (callback, spawn_async) in snapshot {
      if spawn_async {
        let controller = controller.clone();
        std::thread::spawn(move || {
          callback(controller, event, timestamp);
        });
      } else {
        callback(controller.clone(), event, timestamp);
      }
    }
  }
}
