//! Controller: composes the Frame Parser, Socket Handle, Reader Loop,
//! Writer Gate, Event Dispatcher, and Status Listener Registry into the
//! public API surface (spec §4.5, §6).

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::error::{ControllerError, SocketClosed, SocketError};
use crate::event_queue::EventQueue;
use crate::event_sink::{EventHandler, NullEventHandler};
use crate::message::Message;
use crate::reader;
use crate::reply_slot::ReplySlot;
use crate::status::{ListenerId, StatusEvent, StatusListenerRegistry};
use crate::transport::{SocketHandle, Transport};
use crate::writer::WriterGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
  PreInit,
  Init,
  Closed,
}

/// A factory that can (re)open a fresh transport, used so `connect()` after
/// `close()` can re-adopt a usable socket (spec §4.5: "open or re-adopt the
/// socket"). Constructed only by `from_port` / `from_socket_file`; a
/// controller built from an already-open transport via `new` has none, so
/// reconnecting after `close()` surfaces `SocketClosed` instead of silently
/// trying to reuse a torn-down socket.
type ReopenFn = dyn Fn() -> Result<SocketHandle, SocketError> + Send + Sync;

#[derive(Default)]
struct Workers {
  reader: Option<JoinHandle<()>>,
  dispatcher: Option<JoinHandle<()>>,
}

pub(crate) struct Inner {
  state: Mutex<ConnectionState>,
  ever_connected: AtomicBool,
  socket: Mutex<Option<SocketHandle>>,
  reopen: Option<Box<ReopenFn>>,
  pub(crate) reply_slot: ReplySlot,
  pub(crate) event_queue: EventQueue,
  writer: Mutex<Option<Arc<WriterGate>>>,
  status_registry: StatusListenerRegistry,
  pub(crate) handler: Arc<dyn EventHandler>,
  workers: Mutex<Workers>,
}

/// One control connection.
///
/// Cheaply `Clone`: every clone is a handle to the same underlying
/// connection, workers, and listener registry (an `Arc` under the hood) —
/// this is what lets a `spawn_async` status listener receive an owned
/// controller handle on its own worker thread instead of a borrow tied to
/// the transitioning thread's stack.
#[derive(Clone)]
pub struct Controller {
  inner: Arc<Inner>,
}

impl Controller {
  /// Wraps an already-open transport. A controller built this way has no
  /// way to re-adopt a socket after `close()`; a subsequent `connect()`
  /// returns `SocketClosed`.
  #[must_use]
  pub fn new(transport: Box<dyn Transport>) -> Self {
    Self::from_socket(SocketHandle::new(transport), None)
  }

  /// Opens a TCP connection to a control port at `host:port`.
  pub fn from_port(host: impl Into<String>, port: u16) -> Result<Self, SocketError> {
    let host = host.into();
    let socket = SocketHandle::from_port(&host, port)?;
    let reopen: Box<ReopenFn> = Box::new(move || SocketHandle::from_port(&host, port));
    Ok(Self::from_socket(socket, Some(reopen)))
  }

  /// Opens a Unix-domain socket connection to a control port.
  #[cfg(unix)]
  pub fn from_socket_file(path: impl AsRef<Path>) -> Result<Self, SocketError> {
    let path = path.as_ref().to_path_buf();
    let socket = SocketHandle::from_socket_file(&path)?;
    let reopen: Box<ReopenFn> = Box::new(move || SocketHandle::from_socket_file(&path));
    Ok(Self::from_socket(socket, Some(reopen)))
  }

  fn from_socket(socket: SocketHandle, reopen: Option<Box<ReopenFn>>) -> Self {
    Self::with_handler(socket, reopen, Arc::new(NullEventHandler))
  }

  /// As the other constructors, but with an explicit event sink instead of
  /// the default no-op handler. Prefer `add_status_listener` plus this for
  /// event delivery; subclassing is not idiomatic here (spec §9).
  pub fn with_event_handler(
    transport: Box<dyn Transport>,
    handler: Arc<dyn EventHandler>,
  ) -> Self {
    Self::with_handler(SocketHandle::new(transport), None, handler)
  }

  fn with_handler(
    socket: SocketHandle,
    reopen: Option<Box<ReopenFn>>,
    handler: Arc<dyn EventHandler>,
  ) -> Self {
    let inner = Inner {
      state: Mutex::new(ConnectionState::PreInit),
      ever_connected: AtomicBool::new(false),
      socket: Mutex::new(Some(socket)),
      reopen,
      reply_slot: ReplySlot::new(),
      event_queue: EventQueue::new(),
      writer: Mutex::new(None),
      status_registry: StatusListenerRegistry::new(),
      handler,
      workers: Mutex::new(Workers::default()),
    };
    Self {
      inner: Arc::new(inner),
    }
  }

  /// Starts the reader and dispatcher workers. A no-op if already running.
  /// Emits `INIT` the first time a given controller connects, `RESET` on
  /// every subsequent connect (spec §4.5).
  pub fn connect(&self) -> Result<(), ControllerError> {
    {
      let state = self.inner.state.lock();
      if *state == ConnectionState::Init {
        return Ok(());
      }
    }

    let mut socket_guard = self.inner.socket.lock();
    if socket_guard.is_none() {
      let factory = self
        .inner
        .reopen
        .as_ref()
        .ok_or(ControllerError::Closed(SocketClosed))?;
      *socket_guard = Some(factory()?);
    }
    let socket = socket_guard.as_ref().expect("just ensured Some above");
    let reader_transport = socket.clone_for_reader().map_err(SocketError)?;
    let writer_transport = socket.clone_for_writer().map_err(SocketError)?;
    drop(socket_guard);

    *self.inner.writer.lock() = Some(Arc::new(WriterGate::new(writer_transport)));
    self.inner.reply_slot.reset();
    self.inner.event_queue.restart();

    let reader_inner = self.inner.clone();
    let reader_handle = std::thread::Builder::new()
      .name("torctl-reader".to_string())
      .spawn(move || reader::run(reader_inner, reader_transport))
      .expect("failed to spawn reader thread");

    let dispatcher_inner = self.inner.clone();
    let dispatcher_handle = std::thread::Builder::new()
      .name("torctl-dispatcher".to_string())
      .spawn(move || {
        dispatcher_inner
          .event_queue
          .run_dispatcher(dispatcher_inner.handler.as_ref());
      })
      .expect("failed to spawn dispatcher thread");

    {
      let mut workers = self.inner.workers.lock();
      workers.reader = Some(reader_handle);
      workers.dispatcher = Some(dispatcher_handle);
    }

    *self.inner.state.lock() = ConnectionState::Init;
    let event = if self.inner.ever_connected.swap(true, Ordering::SeqCst) {
      StatusEvent::Reset
    } else {
      StatusEvent::Init
    };
    self.inner.status_registry.notify(self, event);
    Ok(())
  }

  /// Idempotent. Shuts the socket down in both directions, joins the
  /// reader and dispatcher workers (the dispatcher finishes delivering
  /// whatever was already queued first), and emits `CLOSED`.
  pub fn close(&self) -> Result<(), ControllerError> {
    let transitioned = self.transition_to_closed();

    let (reader_handle, dispatcher_handle) = {
      let mut workers = self.inner.workers.lock();
      (workers.reader.take(), workers.dispatcher.take())
    };
    if let Some(handle) = reader_handle {
      let _ = handle.join();
    }
    if let Some(handle) = dispatcher_handle {
      let _ = handle.join();
    }

    if transitioned {
      self.inner.status_registry.notify(self, StatusEvent::Closed);
    }
    Ok(())
  }

  /// Drives the `CLOSED` transition. Returns `true` if this call performed
  /// it (as opposed to observing it was already closed). Does not join
  /// workers — called both from `close()` (which does join) and from the
  /// reader thread on a fatal transport error, where joining the reader's
  /// own handle from inside itself would deadlock.
  pub(crate) fn transition_to_closed(&self) -> bool {
    let was_already_closed = {
      let mut state = self.inner.state.lock();
      let was_closed = *state == ConnectionState::Closed;
      *state = ConnectionState::Closed;
      was_closed
    };
    if !was_already_closed {
      if let Some(socket) = self.inner.socket.lock().take() {
        socket.shutdown();
      }
      *self.inner.writer.lock() = None;
      self.inner.reply_slot.close();
      self.inner.event_queue.stop();
    }
    !was_already_closed
  }

  /// True between a successful `connect()` and the matching `close()`.
  #[must_use]
  pub fn is_running(&self) -> bool {
    *self.inner.state.lock() == ConnectionState::Init
  }

  /// Sends `command` and blocks for the matching reply. Must never be
  /// called from inside an `EventHandler::handle_event` running on this
  /// same controller's dispatcher thread — see `event_sink`.
  pub fn msg(&self, command: impl AsRef<str>) -> Result<Message, ControllerError> {
    self.send(command)
  }

  /// Alias for `msg`, matching the public API name in spec §6.
  pub fn send(&self, command: impl AsRef<str>) -> Result<Message, ControllerError> {
    // Clone the gate out from under `inner.writer`'s lock and drop the guard
    // before blocking on the reply: `transition_to_closed` needs that same
    // lock (to clear it to `None`) on its way to `reply_slot.close()`, the
    // call that would wake this send if the connection goes down mid-flight.
    // Holding the guard across the blocking wait would deadlock both sides.
    let writer = self
      .inner
      .writer
      .lock()
      .clone()
      .ok_or(ControllerError::Closed(SocketClosed))?;
    writer.send(command.as_ref(), &self.inner.reply_slot)
  }

  /// Registers `callback` to be invoked on every future `INIT`/`RESET`/
  /// `CLOSED` transition. Transitions before registration are not
  /// replayed. If `spawn_async` is true, each invocation runs on its own
  /// short-lived worker thread and is not ordered relative to other
  /// `spawn_async` invocations; synchronous listeners preserve transition
  /// order.
  pub fn add_status_listener(
    &self,
    callback: impl Fn(Controller, StatusEvent, std::time::SystemTime) + Send + Sync + 'static,
    spawn_async: bool,
  ) -> ListenerId {
    self.inner.status_registry.add(callback, spawn_async)
  }

  /// Removes a previously registered status listener by its handle.
  pub fn remove_status_listener(&self, id: ListenerId) {
    self.inner.status_registry.remove(id);
  }
}

impl Inner {
  /// Used only by the reader thread to report a fatal transport error.
  pub(crate) fn notify_closed_from_reader(self: Arc<Self>) {
    let controller = Controller { inner: self };
    if controller.transition_to_closed() {
      controller
        .inner
        .status_registry
        .notify(&controller, StatusEvent::Closed);
    }
  }
}
