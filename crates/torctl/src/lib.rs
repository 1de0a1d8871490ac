//! A concurrent client library for Tor's control port protocol.
//!
//! The hard engineering here is the controller core: a bidirectional
//! protocol engine that demultiplexes a single bytestream into solicited
//! replies and unsolicited `650` events, pairs commands with replies under
//! concurrent callers, and delivers events without ever blocking the
//! socket reader on a slow event handler.
//!
//! ```no_run
//! use torctl::Controller;
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let controller = Controller::from_port("127.0.0.1", 9051)?;
//! controller.add_status_listener(
//!   |_controller, event, _timestamp| println!("status: {event:?}"),
//!   false,
//! );
//! controller.connect()?;
//! let reply = controller.send("GETINFO version")?;
//! println!("{reply}");
//! controller.close()?;
//! # Ok(())
//! # }
//! ```

mod controller;
mod error;
mod event_queue;
mod event_sink;
mod message;
mod parser;
mod reader;
mod reply_slot;
mod status;
mod transport;
mod writer;

pub use controller::Controller;
pub use error::{ControllerError, ProtocolError, Result, SocketClosed, SocketError};
pub use event_sink::{EventHandler, FnEventHandler, NullEventHandler};
pub use message::{Divider, Message, ReplyLine, EVENT_STATUS};
pub use parser::{read_message, BufReadLineSource, LineSource, ParseError};
pub use status::{ListenerId, StatusEvent};
pub use transport::{SocketHandle, Transport};
