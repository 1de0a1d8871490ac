//! Black-box tests against a loopback `TcpListener` standing in for a Tor
//! control port. Exercises the scenarios spec.md §8 calls out that need a
//! real socket rather than a fake `LineSource`.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use torctl::{Controller, ControllerError, EventHandler, FnEventHandler, Message, StatusEvent};

fn listener() -> (TcpListener, u16) {
  let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
  let port = listener.local_addr().unwrap().port();
  (listener, port)
}

#[cfg(unix)]
fn read_command_unix(reader: &mut BufReader<std::os::unix::net::UnixStream>) -> String {
  let mut line = String::new();
  reader.read_line(&mut line).expect("read command line");
  line.trim_end_matches(['\r', '\n']).to_string()
}

#[cfg(unix)]
#[test]
fn from_socket_file_connects_over_a_unix_domain_socket() {
  use std::os::unix::net::UnixListener;

  let dir = tempfile::tempdir().expect("create temp socket dir");
  let path = dir.path().join("control.sock");

  let listener = UnixListener::bind(&path).expect("bind unix listener");
  let server = thread::spawn(move || {
    let (stream, _) = listener.accept().unwrap();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    let command = read_command_unix(&mut reader);
    let reply = format!("250 OK {command}\r\n");
    writer.write_all(reply.as_bytes()).unwrap();
    writer.flush().unwrap();
  });

  let controller = Controller::from_socket_file(&path).unwrap();
  controller.connect().unwrap();

  let reply = controller.send("GETINFO version").unwrap();
  assert_eq!(reply.to_string(), "OK GETINFO version");

  controller.close().unwrap();
  server.join().unwrap();
}

fn read_command(reader: &mut BufReader<TcpStream>) -> String {
  let mut line = String::new();
  reader.read_line(&mut line).expect("read command line");
  line.trim_end_matches(['\r', '\n']).to_string()
}

#[test]
fn reply_pairs_with_command_under_concurrent_senders() {
  let (listener, port) = listener();

  let server = thread::spawn(move || {
    let (stream, _) = listener.accept().unwrap();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    for _ in 0..8 {
      let command = read_command(&mut reader);
      let reply = format!("250 OK {command}\r\n");
      writer.write_all(reply.as_bytes()).unwrap();
      writer.flush().unwrap();
    }
  });

  let controller = Controller::from_port("127.0.0.1", port).unwrap();
  controller.connect().unwrap();

  let handles: Vec<_> = (0..8)
    .map(|i| {
      let controller = controller.clone();
      thread::spawn(move || {
        let command = format!("CMD{i}");
        let reply = controller.send(&command).unwrap();
        (command, reply.to_string())
      })
    })
    .collect();

  for handle in handles {
    let (command, reply) = handle.join().unwrap();
    assert_eq!(reply, format!("OK {command}"));
  }

  controller.close().unwrap();
  server.join().unwrap();
}

#[test]
fn event_arriving_mid_send_does_not_disturb_the_pending_reply() {
  let (listener, port) = listener();

  let server = thread::spawn(move || {
    let (stream, _) = listener.accept().unwrap();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    let _command = read_command(&mut reader);
    writer.write_all(b"650 BW 1 2\r\n").unwrap();
    writer.flush().unwrap();
    thread::sleep(Duration::from_millis(20));
    writer.write_all(b"250 OK\r\n").unwrap();
    writer.flush().unwrap();
  });

  let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
  let events_clone = events.clone();
  let handler: Arc<dyn EventHandler> = Arc::new(FnEventHandler::new(move |message: Message| {
    events_clone.lock().unwrap().push(message.to_string());
  }));

  let controller = Controller::with_event_handler(
    Box::new(TcpStream::connect(("127.0.0.1", port)).unwrap()),
    handler,
  );
  controller.connect().unwrap();

  let reply = controller.send("GETINFO version").unwrap();
  assert_eq!(reply.to_string(), "OK");

  controller.close().unwrap();
  server.join().unwrap();

  assert_eq!(*events.lock().unwrap(), vec!["BW 1 2".to_string()]);
}

#[test]
fn reconnecting_after_close_emits_reset_not_init_again() {
  let (listener, port) = listener();

  let server = thread::spawn(move || {
    for _ in 0..2 {
      let (stream, _) = listener.accept().unwrap();
      drop(stream);
    }
  });

  let controller = Controller::from_port("127.0.0.1", port).unwrap();
  let seen: Arc<Mutex<Vec<StatusEvent>>> = Arc::new(Mutex::new(Vec::new()));
  let seen_clone = seen.clone();
  controller.add_status_listener(
    move |_controller, event, _ts| {
      seen_clone.lock().unwrap().push(event);
    },
    false,
  );

  controller.connect().unwrap();
  controller.close().unwrap();
  controller.connect().unwrap();
  controller.close().unwrap();

  server.join().unwrap();

  assert_eq!(
    *seen.lock().unwrap(),
    vec![
      StatusEvent::Init,
      StatusEvent::Closed,
      StatusEvent::Reset,
      StatusEvent::Closed,
    ]
  );
}

#[test]
fn all_queued_events_are_delivered_before_close_returns() {
  let (listener, port) = listener();

  let server = thread::spawn(move || {
    let (stream, _) = listener.accept().unwrap();
    let mut writer = stream;
    for n in 0..20 {
      let line = format!("650 EVENT {n}\r\n");
      writer.write_all(line.as_bytes()).unwrap();
    }
    writer.flush().unwrap();
    // Give the reader a moment to have queued everything before the peer
    // drops the connection out from under it.
    thread::sleep(Duration::from_millis(50));
  });

  let delivered = Arc::new(AtomicUsize::new(0));
  let delivered_clone = delivered.clone();
  let handler: Arc<dyn EventHandler> = Arc::new(FnEventHandler::new(move |_message: Message| {
    thread::sleep(Duration::from_millis(2));
    delivered_clone.fetch_add(1, Ordering::SeqCst);
  }));

  let controller = Controller::with_event_handler(
    Box::new(TcpStream::connect(("127.0.0.1", port)).unwrap()),
    handler,
  );
  controller.connect().unwrap();

  // Give the reader a moment to start queuing events, then close while the
  // dispatcher (2ms/event, 40ms total) is almost certainly still draining.
  thread::sleep(Duration::from_millis(5));
  controller.close().unwrap();

  assert_eq!(delivered.load(Ordering::SeqCst), 20);
  server.join().unwrap();
}

#[test]
fn close_unblocks_a_send_in_flight_instead_of_hanging() {
  let (listener, port) = listener();

  // Accepts and reads the command but never replies, so the pending
  // `send` has nothing to wake it but `close()`.
  let server = thread::spawn(move || {
    let (stream, _) = listener.accept().unwrap();
    let mut reader = BufReader::new(stream);
    let _command = read_command(&mut reader);
  });

  let controller = Controller::from_port("127.0.0.1", port).unwrap();
  controller.connect().unwrap();

  let (result_tx, result_rx) = std::sync::mpsc::channel();
  let sender = controller.clone();
  thread::spawn(move || {
    let _ = result_tx.send(sender.send("GETINFO version"));
  });

  // Give the send a moment to be in flight, holding nothing but the
  // Writer Gate's own internal lock, before tearing the connection down.
  thread::sleep(Duration::from_millis(20));
  controller.close().unwrap();

  let err = result_rx
    .recv_timeout(Duration::from_secs(2))
    .expect("send() must return once close() tears the connection down, not hang")
    .unwrap_err();
  assert!(matches!(err, ControllerError::Closed(_)));

  server.join().unwrap();
}

#[test]
fn send_after_close_returns_socket_closed() {
  let (listener, port) = listener();

  let server = thread::spawn(move || {
    let (_stream, _) = listener.accept().unwrap();
  });

  let controller = Controller::from_port("127.0.0.1", port).unwrap();
  controller.connect().unwrap();
  controller.close().unwrap();

  let err = controller.send("GETINFO version").unwrap_err();
  assert!(matches!(err, ControllerError::Closed(_)));

  server.join().unwrap();
}

#[test]
fn close_is_idempotent() {
  let (listener, port) = listener();
  let server = thread::spawn(move || {
    let (_stream, _) = listener.accept().unwrap();
  });

  let controller = Controller::from_port("127.0.0.1", port).unwrap();
  controller.connect().unwrap();
  controller.close().unwrap();
  controller.close().unwrap();

  server.join().unwrap();
}
