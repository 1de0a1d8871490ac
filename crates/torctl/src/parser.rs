//! Frame Parser: decodes the line-framed control protocol into [`Message`]s.
//!
//! A pure function of a line source — it does not know about sockets,
//! threads, or the rest of the controller. `reader` drives it against the
//! live transport; tests drive it against an in-memory queue of lines.

use std::io::{self, BufRead};

use crate::error::ProtocolError;
use crate::message::{Divider, Message, ReplyLine};

/// A blocking source of CRLF-terminated lines, including the terminator.
///
/// `Ok(None)` means clean end-of-stream with no partial line pending —
/// the boundary a closed socket leaves behind between messages.
pub trait LineSource {
  fn read_line(&mut self) -> io::Result<Option<Vec<u8>>>;
}

/// Adapts any [`BufRead`] into a [`LineSource`] using `\n` as the
/// delimiter (CRLF lines always end in `\n`, so this is sufficient).
pub struct BufReadLineSource<R> {
  inner: R,
}

impl<R: BufRead> BufReadLineSource<R> {
  pub fn new(inner: R) -> Self {
    Self { inner }
  }
}

impl<R: BufRead> LineSource for BufReadLineSource<R> {
  fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    let n = self.inner.read_until(b'\n', &mut buf)?;
    if n == 0 {
      return Ok(None);
    }
    Ok(Some(buf))
  }
}

/// Outcome of a failed [`read_message`] call.
#[derive(Debug)]
pub enum ParseError {
  /// The underlying transport failed to produce bytes at all.
  Io(io::Error),
  /// Bytes were produced but did not form a well-formed frame.
  Protocol(ProtocolError),
}

impl From<io::Error> for ParseError {
  fn from(e: io::Error) -> Self {
    ParseError::Io(e)
  }
}

const CRLF: &[u8] = b"\r\n";
const DATA_TERMINATOR: &[u8] = b".\r\n";

fn strip_crlf(line: Vec<u8>) -> Result<Vec<u8>, ParseError> {
  if line.len() < 2 || &line[line.len() - 2..] != CRLF {
    return Err(ParseError::Protocol(ProtocolError::MissingCrlf(line)));
  }
  let mut line = line;
  line.truncate(line.len() - 2);
  Ok(line)
}

fn parse_status_and_divider(body: &[u8]) -> Result<(String, u8, &[u8]), ParseError> {
  if body.len() < 4 {
    return Err(ParseError::Protocol(ProtocolError::LineTooShort(
      body.to_vec(),
    )));
  }
  let status_bytes = &body[0..3];
  if !status_bytes.iter().all(u8::is_ascii_digit) {
    return Err(ParseError::Protocol(ProtocolError::InvalidStatusCode(
      status_bytes.to_vec(),
    )));
  }
  let status_code = String::from_utf8_lossy(status_bytes).into_owned();
  let divider_byte = body[3];
  let content = &body[4..];
  Ok((status_code, divider_byte, content))
}

/// Reads one complete [`Message`] from `source`.
///
/// Returns `Ok(None)` if the source is cleanly exhausted before any line of
/// a new message was read — the normal signal that the peer closed the
/// connection. Any EOF encountered once a message is partway through
/// assembly is reported as [`ProtocolError::TruncatedMessage`], per the
/// framing contract: a torn-down socket must never silently truncate a
/// message in progress.
pub fn read_message<L: LineSource>(source: &mut L) -> Result<Option<Message>, ParseError> {
  let mut lines: Vec<ReplyLine> = Vec::new();
  let mut raw = Vec::new();

  loop {
    let line_bytes = match source.read_line()? {
      Some(b) => b,
      None => {
        return if lines.is_empty() {
          Ok(None)
        } else {
          Err(ParseError::Protocol(ProtocolError::TruncatedMessage))
        };
      }
    };
    raw.extend_from_slice(&line_bytes);
    let body = strip_crlf(line_bytes)?;
    let (status_code, divider_byte, content_bytes) = parse_status_and_divider(&body)?;
    let content = String::from_utf8_lossy(content_bytes).into_owned();

    match Divider::from_byte(divider_byte) {
      Some(Divider::Mid) => {
        lines.push(ReplyLine {
          status_code,
          divider: Divider::Mid,
          content,
        });
      }
      Some(Divider::End) => {
        lines.push(ReplyLine {
          status_code,
          divider: Divider::End,
          content,
        });
        return Ok(Some(Message::new(lines, raw)));
      }
      Some(Divider::Data) => {
        let data_content = read_data_block(source, &mut raw)?;
        lines.push(ReplyLine {
          status_code,
          divider: Divider::Data,
          content: data_content,
        });
      }
      None => {
        return Err(ParseError::Protocol(ProtocolError::UnrecognizedDivider(
          divider_byte,
        )));
      }
    }
  }
}

/// Reads lines of a `+`-data block until a lone `.` terminator, applying
/// control-spec dot-stuffing (a leading `..` is unescaped to a single `.`),
/// and joins the (already unescaped) lines with `\n`.
fn read_data_block<L: LineSource>(source: &mut L, raw: &mut Vec<u8>) -> Result<String, ParseError> {
  let mut data_lines: Vec<String> = Vec::new();
  loop {
    let line_bytes = match source.read_line()? {
      Some(b) => b,
      None => return Err(ParseError::Protocol(ProtocolError::TruncatedMessage)),
    };
    raw.extend_from_slice(&line_bytes);
    if line_bytes == DATA_TERMINATOR {
      break;
    }
    let mut body = strip_crlf(line_bytes)?;
    if body.starts_with(b"..") {
      body.remove(0);
    }
    data_lines.push(String::from_utf8_lossy(&body).into_owned());
  }
  Ok(data_lines.join("\n"))
}
