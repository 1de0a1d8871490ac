//! The `Message` value type: one complete control-port reply.

use std::fmt;

/// Status code for asynchronous events (spec.md glossary: "Event").
pub const EVENT_STATUS: &str = "650";

/// The fourth byte of a reply line, signaling how the line continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divider {
  /// `-`: more lines follow in this reply.
  Mid,
  /// ` `: this is the last line of the reply.
  End,
  /// `+`: a data block follows, terminated by a lone `.` line.
  Data,
}

impl Divider {
  pub(crate) fn from_byte(b: u8) -> Option<Self> {
    match b {
      b'-' => Some(Divider::Mid),
      b' ' => Some(Divider::End),
      b'+' => Some(Divider::Data),
      _ => None,
    }
  }

  pub(crate) fn as_byte(self) -> u8 {
    match self {
      Divider::Mid => b'-',
      Divider::End => b' ',
      Divider::Data => b'+',
    }
  }
}

/// One `(status_code, divider, content)` line of a `Message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
  pub status_code: String,
  pub divider: Divider,
  pub content: String,
}

/// One complete protocol reply: an ordered, non-empty sequence of
/// [`ReplyLine`]s plus the verbatim bytes they were parsed from.
///
/// Invariant: every line but the last has [`Divider::Mid`] or
/// [`Divider::Data`]; the last line has [`Divider::End`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
  lines: Vec<ReplyLine>,
  raw_content: Vec<u8>,
}

impl Message {
  pub(crate) fn new(lines: Vec<ReplyLine>, raw_content: Vec<u8>) -> Self {
    debug_assert!(!lines.is_empty());
    debug_assert!(lines.last().unwrap().divider == Divider::End);
    Self { lines, raw_content }
  }

  /// The verbatim bytes read from the socket, CRLFs and data-block
  /// terminator included.
  #[must_use]
  pub fn raw_content(&self) -> &[u8] {
    &self.raw_content
  }

  /// The parsed reply lines in wire order.
  #[must_use]
  pub fn content(&self) -> &[ReplyLine] {
    &self.lines
  }

  /// The status code of a line, indexed Python-style: negative counts from
  /// the end. Defaults to the terminal line (`-1`).
  #[must_use]
  pub fn status_code(&self, line_index: isize) -> &str {
    let len = self.lines.len() as isize;
    let idx = if line_index < 0 {
      len + line_index
    } else {
      line_index
    };
    &self.lines[idx as usize].status_code
  }

  /// True if this reply's terminal line carries [`EVENT_STATUS`] (`650`),
  /// meaning the daemon emitted it unsolicited rather than in response to
  /// a command.
  #[must_use]
  pub fn is_event(&self) -> bool {
    self.status_code(-1) == EVENT_STATUS
  }
}

impl fmt::Display for Message {
  /// Joins every line's content with `\n`, stripping status codes and
  /// dividers.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for line in &self.lines {
      if !first {
        write!(f, "\n")?;
      }
      first = false;
      write!(f, "{}", line.content)?;
    }
    Ok(())
  }
}
