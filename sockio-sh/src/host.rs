//! The script interpreter.
//!
//! A script is a sequence of lines. Each line is split on ASCII whitespace and
//! every word of the form `$name` is replaced by that slot's value (empty when
//! unset). `$?` holds the status of the last `socket` command.
//!
//! Other words may carry backslash escapes: `\n`, `\r`, `\t`, `\s` (a space)
//! and `\\`. Any other backslash is kept as written. Slot values are never
//! unescaped.
//!
//! ```text
//! # comment
//! socket connect -T 2000 127.0.0.1 7 fd
//! socket send $fd hello\n
//! socket recv -T 2000 $fd reply
//! print reply
//! exit $?
//! ```

use std::ffi::OsString;
use std::io::Write;
use std::os::unix::ffi::OsStringExt;

use anyhow::Context;
use sockio::{Dispatcher, Slots, Status, VarTable};

pub const STATUS_SLOT: &str = "?";

/// What the caller should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
  Continue,
  Exit(u8),
}

pub struct Host<O, E> {
  dispatcher: Dispatcher<VarTable>,
  out: O,
  err: E,
  last: u8,
}

impl<O: Write, E: Write> Host<O, E> {
  pub fn new(out: O, err: E) -> Self {
    Self { dispatcher: Dispatcher::new(VarTable::new()), out, err, last: 0 }
  }

  /// Status of the last `socket` command, or of the last rejected line.
  pub fn last_status(&self) -> u8 {
    self.last
  }

  pub fn vars(&self) -> &VarTable {
    self.dispatcher.slots()
  }

  /// Runs one script line.
  ///
  /// Only failures to write to the output streams are errors; everything a
  /// script can get wrong is reported on the error stream and reflected in
  /// [`Host::last_status`].
  pub fn run_line(&mut self, line: &[u8]) -> anyhow::Result<Flow> {
    let words: Vec<Vec<u8>> = line
      .split(u8::is_ascii_whitespace)
      .filter(|w| !w.is_empty())
      .map(|w| self.expand(w))
      .collect();

    let Some((command, rest)) = words.split_first() else {
      return Ok(Flow::Continue);
    };
    if command.starts_with(b"#") {
      return Ok(Flow::Continue);
    }

    match command.as_slice() {
      b"socket" => {
        let args = words.iter().map(|w| OsString::from_vec(w.clone()));
        let status = self.dispatcher.run(args, &mut self.err);
        self.set_status(status.code());
      }
      b"print" => {
        for name in rest {
          let name = String::from_utf8_lossy(name);
          let value = self.vars().get(&name).unwrap_or_default().to_vec();
          self.out.write_all(&value).context("writing to stdout")?;
          self.out.write_all(b"\n").context("writing to stdout")?;
        }
      }
      b"exit" => {
        let code = match rest.first() {
          None => self.last,
          Some(word) => match parse_code(word) {
            Some(code) => code,
            None => {
              writeln!(self.err, "sockio-sh: exit: bad status")
                .context("writing to stderr")?;
              Status::Usage.code()
            }
          },
        };
        return Ok(Flow::Exit(code));
      }
      other => {
        writeln!(
          self.err,
          "sockio-sh: unknown command {:?}",
          String::from_utf8_lossy(other)
        )
        .context("writing to stderr")?;
        self.set_status(Status::Usage.code());
      }
    }

    Ok(Flow::Continue)
  }

  fn expand(&self, word: &[u8]) -> Vec<u8> {
    match word.strip_prefix(b"$") {
      Some(name) if !name.is_empty() => {
        let name = String::from_utf8_lossy(name);
        self.vars().get(&name).unwrap_or_default().to_vec()
      }
      _ => unescape(word),
    }
  }

  fn set_status(&mut self, code: u8) {
    self.last = code;
    tracing::debug!(code, "status");
    self
      .dispatcher
      .slots_mut()
      .set(STATUS_SLOT, code.to_string().as_bytes());
  }
}

fn unescape(word: &[u8]) -> Vec<u8> {
  let mut out = Vec::with_capacity(word.len());
  let mut bytes = word.iter().copied();

  while let Some(b) = bytes.next() {
    if b != b'\\' {
      out.push(b);
      continue;
    }
    match bytes.next() {
      Some(b'n') => out.push(b'\n'),
      Some(b'r') => out.push(b'\r'),
      Some(b't') => out.push(b'\t'),
      Some(b's') => out.push(b' '),
      Some(b'\\') => out.push(b'\\'),
      Some(other) => out.extend_from_slice(&[b'\\', other]),
      None => out.push(b'\\'),
    }
  }
  out
}

fn parse_code(word: &[u8]) -> Option<u8> {
  std::str::from_utf8(word).ok()?.parse().ok()
}
