//! Error taxonomy shared by every operation.
//!
//! Callers branch on [`Error::status`], never on the rendered text. The text
//! exists for diagnostics and always starts with the verb that failed.

use std::{fmt, io};

use crate::handle::Handle;

/// Result alias used throughout sockio.
pub type Result<T> = std::result::Result<T, Error>;

/// The operation an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
  Connect,
  Send,
  Recv,
  Close,
  Listen,
  Accept,
}

impl Verb {
  pub const fn as_str(self) -> &'static str {
    match self {
      Verb::Connect => "connect",
      Verb::Send => "send",
      Verb::Recv => "recv",
      Verb::Close => "close",
      Verb::Listen => "listen",
      Verb::Accept => "accept",
    }
  }
}

impl fmt::Display for Verb {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// Malformed, missing or extra arguments. No I/O was attempted.
  #[error("usage: {0}")]
  Usage(String),

  /// The deadline elapsed before any qualifying progress was made.
  #[error("{verb}: timed out")]
  TimedOut { verb: Verb },

  #[error("{verb}: getaddrinfo({host},{port}): {reason}")]
  Resolve { verb: Verb, host: String, port: String, reason: String },

  #[error("{verb}: {source}")]
  Io {
    verb: Verb,
    #[source]
    source: io::Error,
  },

  /// The handle was created by this engine and has already been closed.
  #[error("{verb}: handle {handle} is already closed")]
  Closed { verb: Verb, handle: Handle },

  #[error("{verb}: handle {handle} is a listener, not a connection")]
  NotAStream { verb: Verb, handle: Handle },

  #[error("{verb}: handle {handle} is not a listener")]
  NotAListener { verb: Verb, handle: Handle },
}

impl Error {
  pub(crate) fn io(verb: Verb) -> impl FnOnce(io::Error) -> Error {
    move |source| Error::Io { verb, source }
  }

  /// The stable signal a host should act on.
  pub fn status(&self) -> Status {
    match self {
      Error::Usage(_) => Status::Usage,
      Error::TimedOut { .. } => Status::Timeout,
      Error::Resolve { .. }
      | Error::Io { .. }
      | Error::Closed { .. }
      | Error::NotAStream { .. }
      | Error::NotAListener { .. } => Status::Failure,
    }
  }

  pub fn is_timeout(&self) -> bool {
    matches!(self, Error::TimedOut { .. })
  }

  /// The underlying OS error number, when there is one.
  pub fn raw_os_error(&self) -> Option<i32> {
    match self {
      Error::Io { source, .. } => source.raw_os_error(),
      _ => None,
    }
  }
}

/// Outcome signal handed back to the host, one of four stable values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
  Ok = 0,
  Failure = 1,
  Usage = 2,
  Timeout = 124,
}

impl Status {
  pub const fn code(self) -> u8 {
    self as u8
  }
}

impl From<&Error> for Status {
  fn from(err: &Error) -> Self {
    err.status()
  }
}

impl From<Status> for std::process::ExitCode {
  fn from(status: Status) -> Self {
    std::process::ExitCode::from(status.code())
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.code())
  }
}
