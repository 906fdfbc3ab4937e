//! Handles and the table that tracks who created them.
//!
//! A [`Handle`] is the OS descriptor number itself; hosts store it as plain
//! text and hand it back later. The engine keeps a [`HandleTable`] beside it so
//! that ownership moves exactly once: sockets are held by RAII guards until
//! [`HandleTable::adopt`] releases them into the table, and a close retires the
//! number so a second close is reported instead of silently hitting whatever
//! the OS handed out next.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
use std::str::FromStr;

/// Identifier of an open connection or listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(RawFd);

impl Handle {
  /// Wraps a descriptor number. Negative numbers are never valid handles.
  pub fn from_raw(fd: RawFd) -> Option<Self> {
    (fd >= 0).then_some(Self(fd))
  }
}

impl AsRawFd for Handle {
  fn as_raw_fd(&self) -> RawFd {
    self.0
  }
}

impl fmt::Display for Handle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid handle {0:?}: expected a non-negative integer")]
pub struct ParseHandleError(String);

impl FromStr for Handle {
  type Err = ParseHandleError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    s.parse::<RawFd>()
      .ok()
      .and_then(Handle::from_raw)
      .ok_or_else(|| ParseHandleError(s.to_owned()))
  }
}

/// What a handle may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
  /// A connected (or connecting) byte stream: send, recv, close.
  Stream,
  /// A listening socket: accept, close.
  Listener,
}

/// Where a handle stands from the engine's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
  Open(HandleKind),
  /// Created here and already closed.
  Retired,
  /// Not created by this engine, e.g. a descriptor inherited from the host.
  Foreign,
}

#[derive(Debug, Default)]
pub struct HandleTable {
  open: HashMap<Handle, HandleKind>,
  retired: HashSet<Handle>,
}

impl HandleTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Takes ownership of `fd` away from its guard and registers it.
  pub fn adopt(&mut self, fd: impl IntoRawFd, kind: HandleKind) -> Handle {
    let handle = Handle(fd.into_raw_fd());
    // The OS may hand out a number we retired earlier; it is a new socket now.
    self.retired.remove(&handle);
    self.open.insert(handle, kind);
    tracing::debug!(%handle, ?kind, "handle opened");
    handle
  }

  pub fn lookup(&self, handle: Handle) -> Lookup {
    if let Some(kind) = self.open.get(&handle) {
      Lookup::Open(*kind)
    } else if self.retired.contains(&handle) {
      Lookup::Retired
    } else {
      Lookup::Foreign
    }
  }

  /// Marks the handle closed. Foreign handles are remembered too, so closing
  /// them twice is reported the same way.
  pub fn retire(&mut self, handle: Handle) {
    self.open.remove(&handle);
    self.retired.insert(handle);
    tracing::debug!(%handle, "handle closed");
  }

  pub fn open_count(&self) -> usize {
    self.open.len()
  }
}
