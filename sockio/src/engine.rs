//! The stateful front door.
//!
//! [`Engine`] owns every socket it creates until [`Engine::close`] releases it.
//! The free functions in [`connect`](crate::connect), [`recv`](crate::recv),
//! [`send`](crate::send) and [`listen`](crate::listen) do the I/O; the engine
//! adds handle bookkeeping on top, so that a handle is used only for what it is
//! and closed only once.

use std::os::fd::{AsRawFd, RawFd};

use crate::connect::{self, ConnectOptions};
use crate::deadline::Deadline;
use crate::error::{Error, Result, Verb};
use crate::handle::{Handle, HandleKind, HandleTable, Lookup};
use crate::listen::{self, ListenOptions};
use crate::net_utils::Peer;
use crate::recv::{self, Received, RecvOptions};
use crate::send;

/// A connection taken from a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
  pub handle: Handle,
  pub peer: Peer,
}

/// Handles are plain descriptor numbers, so dropping the engine does not close
/// them; close what you opened.
#[derive(Debug, Default)]
pub struct Engine {
  handles: HandleTable,
}

impl Engine {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn connect(
    &mut self,
    host: &str,
    port: &str,
    opts: &ConnectOptions,
  ) -> Result<Handle> {
    let socket = connect::connect(host, port, opts)?;
    Ok(self.handles.adopt(socket, HandleKind::Stream))
  }

  /// Writes all of `data`. There is no deadline: this blocks until the kernel
  /// has taken every byte or the connection fails.
  pub fn send(&mut self, handle: Handle, data: &[u8]) -> Result<()> {
    let fd = self.usable(handle, Verb::Send, HandleKind::Stream)?;
    send::send_all(fd, data).map_err(Error::io(Verb::Send))
  }

  /// Reads under `opts`. An empty result means the peer closed the connection
  /// before sending anything; [`Error::TimedOut`] means nothing arrived in
  /// time, and the handle stays usable.
  pub fn recv(
    &mut self,
    handle: Handle,
    opts: &RecvOptions,
  ) -> Result<Vec<u8>> {
    let fd = self.usable(handle, Verb::Recv, HandleKind::Stream)?;
    match recv::recv(fd, opts).map_err(Error::io(Verb::Recv))? {
      Received::Data(data) => Ok(data),
      Received::TimedOut => Err(Error::TimedOut { verb: Verb::Recv }),
    }
  }

  pub fn close(&mut self, handle: Handle) -> Result<()> {
    let lookup = self.handles.lookup(handle);
    if lookup == Lookup::Retired {
      return Err(Error::Closed { verb: Verb::Close, handle });
    }

    let res = syscall!(close(handle.as_raw_fd()));

    // close(2) releases the descriptor even when it reports an error, except
    // for EBADF on a number that was never open.
    let released = match &res {
      Ok(_) => true,
      Err(err) => {
        matches!(lookup, Lookup::Open(_))
          || err.raw_os_error() != Some(libc::EBADF)
      }
    };
    if released {
      self.handles.retire(handle);
    }

    res.map(drop).map_err(Error::io(Verb::Close))
  }

  pub fn listen(&mut self, opts: &ListenOptions) -> Result<Handle> {
    let socket = listen::listen(opts)?;
    Ok(self.handles.adopt(socket, HandleKind::Listener))
  }

  pub fn accept(
    &mut self,
    listener: Handle,
    deadline: Deadline,
  ) -> Result<Accepted> {
    let fd = self.usable(listener, Verb::Accept, HandleKind::Listener)?;
    let (client, peer) = listen::accept(fd, deadline)?;
    let handle = self.handles.adopt(client, HandleKind::Stream);
    Ok(Accepted { handle, peer })
  }

  /// What the engine knows about `handle`.
  pub fn lookup(&self, handle: Handle) -> Lookup {
    self.handles.lookup(handle)
  }

  pub fn open_handles(&self) -> usize {
    self.handles.open_count()
  }

  /// Checks that `handle` may be used as `want`. Handles the engine did not
  /// create are passed through for the OS to judge.
  fn usable(
    &self,
    handle: Handle,
    verb: Verb,
    want: HandleKind,
  ) -> Result<RawFd> {
    match self.handles.lookup(handle) {
      Lookup::Open(kind) if kind == want => Ok(handle.as_raw_fd()),
      Lookup::Open(HandleKind::Listener) => {
        Err(Error::NotAStream { verb, handle })
      }
      Lookup::Open(HandleKind::Stream) => {
        Err(Error::NotAListener { verb, handle })
      }
      Lookup::Retired => Err(Error::Closed { verb, handle }),
      Lookup::Foreign => Ok(handle.as_raw_fd()),
    }
  }
}
