//! Connection establishment.
//!
//! Candidates come from [`resolve`](crate::resolve::resolve) and are tried in
//! order. Each one runs in one of three modes:
//!
//! | Mode         | When                     | Waits                        |
//! |--------------|--------------------------|------------------------------|
//! | non-blocking | `nonblocking` requested  | never; may still be connecting |
//! | bounded      | immediate/bounded        | for writability, to deadline |
//! | blocking     | infinite deadline        | until the handshake is done  |
//!
//! The deadline covers the connection phase only; name resolution runs first
//! and is not bounded.

use std::io;
use std::net::SocketAddr;
use std::os::fd::AsRawFd;

use socket2::{SockAddr, Socket};

use crate::deadline::{Deadline, Expiry};
use crate::error::{Error, Result, Verb};
use crate::readiness::{self, Interest, Readiness};
use crate::resolve::{self, Family};
use crate::socket::tcp_socket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectOptions {
  pub family: Family,
  /// Return as soon as the connect has been started.
  pub nonblocking: bool,
  /// Ignored when `nonblocking` is set.
  pub deadline: Deadline,
}

enum Attempt {
  TimedOut,
  Failed(io::Error),
}

impl From<io::Error> for Attempt {
  fn from(err: io::Error) -> Self {
    Attempt::Failed(err)
  }
}

/// Connects to `host`:`port`, returning the owned socket.
///
/// Sockets connected under a bounded deadline are switched back to blocking
/// mode; sockets from a non-blocking request stay non-blocking.
pub fn connect(
  host: &str,
  port: &str,
  opts: &ConnectOptions,
) -> Result<Socket> {
  let candidates =
    resolve::resolve(Verb::Connect, host, port, opts.family, false)?;
  connect_any(&candidates, opts)
}

/// Tries `candidates` in order under one shared deadline. Each failed
/// candidate's socket is closed before the next one is tried.
fn connect_any(
  candidates: &[SocketAddr],
  opts: &ConnectOptions,
) -> Result<Socket> {
  let expiry = opts.deadline.start();
  let mut last_err = None;
  let mut timed_out = false;

  for addr in candidates {
    tracing::debug!(%addr, ?opts, "connect candidate");

    match attempt(addr, opts, &expiry) {
      Ok(socket) => return Ok(socket),
      Err(Attempt::TimedOut) => {
        tracing::debug!(%addr, "connect candidate timed out");
        timed_out = true;
        if expiry.is_elapsed() {
          return Err(Error::TimedOut { verb: Verb::Connect });
        }
      }
      Err(Attempt::Failed(err)) => {
        tracing::debug!(%addr, error = %err, "connect candidate failed");
        last_err = Some(err);
      }
    }
  }

  match last_err {
    Some(source) => Err(Error::Io { verb: Verb::Connect, source }),
    None if timed_out => Err(Error::TimedOut { verb: Verb::Connect }),
    None => Err(Error::Io {
      verb: Verb::Connect,
      source: io::Error::from_raw_os_error(libc::ECONNREFUSED),
    }),
  }
}

fn attempt(
  addr: &SocketAddr,
  opts: &ConnectOptions,
  expiry: &Expiry,
) -> std::result::Result<Socket, Attempt> {
  let socket = tcp_socket(addr)?;
  let target = SockAddr::from(*addr);

  if opts.nonblocking {
    socket.set_nonblocking(true)?;
    return match socket.connect(&target) {
      Ok(()) => Ok(socket),
      Err(err) if is_in_progress(&err) => Ok(socket),
      Err(err) => Err(err.into()),
    };
  }

  let bounded = !opts.deadline.is_infinite();
  if bounded {
    socket.set_nonblocking(true)?;
  }

  match socket.connect(&target) {
    Ok(()) => {}
    Err(err) if is_in_progress(&err) => {
      // Blocking sockets land here only when the connect was interrupted;
      // the handshake carries on in the kernel either way.
      match readiness::wait(socket.as_raw_fd(), Interest::WRITE, expiry)? {
        Readiness::TimedOut => return Err(Attempt::TimedOut),
        Readiness::Ready => {}
      }
      if let Some(err) = socket.take_error()? {
        return Err(err.into());
      }
    }
    Err(err) => return Err(err.into()),
  }

  if bounded {
    socket.set_nonblocking(false)?;
  }
  Ok(socket)
}

fn is_in_progress(err: &io::Error) -> bool {
  matches!(
    err.raw_os_error(),
    Some(libc::EINPROGRESS) | Some(libc::EINTR) | Some(libc::EALREADY)
  )
}
