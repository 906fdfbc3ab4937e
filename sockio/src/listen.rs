//! Listening sockets and accepting connections on them.

use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use socket2::{SockAddr, Socket};

use crate::deadline::Deadline;
use crate::error::{Error, Result, Verb};
use crate::net_utils::Peer;
use crate::readiness::{self, Interest, Readiness};
use crate::resolve::{self, Family};
use crate::socket::{disable_sigpipe, tcp_socket};

pub const DEFAULT_BACKLOG: i32 = 128;

const WILDCARD_V6: &str = "::";
const WILDCARD_V4: &str = "0.0.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListenOptions {
  /// Local address to bind; all interfaces when `None`.
  pub addr: Option<String>,
  /// Must be non-zero.
  pub port: u16,
  /// Pending-connection queue length, [`DEFAULT_BACKLOG`] when `None`.
  pub backlog: Option<i32>,
}

/// Binds and listens, returning the owned listening socket.
///
/// Without an explicit address the listener prefers a dual-stack `::` socket
/// and falls back to `0.0.0.0` when IPv6 is unavailable.
pub fn listen(opts: &ListenOptions) -> Result<Socket> {
  if opts.port == 0 {
    return Err(Error::Usage("listen: a non-zero port is required".into()));
  }

  let port = opts.port.to_string();
  let backlog = opts.backlog.unwrap_or(DEFAULT_BACKLOG);
  let on = |host: &str| -> Result<Socket> {
    let candidates =
      resolve::resolve(Verb::Listen, host, &port, Family::Unspecified, true)?;
    bind_first(&candidates, backlog)
  };

  match opts.addr.as_deref() {
    Some(addr) => on(addr),
    None => on(WILDCARD_V6).or_else(|err| {
      tracing::debug!(error = %err, "dual-stack listen failed, trying IPv4");
      on(WILDCARD_V4)
    }),
  }
}

fn bind_first(candidates: &[SocketAddr], backlog: i32) -> Result<Socket> {
  let mut last_err = None;

  for addr in candidates {
    match bind_one(addr, backlog) {
      Ok(socket) => {
        tracing::debug!(%addr, backlog, "listening");
        return Ok(socket);
      }
      Err(err) => {
        tracing::debug!(%addr, error = %err, "listen candidate failed");
        last_err = Some(err);
      }
    }
  }

  let source = last_err
    .unwrap_or_else(|| io::Error::from_raw_os_error(libc::EADDRINUSE));
  Err(Error::Io { verb: Verb::Listen, source })
}

fn bind_one(addr: &SocketAddr, backlog: i32) -> io::Result<Socket> {
  let socket = tcp_socket(addr)?;
  socket.set_reuse_address(true)?;

  if addr.is_ipv6() {
    if let Err(err) = socket.set_only_v6(false) {
      tracing::warn!(%addr, error = %err, "could not enable dual-stack");
    }
  }

  socket.bind(&SockAddr::from(*addr))?;
  socket.listen(backlog)?;
  Ok(socket)
}

/// Accepts one connection from the listener `fd`.
///
/// An infinite deadline goes straight into a blocking `accept`; any other
/// deadline waits for the listener to become readable first. The accepted
/// socket is close-on-exec. A peer whose address cannot be formatted is
/// reported as an empty [`Peer`].
pub fn accept(fd: RawFd, deadline: Deadline) -> Result<(OwnedFd, Peer)> {
  let expiry = deadline.start();
  let mut must_wait = !deadline.is_infinite();

  loop {
    if must_wait {
      let ready = readiness::wait(fd, Interest::READ, &expiry)
        .map_err(Error::io(Verb::Accept))?;
      if ready == Readiness::TimedOut {
        return Err(Error::TimedOut { verb: Verb::Accept });
      }
    }

    // SAFETY: sockaddr_storage is plain data and large enough for any family.
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of_val(&storage) as libc::socklen_t;

    match accept_cloexec(fd, &mut storage, &mut len) {
      Ok(client) => {
        disable_sigpipe(client.as_raw_fd()).map_err(Error::io(Verb::Accept))?;

        // SAFETY: the kernel wrote `len` bytes of address into `storage`.
        let peer =
          unsafe { Peer::from_sockaddr((&raw const storage).cast(), len) }
            .unwrap_or_else(|err| {
              tracing::debug!(error = %err, "peer address not formatted");
              Peer::default()
            });

        tracing::debug!(
          listener = fd,
          client = client.as_raw_fd(),
          %peer,
          "accepted"
        );
        return Ok((client, peer));
      }
      Err(err) => match err.raw_os_error() {
        Some(libc::EINTR) => must_wait = false,
        // Pending connection vanished, or the listener is non-blocking.
        Some(libc::EAGAIN) | Some(libc::ECONNABORTED) => must_wait = true,
        _ => return Err(Error::Io { verb: Verb::Accept, source: err }),
      },
    }
  }
}

#[cfg(has_accept4)]
fn accept_cloexec(
  fd: RawFd,
  storage: &mut libc::sockaddr_storage,
  len: &mut libc::socklen_t,
) -> io::Result<OwnedFd> {
  let client = syscall!(accept4(
    fd,
    (storage as *mut libc::sockaddr_storage).cast(),
    len,
    libc::SOCK_CLOEXEC
  ))?;
  // SAFETY: accept4 returned a fresh descriptor that nothing else owns.
  Ok(unsafe { OwnedFd::from_raw_fd(client) })
}

#[cfg(not(has_accept4))]
fn accept_cloexec(
  fd: RawFd,
  storage: &mut libc::sockaddr_storage,
  len: &mut libc::socklen_t,
) -> io::Result<OwnedFd> {
  let client = syscall!(accept(
    fd,
    (storage as *mut libc::sockaddr_storage).cast(),
    len
  ))?;
  // SAFETY: accept returned a fresh descriptor that nothing else owns. The
  // guard closes it if setting close-on-exec fails.
  let client = unsafe { OwnedFd::from_raw_fd(client) };
  syscall!(fcntl(client.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC))?;
  Ok(client)
}
