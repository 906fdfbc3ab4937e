use std::io;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};

use socket2::{Domain, Protocol, Socket, Type};

/// Creates a close-on-exec TCP socket for `addr`'s family.
///
/// The returned [`Socket`] closes itself when dropped, which is how a failed
/// candidate gets cleaned up before the next one is tried.
pub(crate) fn tcp_socket(addr: &SocketAddr) -> io::Result<Socket> {
  let socket =
    Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;
  disable_sigpipe(socket.as_raw_fd())?;
  Ok(socket)
}

/// Makes writes to a reset connection fail with `EPIPE` instead of raising
/// SIGPIPE in the host process.
///
/// Only BSD-style systems have a per-socket switch (`SO_NOSIGPIPE`); elsewhere
/// the writer passes `MSG_NOSIGNAL` on every send, and this is a no-op.
pub(crate) fn disable_sigpipe(#[allow(unused)] fd: RawFd) -> io::Result<()> {
  #[cfg(has_nosigpipe)]
  {
    let opt: libc::c_int = 1;
    syscall!(setsockopt(
      fd,
      libc::SOL_SOCKET,
      libc::SO_NOSIGPIPE,
      &opt as *const libc::c_int as *const libc::c_void,
      std::mem::size_of::<libc::c_int>() as libc::socklen_t
    ))
    .map(drop)?;
  }

  Ok(())
}
