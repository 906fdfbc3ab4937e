//! Transmission.

use std::io;
use std::os::fd::RawFd;

use crate::deadline::Expiry;
use crate::readiness::{self, Interest};

#[cfg(has_msg_nosignal)]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(has_msg_nosignal))]
const SEND_FLAGS: libc::c_int = 0;

/// Writes all of `data` to `fd`, blocking as long as it takes.
///
/// Short writes continue from where they stopped and interrupted writes are
/// retried. A non-blocking descriptor that would block is waited on for
/// write-readiness without a deadline. Writing to a reset connection fails with
/// `EPIPE` rather than raising SIGPIPE. Descriptors that are not sockets fall
/// back to `write(2)`.
pub fn send_all(fd: RawFd, data: &[u8]) -> io::Result<()> {
  let mut written = 0;
  let mut socket = true;

  while written < data.len() {
    let rest = &data[written..];
    let res = if socket { send(fd, rest) } else { write(fd, rest) };

    match res {
      Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
      Ok(n) => written += n,
      Err(err) if socket && err.raw_os_error() == Some(libc::ENOTSOCK) => {
        tracing::debug!(fd, "not a socket, falling back to write");
        socket = false;
      }
      Err(err) => match err.kind() {
        io::ErrorKind::Interrupted => {}
        io::ErrorKind::WouldBlock => {
          readiness::wait(fd, Interest::WRITE, &Expiry::NEVER)?;
        }
        _ => return Err(err),
      },
    }
  }

  tracing::trace!(fd, written, "sent");
  Ok(())
}

fn send(fd: RawFd, data: &[u8]) -> io::Result<usize> {
  syscall!(send(fd, data.as_ptr().cast(), data.len(), SEND_FLAGS))
    .map(|n| n as usize)
}

fn write(fd: RawFd, data: &[u8]) -> io::Result<usize> {
  syscall!(write(fd, data.as_ptr().cast(), data.len())).map(|n| n as usize)
}
