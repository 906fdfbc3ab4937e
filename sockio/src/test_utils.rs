//! Test utilities for unit and integration tests.
//!
//! Everything here works on IPv4 loopback so tests also pass on hosts without
//! IPv6.

use std::net::{TcpListener, TcpStream};
use std::os::fd::RawFd;

pub const LOOPBACK: &str = "127.0.0.1";

/// A loopback port that was free a moment ago.
///
/// The port is released before returning, so another process may grab it.
#[doc(hidden)]
pub fn free_port() -> u16 {
  let listener = TcpListener::bind((LOOPBACK, 0)).unwrap();
  listener.local_addr().unwrap().port()
}

/// A connected loopback pair: `(client, server)`.
#[doc(hidden)]
pub fn tcp_pair() -> (TcpStream, TcpStream) {
  let listener = TcpListener::bind((LOOPBACK, 0)).unwrap();
  let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
  let (server, _) = listener.accept().unwrap();
  (client, server)
}

/// Whether `O_NONBLOCK` is set on `fd`.
#[doc(hidden)]
pub fn is_nonblocking(fd: RawFd) -> bool {
  let flags = syscall!(fcntl(fd, libc::F_GETFL)).unwrap();
  flags & libc::O_NONBLOCK != 0
}
