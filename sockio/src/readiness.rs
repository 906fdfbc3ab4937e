//! Readiness waiting, the one place sockio puts the calling thread to sleep.

use std::io;
use std::os::fd::RawFd;

use crate::deadline::Expiry;

/// What the caller wants to be woken up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
  bits: u8,
}

impl Interest {
  pub const READ: Self = Self { bits: 1 << 0 };
  pub const WRITE: Self = Self { bits: 1 << 1 };

  pub const fn is_readable(self) -> bool {
    self.bits & Self::READ.bits != 0
  }

  pub const fn is_writable(self) -> bool {
    self.bits & Self::WRITE.bits != 0
  }

  fn poll_events(self) -> libc::c_short {
    let mut events = 0;
    if self.is_readable() {
      events |= libc::POLLIN;
    }
    if self.is_writable() {
      events |= libc::POLLOUT;
    }
    events
  }
}

/// Result of a wait that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
  /// The descriptor is ready, or has an error/hangup pending that the next
  /// syscall on it will report.
  Ready,
  TimedOut,
}

enum State {
  Waiting,
  Done(io::Result<Readiness>),
}

/// Blocks until `fd` matches `interest` or `expiry` passes.
///
/// Interrupted polls re-enter the wait with whatever budget is left.
pub fn wait(
  fd: RawFd,
  interest: Interest,
  expiry: &Expiry,
) -> io::Result<Readiness> {
  let mut pollfd =
    libc::pollfd { fd, events: interest.poll_events(), revents: 0 };

  let mut state = State::Waiting;
  loop {
    state = match state {
      State::Done(result) => return result,
      State::Waiting => {
        let timeout = expiry.poll_timeout();
        tracing::trace!(fd, timeout, "poll");
        match syscall!(poll(&mut pollfd, 1, timeout)) {
          Ok(0) => State::Done(Ok(Readiness::TimedOut)),
          Ok(_) if pollfd.revents & libc::POLLNVAL != 0 => {
            State::Done(Err(io::Error::from_raw_os_error(libc::EBADF)))
          }
          Ok(_) => State::Done(Ok(Readiness::Ready)),
          Err(err) if err.kind() == io::ErrorKind::Interrupted => {
            State::Waiting
          }
          Err(err) => State::Done(Err(err)),
        }
      }
    };
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::deadline::Deadline;
  use std::io::Write;
  use std::os::fd::AsRawFd;
  use std::os::unix::net::UnixStream;
  use std::time::{Duration, Instant};

  #[test]
  fn times_out_without_data() {
    let (a, _b) = UnixStream::pair().unwrap();
    let start = Instant::now();
    let expiry = Deadline::Bounded(Duration::from_millis(50)).start();

    let res = wait(a.as_raw_fd(), Interest::READ, &expiry).unwrap();

    assert_eq!(res, Readiness::TimedOut);
    assert!(start.elapsed() >= Duration::from_millis(50));
  }

  #[test]
  fn immediate_checks_once() {
    let (a, mut b) = UnixStream::pair().unwrap();
    let expiry = Deadline::Immediate.start();
    assert_eq!(
      wait(a.as_raw_fd(), Interest::READ, &expiry).unwrap(),
      Readiness::TimedOut
    );

    b.write_all(b"x").unwrap();
    assert_eq!(
      wait(a.as_raw_fd(), Interest::READ, &expiry).unwrap(),
      Readiness::Ready
    );
  }

  #[test]
  fn writable_socket_is_ready() {
    let (a, _b) = UnixStream::pair().unwrap();
    let res = wait(a.as_raw_fd(), Interest::WRITE, &Expiry::NEVER).unwrap();
    assert_eq!(res, Readiness::Ready);
  }

  #[test]
  fn hangup_counts_as_ready() {
    let (a, b) = UnixStream::pair().unwrap();
    drop(b);
    let expiry = Deadline::Bounded(Duration::from_secs(5)).start();
    assert_eq!(
      wait(a.as_raw_fd(), Interest::READ, &expiry).unwrap(),
      Readiness::Ready
    );
  }

  #[test]
  fn invalid_descriptor_is_an_error() {
    let err = wait(1 << 30, Interest::READ, &Deadline::Immediate.start());
    assert_eq!(err.unwrap_err().raw_os_error(), Some(libc::EBADF));
  }
}
