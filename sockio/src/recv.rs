//! Framed receive.
//!
//! Every policy runs the same loop: wait for read-readiness within what is
//! left of the deadline, read, repeat. What differs is when the loop stops.
//!
//! - [`Framing::Line`] stops after the first `\n` (kept in the result). The
//!   reader peeks first and consumes only through the terminator, so bytes that
//!   follow it stay in the socket for the next call.
//! - [`Framing::Bytes`] stops at exactly `count` bytes.
//! - [`Framing::All`] stops at end-of-file or at `max`.
//!
//! End-of-file always ends the read successfully with whatever was collected.
//! The deadline only produces [`Received::TimedOut`] when nothing was
//! collected; otherwise the partial data is the result.

use std::io;
use std::os::fd::RawFd;

use crate::buf::FrameBuf;
use crate::deadline::Deadline;
use crate::readiness::{self, Interest, Readiness};

/// Upper bound on how far a line read looks ahead in one step.
pub const LINE_CHUNK: usize = 1024;

/// Termination policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
  Line { max: Option<usize> },
  Bytes { count: usize },
  All { max: Option<usize> },
}

impl Default for Framing {
  fn default() -> Self {
    Framing::Line { max: None }
  }
}

impl Framing {
  fn limit(self) -> Option<usize> {
    match self {
      Framing::Line { max } | Framing::All { max } => max,
      Framing::Bytes { count } => Some(count),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecvOptions {
  pub deadline: Deadline,
  pub framing: Framing,
}

/// A receive that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
  /// Collected bytes; empty when the peer closed before sending anything.
  Data(Vec<u8>),
  /// The deadline passed before a single byte arrived.
  TimedOut,
}

enum Step {
  More,
  Done,
}

struct Reader {
  fd: RawFd,
  framing: Framing,
  buf: FrameBuf,
  /// Cleared when the descriptor turns out not to be a socket.
  peek: bool,
}

impl Reader {
  fn new(fd: RawFd, framing: Framing) -> Self {
    Self { fd, framing, buf: FrameBuf::new(framing.limit()), peek: true }
  }

  fn step(&mut self) -> io::Result<Step> {
    match self.framing {
      Framing::Line { .. } => self.step_line(),
      // The buffer grows toward the count as data arrives; it is never sized
      // to the count up front.
      Framing::Bytes { .. } | Framing::All { .. } => {
        let want = self.buf.spare();
        self.step_sized(want)
      }
    }
  }

  fn step_sized(&mut self, want: usize) -> io::Result<Step> {
    let fd = self.fd;
    let got = self.buf.fill(want, |dst| read(fd, dst))?;
    tracing::trace!(fd, got, total = self.buf.len(), "read");

    if got == 0 || self.buf.is_full() { Ok(Step::Done) } else { Ok(Step::More) }
  }

  fn step_line(&mut self) -> io::Result<Step> {
    let fd = self.fd;
    let want =
      self.buf.remaining().map_or(LINE_CHUNK, |left| left.min(LINE_CHUNK));

    let take = if self.peek {
      let mut probe = [0u8; LINE_CHUNK];
      match peek(fd, &mut probe[..want]) {
        Ok(0) => return Ok(Step::Done),
        Ok(n) => {
          probe[..n].iter().position(|b| *b == b'\n').map_or(n, |pos| pos + 1)
        }
        Err(err) if err.raw_os_error() == Some(libc::ENOTSOCK) => {
          tracing::debug!(fd, "not a socket, reading lines bytewise");
          self.peek = false;
          1
        }
        Err(err) => return Err(err),
      }
    } else {
      1
    };

    let got = self.buf.fill(take, |dst| read(fd, dst))?;
    tracing::trace!(fd, got, total = self.buf.len(), "read line chunk");

    if got == 0 || self.buf.is_full() || self.buf.tail(got).contains(&b'\n') {
      Ok(Step::Done)
    } else {
      Ok(Step::More)
    }
  }
}

/// Receives from `fd` under `opts`.
///
/// Interrupted and would-block reads go back to waiting; any other read or
/// wait error is returned as is.
pub fn recv(fd: RawFd, opts: &RecvOptions) -> io::Result<Received> {
  let expiry = opts.deadline.start();
  let mut reader = Reader::new(fd, opts.framing);

  while !reader.buf.is_full() {
    match readiness::wait(fd, Interest::READ, &expiry)? {
      Readiness::TimedOut if reader.buf.is_empty() => {
        return Ok(Received::TimedOut);
      }
      Readiness::TimedOut => break,
      Readiness::Ready => {}
    }

    match reader.step() {
      Ok(Step::More) => {}
      Ok(Step::Done) => break,
      Err(err) if is_retryable(&err) => {
        tracing::trace!(fd, error = %err, "spurious wakeup");
      }
      Err(err) => return Err(err),
    }
  }

  Ok(Received::Data(reader.buf.into_inner()))
}

fn is_retryable(err: &io::Error) -> bool {
  matches!(
    err.kind(),
    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
  )
}

fn read(fd: RawFd, dst: &mut [u8]) -> io::Result<usize> {
  syscall!(read(fd, dst.as_mut_ptr().cast(), dst.len())).map(|n| n as usize)
}

fn peek(fd: RawFd, dst: &mut [u8]) -> io::Result<usize> {
  syscall!(recv(fd, dst.as_mut_ptr().cast(), dst.len(), libc::MSG_PEEK))
    .map(|n| n as usize)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use std::os::fd::AsRawFd;
  use std::os::unix::net::UnixStream;
  use std::time::Duration;

  fn opts(framing: Framing, ms: u64) -> RecvOptions {
    RecvOptions { deadline: Deadline::from_millis(Some(ms)), framing }
  }

  fn data(bytes: &[u8]) -> Received {
    Received::Data(bytes.to_vec())
  }

  #[test]
  fn line_leaves_following_bytes_in_socket() {
    let (a, mut b) = UnixStream::pair().unwrap();
    b.write_all(b"one\ntwo\nthr").unwrap();
    drop(b);

    let line = Framing::Line { max: None };
    let fd = a.as_raw_fd();
    for want in [&b"one\n"[..], b"two\n", b"thr", b""] {
      assert_eq!(recv(fd, &opts(line, 1000)).unwrap(), data(want));
    }
  }

  #[test]
  fn line_respects_max() {
    let (a, mut b) = UnixStream::pair().unwrap();
    b.write_all(b"abcdefgh\n").unwrap();

    let line = Framing::Line { max: Some(3) };
    let got = recv(a.as_raw_fd(), &opts(line, 1000));
    assert_eq!(got.unwrap(), data(b"abc"));
  }

  #[test]
  fn line_on_a_pipe_reads_bytewise() {
    let (mut tx, rx) = pipe();
    tx.write_all(b"ab\ncd").unwrap();

    let line = Framing::Line { max: None };
    let fd = rx.as_raw_fd();
    assert_eq!(recv(fd, &opts(line, 1000)).unwrap(), data(b"ab\n"));
    drop(tx);
    assert_eq!(recv(fd, &opts(line, 1000)).unwrap(), data(b"cd"));
  }

  #[test]
  fn bytes_stops_at_count() {
    let (a, mut b) = UnixStream::pair().unwrap();
    b.write_all(b"0123456789").unwrap();

    let fd = a.as_raw_fd();
    let got = recv(fd, &opts(Framing::Bytes { count: 4 }, 1000)).unwrap();
    assert_eq!(got, Received::Data(b"0123".to_vec()));
    let got = recv(fd, &opts(Framing::Bytes { count: 6 }, 1000)).unwrap();
    assert_eq!(got, Received::Data(b"456789".to_vec()));
  }

  #[test]
  fn bytes_with_huge_count_returns_short_read() {
    let (a, mut b) = UnixStream::pair().unwrap();
    b.write_all(b"abc").unwrap();
    drop(b);

    let huge = Framing::Bytes { count: usize::MAX };
    let got = recv(a.as_raw_fd(), &opts(huge, 1000)).unwrap();
    assert_eq!(got, data(b"abc"));
  }

  #[test]
  fn bytes_buffer_grows_with_data() {
    let (a, mut b) = UnixStream::pair().unwrap();
    b.write_all(&[1u8; 10]).unwrap();
    drop(b);

    let framing = Framing::Bytes { count: 1 << 30 };
    let mut reader = Reader::new(a.as_raw_fd(), framing);
    reader.step().unwrap();
    assert_eq!(reader.buf.len(), 10);
    assert!(reader.buf.capacity() < 1 << 20);
  }

  #[test]
  fn all_reads_to_eof() {
    let (a, mut b) = UnixStream::pair().unwrap();
    let payload: Vec<u8> = (0..20_000u32).map(|i| i as u8).collect();
    b.write_all(&payload).unwrap();
    drop(b);

    let got = recv(a.as_raw_fd(), &opts(Framing::All { max: None }, 1000));
    assert_eq!(got.unwrap(), Received::Data(payload));
  }

  #[test]
  fn timeout_only_without_data() {
    let (a, mut b) = UnixStream::pair().unwrap();
    let fd = a.as_raw_fd();

    let got = recv(fd, &opts(Framing::Line { max: None }, 30)).unwrap();
    assert_eq!(got, Received::TimedOut);

    b.write_all(b"partial").unwrap();
    let got = recv(fd, &opts(Framing::Line { max: None }, 30)).unwrap();
    assert_eq!(got, Received::Data(b"partial".to_vec()));
  }

  #[test]
  fn partial_bytes_at_deadline_is_data() {
    let (a, mut b) = UnixStream::pair().unwrap();
    b.write_all(b"ab").unwrap();

    let deadline = Deadline::Bounded(Duration::from_millis(30));
    let got = recv(
      a.as_raw_fd(),
      &RecvOptions { deadline, framing: Framing::Bytes { count: 10 } },
    );
    assert_eq!(got.unwrap(), Received::Data(b"ab".to_vec()));
  }

  #[test]
  fn line_over_tcp_waits_for_terminator() {
    let (client, mut server) = crate::test_utils::tcp_pair();
    let fd = client.as_raw_fd();

    let writer = std::thread::spawn(move || {
      server.write_all(b"split ").unwrap();
      std::thread::sleep(Duration::from_millis(20));
      server.write_all(b"line\nnext").unwrap();
      server
    });

    let got = recv(fd, &opts(Framing::Line { max: None }, 2000)).unwrap();
    assert_eq!(got, Received::Data(b"split line\n".to_vec()));

    let _server = writer.join().unwrap();
    let got = recv(fd, &opts(Framing::Bytes { count: 4 }, 2000)).unwrap();
    assert_eq!(got, Received::Data(b"next".to_vec()));
  }

  fn pipe() -> (std::fs::File, std::fs::File) {
    use std::os::fd::FromRawFd;

    let mut fds = [0; 2];
    syscall!(pipe(fds.as_mut_ptr())).unwrap();
    unsafe {
      (std::fs::File::from_raw_fd(fds[1]), std::fs::File::from_raw_fd(fds[0]))
    }
  }
}
