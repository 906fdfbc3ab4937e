//! The receive buffer.
//!
//! [`FrameBuf`] is an owned byte container with an optional hard limit.
//! Capacity starts small, doubles when full and never exceeds the limit; bytes
//! already collected are never moved out or truncated. The reader only ever
//! fills it through [`FrameBuf::fill`] and takes the result with
//! [`FrameBuf::into_inner`].

use std::io;

/// Starting capacity, and the growth unit for unbounded reads.
pub const INITIAL_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct FrameBuf {
  data: Vec<u8>,
  limit: Option<usize>,
}

impl FrameBuf {
  pub fn new(limit: Option<usize>) -> Self {
    let capacity = limit.map_or(INITIAL_CAPACITY, |l| l.min(INITIAL_CAPACITY));
    Self { data: Vec::with_capacity(capacity), limit }
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.data.capacity()
  }

  /// Bytes still accepted before the limit, `None` when unlimited.
  pub fn remaining(&self) -> Option<usize> {
    self.limit.map(|limit| limit.saturating_sub(self.data.len()))
  }

  pub fn is_full(&self) -> bool {
    self.remaining() == Some(0)
  }

  /// How much the next unsized read should ask for: the free capacity, or the
  /// next growth step when there is none.
  pub fn spare(&self) -> usize {
    let len = self.data.len();
    let free = match self.data.capacity() - len {
      0 => self.next_capacity() - len,
      free => free,
    };
    self.clamp(free)
  }

  /// The bytes most recently added by a fill of `n` bytes.
  pub fn tail(&self, n: usize) -> &[u8] {
    &self.data[self.data.len() - n.min(self.data.len())..]
  }

  /// Lends up to `want` bytes of room (fewer if the limit is closer) to
  /// `read`, keeping exactly as many bytes as it reports.
  ///
  /// A failed `read` leaves the buffer as it was.
  pub fn fill<F>(&mut self, want: usize, read: F) -> io::Result<usize>
  where
    F: FnOnce(&mut [u8]) -> io::Result<usize>,
  {
    let want = self.clamp(want);
    self.reserve(want);

    let start = self.data.len();
    self.data.resize(start + want, 0);
    let result = read(&mut self.data[start..]);
    let kept = match &result {
      Ok(n) => (*n).min(want),
      Err(_) => 0,
    };
    self.data.truncate(start + kept);

    result.map(|_| kept)
  }

  pub fn into_inner(self) -> Vec<u8> {
    self.data
  }

  fn clamp(&self, want: usize) -> usize {
    match self.remaining() {
      Some(left) => want.min(left),
      None => want,
    }
  }

  fn next_capacity(&self) -> usize {
    let doubled = self.data.capacity().max(1).saturating_mul(2);
    match self.limit {
      Some(limit) => doubled.min(limit).max(self.data.len()),
      None => doubled,
    }
  }

  fn reserve(&mut self, additional: usize) {
    let needed = self.data.len() + additional;
    if needed <= self.data.capacity() {
      return;
    }
    let mut target = self.next_capacity();
    while target < needed {
      target = target.saturating_mul(2);
    }
    if let Some(limit) = self.limit {
      target = target.min(limit).max(needed);
    }
    self.data.reserve_exact(target - self.data.len());
  }
}
