//! Per-call deadlines.
//!
//! A [`Deadline`] is what the caller asks for. When an operation starts it
//! turns the deadline into an [`Expiry`], a single budget that every wait
//! inside that operation draws from. Retrying a wait (after `EINTR`, a
//! spurious wakeup or a partial read) never refills the budget.

use std::time::{Duration, Instant};

/// Upper bound on how long one operation may wait for readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deadline {
  /// Wait as long as it takes.
  #[default]
  Infinite,
  /// Check readiness once and never sleep.
  Immediate,
  /// Wait at most this long. `Bounded(Duration::ZERO)` behaves as `Immediate`.
  Bounded(Duration),
}

impl Deadline {
  /// Maps an optional millisecond budget the way hosts express it: no value is
  /// infinite, `0` is an immediate poll.
  pub fn from_millis(ms: Option<u64>) -> Self {
    match ms {
      None => Deadline::Infinite,
      Some(0) => Deadline::Immediate,
      Some(ms) => Deadline::Bounded(Duration::from_millis(ms)),
    }
  }

  pub fn is_infinite(self) -> bool {
    matches!(self, Deadline::Infinite)
  }

  /// Starts the clock.
  pub fn start(self) -> Expiry {
    let now = Instant::now();
    match self {
      Deadline::Infinite => Expiry::NEVER,
      Deadline::Immediate => Expiry { at: Some(now) },
      // Budgets too large to represent are as good as infinite.
      Deadline::Bounded(budget) => Expiry { at: now.checked_add(budget) },
    }
  }
}

/// A started deadline: the instant after which waits must not sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
  at: Option<Instant>,
}

impl Expiry {
  pub const NEVER: Expiry = Expiry { at: None };

  /// Time left, `None` when unbounded.
  pub fn remaining(&self) -> Option<Duration> {
    self.at.map(|at| at.saturating_duration_since(Instant::now()))
  }

  pub fn is_elapsed(&self) -> bool {
    self.remaining().is_some_and(|left| left.is_zero())
  }

  /// The timeout argument for `poll(2)`: `-1` for unbounded, otherwise the
  /// remaining budget in whole milliseconds, rounded up.
  pub(crate) fn poll_timeout(&self) -> libc::c_int {
    match self.remaining() {
      None => -1,
      Some(left) => duration_to_poll_ms(left),
    }
  }
}

fn duration_to_poll_ms(d: Duration) -> libc::c_int {
  // Rounding down would let poll return before the deadline.
  let ms = d.as_millis() + u128::from(d.subsec_nanos() % 1_000_000 != 0);
  libc::c_int::try_from(ms).unwrap_or(libc::c_int::MAX)
}
