//! # sockio - synchronous TCP primitives with per-call deadlines
//!
//! sockio gives script hosts six verbs over TCP: connect, send, recv, close,
//! listen and accept. Every call is synchronous. Calls that wait take a
//! [`Deadline`] and never wait past it, and every outcome maps onto one of four
//! stable [`Status`] values that a host can branch on.
//!
//! | Status    | Code | Meaning                                         |
//! |-----------|------|-------------------------------------------------|
//! | `Ok`      | 0    | the call did what was asked                     |
//! | `Failure` | 1    | resolution, connection or I/O failed            |
//! | `Usage`   | 2    | the call was malformed; no I/O was attempted    |
//! | `Timeout` | 124  | the deadline passed with nothing to show for it |
//!
//! There are two ways in. [`Engine`] is the typed API. [`Dispatcher`] parses
//! the words of a `socket <verb> ...` command line, runs them on an engine and
//! writes results into named [`Slots`].
//!
//! ```no_run
//! use std::time::Duration;
//! use sockio::{ConnectOptions, Deadline, Engine, Framing, RecvOptions};
//!
//! fn ping() -> sockio::Result<Vec<u8>> {
//!   let mut engine = Engine::new();
//!   let opts = ConnectOptions {
//!     deadline: Deadline::Bounded(Duration::from_secs(2)),
//!     ..Default::default()
//!   };
//!   let conn = engine.connect("127.0.0.1", "7", &opts)?;
//!   engine.send(conn, b"ping\n")?;
//!
//!   let line = engine.recv(
//!     conn,
//!     &RecvOptions {
//!       deadline: Deadline::from_millis(Some(500)),
//!       framing: Framing::Line { max: None },
//!     },
//!   );
//!   engine.close(conn)?;
//!   line
//! }
//! ```
//!
//! *Note:* handles are plain descriptor numbers. Nothing is closed
//! automatically; close what you open.

#[macro_use]
mod macros;

pub mod buf;
pub mod connect;
pub mod deadline;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod handle;
pub mod listen;
pub mod net_utils;
pub mod readiness;
pub mod recv;
pub mod resolve;
pub mod send;
mod socket;

#[doc(hidden)]
pub mod test_utils;

pub use connect::ConnectOptions;
pub use deadline::{Deadline, Expiry};
pub use dispatch::{Dispatcher, Slots, VarTable};
pub use engine::{Accepted, Engine};
pub use error::{Error, Result, Status, Verb};
pub use handle::{Handle, HandleKind};
pub use listen::{DEFAULT_BACKLOG, ListenOptions};
pub use net_utils::Peer;
pub use recv::{Framing, RecvOptions};
pub use resolve::Family;
