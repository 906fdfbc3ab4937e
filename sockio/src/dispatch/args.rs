//! The argument surface of the `socket` verbs.

use std::ffi::OsString;
use std::os::unix::ffi::OsStrExt;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::error::{Error, Result, Verb};
use crate::handle::Handle;
use crate::recv::Framing;
use crate::resolve::Family;

/// One `socket` invocation, program name included.
#[derive(Debug, Parser)]
#[command(
  name = "socket",
  about = "TCP primitives for scripts",
  disable_help_subcommand = true,
  disable_version_flag = true
)]
pub struct Invocation {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Open a connection and store its handle in VARFD
  Connect(ConnectArgs),
  /// Write DATA (words joined by single spaces) to a connection
  Send(SendArgs),
  /// Read from a connection into VAR
  Recv(RecvArgs),
  /// Close a connection or listener
  Close(CloseArgs),
  /// Listen on PORT and store the listener handle in VARFD
  Listen(ListenArgs),
  /// Take one connection from a listener
  Accept(AcceptArgs),
}

impl Command {
  pub fn verb(&self) -> Verb {
    match self {
      Command::Connect(_) => Verb::Connect,
      Command::Send(_) => Verb::Send,
      Command::Recv(_) => Verb::Recv,
      Command::Close(_) => Verb::Close,
      Command::Listen(_) => Verb::Listen,
      Command::Accept(_) => Verb::Accept,
    }
  }
}

#[derive(Debug, Args)]
pub struct ConnectArgs {
  /// IPv4 only
  #[arg(short = '4', overrides_with = "v6")]
  pub v4: bool,
  /// IPv6 only
  #[arg(short = '6', overrides_with = "v4")]
  pub v6: bool,
  /// Return while the connection is still being established
  #[arg(short = 'n')]
  pub nonblocking: bool,
  /// Connection deadline in milliseconds
  #[arg(short = 'T', value_name = "MS")]
  pub timeout: Option<u64>,
  pub host: String,
  /// Numeric port or service name
  pub port: String,
  pub varfd: String,
}

impl ConnectArgs {
  pub fn family(&self) -> Family {
    match (self.v4, self.v6) {
      (true, _) => Family::V4,
      (_, true) => Family::V6,
      _ => Family::Unspecified,
    }
  }
}

#[derive(Debug, Args)]
pub struct SendArgs {
  pub fd: Handle,
  #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
  pub data: Vec<OsString>,
}

impl SendArgs {
  /// The payload: every word's bytes, separated by single spaces.
  pub fn payload(&self) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, word) in self.data.iter().enumerate() {
      if i > 0 {
        out.push(b' ');
      }
      out.extend_from_slice(word.as_bytes());
    }
    out
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
  /// Up to and including the first newline
  #[default]
  Line,
  /// Exactly --max bytes
  Bytes,
  /// Until the peer closes
  All,
}

#[derive(Debug, Args)]
pub struct RecvArgs {
  /// Deadline in milliseconds
  #[arg(short = 'T', value_name = "MS")]
  pub timeout: Option<u64>,
  /// Byte cap; 0 means none. Required for bytes mode
  #[arg(short, long, value_name = "N")]
  pub max: Option<usize>,
  #[arg(long, value_enum, default_value_t = Mode::Line)]
  pub mode: Mode,
  pub fd: Handle,
  pub var: String,
}

impl RecvArgs {
  pub fn framing(&self) -> Result<Framing> {
    let max = self.max.filter(|n| *n > 0);
    match self.mode {
      Mode::Line => Ok(Framing::Line { max }),
      Mode::All => Ok(Framing::All { max }),
      Mode::Bytes => max.map(|count| Framing::Bytes { count }).ok_or_else(|| {
        Error::Usage("recv: --mode bytes requires a non-zero --max".into())
      }),
    }
  }
}

#[derive(Debug, Args)]
pub struct CloseArgs {
  pub fd: Handle,
}

#[derive(Debug, Args)]
pub struct ListenArgs {
  /// Pending-connection queue length
  #[arg(
    short = 'b',
    value_name = "BACKLOG",
    value_parser = clap::value_parser!(i32).range(0..)
  )]
  pub backlog: Option<i32>,
  /// Local address; all interfaces when omitted
  #[arg(short = 'a', value_name = "ADDR")]
  pub addr: Option<String>,
  /// Non-zero port
  #[arg(short = 'p', value_name = "PORT")]
  pub port: Option<u16>,
  pub varfd: String,
}

#[derive(Debug, Args)]
pub struct AcceptArgs {
  /// Deadline in milliseconds
  #[arg(short = 'T', value_name = "MS")]
  pub timeout: Option<u64>,
  pub listenfd: Handle,
  pub varfd: String,
  /// Receives the peer as host:port
  pub varpeer: Option<String>,
}
