//! Verb dispatch for script hosts.
//!
//! A host hands [`Dispatcher::run`] the words of one `socket ...` command. The
//! words are parsed once into a typed [`Command`] and executed against the
//! [`Engine`]. Results land in the host's [`Slots`], diagnostics go to the
//! error writer, and the host gets a [`Status`] back.
//!
//! ```text
//! socket connect [-4|-6] [-n] [-T ms] <host> <port> <varfd>
//! socket send    <fd> [--] <data...>
//! socket recv    [-T ms] [--max N] [--mode line|bytes|all] <fd> <var>
//! socket close   <fd>
//! socket listen  [-b backlog] [-a addr] -p port <varfd>
//! socket accept  [-T ms] <listenfd> <varfd> [<varpeer>]
//! ```

mod args;
mod slots;

use std::ffi::OsString;
use std::io::Write;

use clap::{CommandFactory, Parser};

pub use args::{
  AcceptArgs, CloseArgs, Command, ConnectArgs, Invocation, ListenArgs, Mode,
  RecvArgs, SendArgs,
};
pub use slots::{Slots, VarTable, truncate_at_nul};

use crate::connect::ConnectOptions;
use crate::deadline::Deadline;
use crate::engine::Engine;
use crate::error::{Error, Result, Status, Verb};
use crate::listen::ListenOptions;
use crate::recv::RecvOptions;

#[derive(Debug, Default)]
pub struct Dispatcher<S> {
  engine: Engine,
  slots: S,
}

impl<S: Slots> Dispatcher<S> {
  pub fn new(slots: S) -> Self {
    Self { engine: Engine::new(), slots }
  }

  pub fn engine(&mut self) -> &mut Engine {
    &mut self.engine
  }

  pub fn slots(&self) -> &S {
    &self.slots
  }

  pub fn slots_mut(&mut self) -> &mut S {
    &mut self.slots
  }

  pub fn into_slots(self) -> S {
    self.slots
  }

  /// Runs one invocation. `args` starts with the program name (`socket`).
  ///
  /// Parse errors, including requests for help, are [`Status::Usage`] with
  /// clap's rendering on `err`. Timeouts are silent.
  pub fn run<I, T>(&mut self, args: I, err: &mut dyn Write) -> Status
  where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
  {
    let invocation = match Invocation::try_parse_from(args) {
      Ok(invocation) => invocation,
      Err(parse_err) => {
        tracing::debug!(kind = ?parse_err.kind(), "rejected invocation");
        let _ = write!(err, "{}", parse_err.render());
        return Status::Usage;
      }
    };

    let verb = invocation.command.verb();
    match self.execute(invocation.command) {
      Ok(()) => Status::Ok,
      Err(e) => {
        report(verb, &e, err);
        e.status()
      }
    }
  }

  /// Executes an already parsed command.
  pub fn execute(&mut self, command: Command) -> Result<()> {
    match command {
      Command::Connect(args) => {
        let opts = ConnectOptions {
          family: args.family(),
          nonblocking: args.nonblocking,
          deadline: Deadline::from_millis(args.timeout),
        };
        let handle = self.engine.connect(&args.host, &args.port, &opts)?;
        self.store(&args.varfd, handle.to_string().as_bytes());
      }
      Command::Send(args) => {
        self.engine.send(args.fd, &args.payload())?;
      }
      Command::Recv(args) => {
        let opts = RecvOptions {
          deadline: Deadline::from_millis(args.timeout),
          framing: args.framing()?,
        };
        match self.engine.recv(args.fd, &opts) {
          Ok(data) => self.store(&args.var, &data),
          Err(e) if e.is_timeout() => {
            self.store(&args.var, b"");
            return Err(e);
          }
          Err(e) => return Err(e),
        }
      }
      Command::Close(args) => {
        self.engine.close(args.fd)?;
      }
      Command::Listen(args) => {
        let port = args.port.filter(|p| *p != 0).ok_or_else(|| {
          Error::Usage("listen: -p with a non-zero port is required".into())
        })?;
        let opts =
          ListenOptions { addr: args.addr, port, backlog: args.backlog };
        let handle = self.engine.listen(&opts)?;
        self.store(&args.varfd, handle.to_string().as_bytes());
      }
      Command::Accept(args) => {
        let deadline = Deadline::from_millis(args.timeout);
        let accepted = self.engine.accept(args.listenfd, deadline)?;
        self.store(&args.varfd, accepted.handle.to_string().as_bytes());
        if let Some(name) = &args.varpeer {
          self.store(name, accepted.peer.to_string().as_bytes());
        }
      }
    }
    Ok(())
  }

  fn store(&mut self, name: &str, value: &[u8]) {
    let kept = truncate_at_nul(value);
    if kept.len() < value.len() {
      let dropped = value.len() - kept.len();
      tracing::debug!(name, dropped, "slot value truncated at NUL");
    }
    self.slots.set(name, kept);
  }
}

fn report(verb: Verb, e: &Error, err: &mut dyn Write) {
  match e {
    Error::TimedOut { .. } => {}
    Error::Usage(_) => {
      let _ = writeln!(err, "socket: {e}");
      let mut cmd = Invocation::command();
      if let Some(sub) = cmd.find_subcommand_mut(verb.as_str()) {
        let _ = writeln!(err, "{}", sub.render_usage());
      }
    }
    _ => {
      let _ = writeln!(err, "socket: {e}");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::recv::Framing;
  use crate::resolve::Family;

  fn parse(line: &str) -> std::result::Result<Command, clap::Error> {
    Invocation::try_parse_from(line.split_whitespace()).map(|i| i.command)
  }

  fn run_line(line: &str) -> (Status, String) {
    let mut dispatcher = Dispatcher::new(VarTable::new());
    let mut err = Vec::new();
    let status = dispatcher.run(line.split_whitespace(), &mut err);
    (status, String::from_utf8_lossy(&err).into_owned())
  }

  #[test]
  fn connect_flags() {
    let Ok(Command::Connect(args)) =
      parse("socket connect -4 -6 -n -T 250 example.org http fd")
    else {
      panic!("expected connect");
    };
    assert_eq!(args.family(), Family::V6);
    assert!(args.nonblocking);
    assert_eq!(args.timeout, Some(250));
    assert_eq!(args.host, "example.org");
    assert_eq!(args.port, "http");
    assert_eq!(args.varfd, "fd");
  }

  #[test]
  fn send_joins_words_after_double_dash() {
    let Ok(Command::Send(args)) = parse("socket send 5 -- -n  hello world")
    else {
      panic!("expected send");
    };
    assert_eq!(args.fd.to_string(), "5");
    assert_eq!(args.payload(), b"-n hello world");
  }

  #[test]
  fn recv_framing_from_flags() {
    let Ok(Command::Recv(args)) = parse("socket recv --mode all -m 0 3 out")
    else {
      panic!("expected recv");
    };
    assert_eq!(args.framing().unwrap(), Framing::All { max: None });

    let Ok(Command::Recv(args)) =
      parse("socket recv --mode bytes --max 8 3 out")
    else {
      panic!("expected recv");
    };
    assert_eq!(args.framing().unwrap(), Framing::Bytes { count: 8 });

    let Ok(Command::Recv(args)) = parse("socket recv 3 out") else {
      panic!("expected recv");
    };
    assert_eq!(args.framing().unwrap(), Framing::Line { max: None });
  }

  #[test]
  fn malformed_invocations_are_usage() {
    for line in [
      "socket",
      "socket frobnicate",
      "socket connect host",
      "socket connect -T soon host 80 fd",
      "socket send 3",
      "socket recv --mode words 3 out",
      "socket recv -T -5 3 out",
      "socket close",
      "socket close -1",
      "socket close 3 4",
      "socket close abc",
      "socket accept 3",
      "socket accept 3 fd peer extra",
      "socket listen -p 70000 fd",
      "socket --help",
    ] {
      let (status, err) = run_line(line);
      assert_eq!(status, Status::Usage, "{line}");
      assert!(!err.is_empty(), "{line}");
    }
  }

  #[test]
  fn semantic_usage_errors_do_no_io() {
    let (status, err) = run_line("socket recv --mode bytes 3 out");
    assert_eq!(status, Status::Usage);
    assert!(err.contains("--max"));

    let (status, _) = run_line("socket listen -p 0 fd");
    assert_eq!(status, Status::Usage);
    let (status, _) = run_line("socket listen fd");
    assert_eq!(status, Status::Usage);
  }
}
