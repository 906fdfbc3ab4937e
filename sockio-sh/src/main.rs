mod host;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use host::{Flow, Host};

#[derive(Parser)]
#[command(name = "sockio-sh")]
#[command(about = "Run a script of socket verbs", long_about = None)]
struct Cli {
  /// Script to run; read from stdin when omitted
  script: Option<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn")),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let input: Box<dyn BufRead> = match &cli.script {
    Some(path) => Box::new(BufReader::new(
      File::open(path)
        .with_context(|| format!("opening script {}", path.display()))?,
    )),
    None => Box::new(io::stdin().lock()),
  };

  let mut host = Host::new(io::stdout().lock(), io::stderr());

  for (lineno, line) in input.split(b'\n').enumerate() {
    let line = line.context("reading script")?;
    tracing::trace!(lineno = lineno + 1, "line");
    if let Flow::Exit(code) = host.run_line(&line)? {
      return Ok(ExitCode::from(code));
    }
  }

  Ok(ExitCode::from(host.last_status()))
}
