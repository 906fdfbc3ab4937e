use std::net::{SocketAddr, TcpListener};
use std::time::{Duration, Instant};

use socket2::{Domain, Socket, Type};
use sockio::test_utils::{LOOPBACK, free_port};
use sockio::{ConnectOptions, Deadline, Engine, Error, Family, Status};

#[test]
fn test_connect_immediate_to_dead_port() {
  let mut engine = Engine::new();
  let port = free_port().to_string();
  let opts =
    ConnectOptions { deadline: Deadline::Immediate, ..Default::default() };

  let start = Instant::now();
  let err = engine.connect(LOOPBACK, &port, &opts).unwrap_err();

  assert!(matches!(err.status(), Status::Failure | Status::Timeout), "{err}");
  assert!(start.elapsed() < Duration::from_secs(1));
  assert_eq!(engine.open_handles(), 0);
}

#[test]
fn test_connect_bounded_success() {
  let listener = TcpListener::bind((LOOPBACK, 0)).unwrap();
  let port = listener.local_addr().unwrap().port().to_string();

  let mut engine = Engine::new();
  let opts = ConnectOptions {
    family: Family::V4,
    deadline: Deadline::from_millis(Some(2000)),
    ..Default::default()
  };
  let handle = engine.connect(LOOPBACK, &port, &opts).unwrap();

  let (_server, peer) = listener.accept().unwrap();
  assert_eq!(peer.ip().to_string(), LOOPBACK);

  engine.close(handle).unwrap();
}

#[test]
fn test_connect_refused_is_failure() {
  let mut engine = Engine::new();
  let port = free_port().to_string();

  let err = engine.connect(LOOPBACK, &port, &ConnectOptions::default());
  let err = err.unwrap_err();

  assert!(matches!(err, Error::Io { .. }));
  assert_eq!(err.status(), Status::Failure);
  assert!(err.to_string().starts_with("connect: "));
}

#[test]
fn test_connect_wrong_family_is_resolve_failure() {
  let mut engine = Engine::new();
  let opts = ConnectOptions { family: Family::V6, ..Default::default() };

  let err = engine.connect(LOOPBACK, "80", &opts).unwrap_err();
  assert!(matches!(err, Error::Resolve { .. }));
  assert_eq!(err.status(), Status::Failure);
}

#[test]
fn test_connect_nonblocking_returns_handle() {
  let listener = TcpListener::bind((LOOPBACK, 0)).unwrap();
  let port = listener.local_addr().unwrap().port().to_string();

  let mut engine = Engine::new();
  let opts = ConnectOptions { nonblocking: true, ..Default::default() };
  let handle = engine.connect(LOOPBACK, &port, &opts).unwrap();

  listener.accept().unwrap();
  engine.close(handle).unwrap();
}

#[test]
fn test_connect_times_out_when_backlog_is_full() {
  // A listener that never accepts; once its queue is full new SYNs are
  // dropped and the handshake stalls.
  let listener = Socket::new(Domain::IPV4, Type::STREAM, None).unwrap();
  let addr: SocketAddr = format!("{LOOPBACK}:0").parse().unwrap();
  listener.bind(&addr.into()).unwrap();
  listener.listen(0).unwrap();
  let port = listener.local_addr().unwrap().as_socket().unwrap().port();

  let mut engine = Engine::new();
  let opts = ConnectOptions {
    deadline: Deadline::from_millis(Some(100)),
    ..Default::default()
  };

  let mut queued = Vec::new();
  let (err, elapsed) = loop {
    assert!(queued.len() < 64, "backlog never filled");
    let start = Instant::now();
    match engine.connect(LOOPBACK, &port.to_string(), &opts) {
      Ok(handle) => queued.push(handle),
      Err(err) => break (err, start.elapsed()),
    }
  };

  assert!(matches!(err, Error::TimedOut { .. }), "{err}");
  assert_eq!(err.status(), Status::Timeout);
  assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
  assert_eq!(engine.open_handles(), queued.len());

  for handle in queued {
    engine.close(handle).unwrap();
  }
  assert_eq!(engine.open_handles(), 0);
}

#[test]
fn test_connect_localhost_reaches_v4_only_listener() {
  // Resolvers commonly list ::1 first; nothing listens there, so the
  // connection must come from a later candidate.
  let listener = TcpListener::bind((LOOPBACK, 0)).unwrap();
  let port = listener.local_addr().unwrap().port().to_string();

  let mut engine = Engine::new();
  let opts = ConnectOptions {
    deadline: Deadline::from_millis(Some(2000)),
    ..Default::default()
  };
  let handle = engine.connect("localhost", &port, &opts).unwrap();

  let (_server, peer) = listener.accept().unwrap();
  assert!(peer.ip().is_loopback());
  assert_eq!(engine.open_handles(), 1);

  engine.close(handle).unwrap();
}
