use std::{
  ffi::CStr,
  fmt, io, mem,
  net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
};

// Large enough for any numeric host, including scoped IPv6.
const NI_MAXHOST: usize = 1025;
const NI_MAXSERV: usize = 32;

/// Reads a `sockaddr` written by the kernel (or by `getaddrinfo`).
///
/// # Safety
///
/// `addr` must point to at least `len` readable bytes holding a socket
/// address as produced by the OS.
pub unsafe fn sockaddr_into_std(
  addr: *const libc::sockaddr,
  len: libc::socklen_t,
) -> io::Result<SocketAddr> {
  if addr.is_null() {
    return Err(io::Error::from_raw_os_error(libc::EINVAL));
  }

  // SAFETY: caller guarantees a readable sockaddr header.
  let family = libc::c_int::from(unsafe { (*addr).sa_family });

  match family {
    libc::AF_INET if len as usize >= mem::size_of::<libc::sockaddr_in>() => {
      // SAFETY: family and length checked, so this is a sockaddr_in.
      let sin = unsafe { *addr.cast::<libc::sockaddr_in>() };
      let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
      let port = u16::from_be(sin.sin_port);
      Ok(SocketAddr::V4(SocketAddrV4::new(ip, port)))
    }
    libc::AF_INET6 if len as usize >= mem::size_of::<libc::sockaddr_in6>() => {
      // SAFETY: family and length checked, so this is a sockaddr_in6.
      let sin6 = unsafe { *addr.cast::<libc::sockaddr_in6>() };
      let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
      let port = u16::from_be(sin6.sin6_port);
      Ok(SocketAddr::V6(SocketAddrV6::new(
        ip,
        port,
        sin6.sin6_flowinfo,
        sin6.sin6_scope_id,
      )))
    }
    _ => Err(io::Error::from_raw_os_error(libc::EAFNOSUPPORT)),
  }
}

/// Message for a `getaddrinfo`/`getnameinfo` return code.
pub fn gai_error_text(code: libc::c_int) -> String {
  if code == libc::EAI_SYSTEM {
    return io::Error::last_os_error().to_string();
  }
  // SAFETY: gai_strerror returns a pointer to a static NUL-terminated string.
  let msg = unsafe { CStr::from_ptr(libc::gai_strerror(code)) };
  msg.to_string_lossy().into_owned()
}

/// Numeric identity of the far end of a connection.
///
/// Rendered as `host:port`, both numeric; IPv6 hosts are not bracketed. A peer
/// whose address could not be formatted renders as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Peer {
  host: String,
  service: String,
}

impl Peer {
  /// Formats a kernel-written address with `getnameinfo`, never doing a
  /// reverse lookup.
  ///
  /// # Safety
  ///
  /// Same contract as [`sockaddr_into_std`].
  pub unsafe fn from_sockaddr(
    addr: *const libc::sockaddr,
    len: libc::socklen_t,
  ) -> io::Result<Self> {
    let mut host = [0 as libc::c_char; NI_MAXHOST];
    let mut service = [0 as libc::c_char; NI_MAXSERV];

    // SAFETY: output buffers are sized as passed; addr is valid per contract.
    let code = unsafe {
      libc::getnameinfo(
        addr,
        len,
        host.as_mut_ptr(),
        host.len() as libc::socklen_t,
        service.as_mut_ptr(),
        service.len() as libc::socklen_t,
        libc::NI_NUMERICHOST | libc::NI_NUMERICSERV,
      )
    };
    if code != 0 {
      return Err(io::Error::other(gai_error_text(code)));
    }

    // SAFETY: getnameinfo NUL-terminates both buffers on success.
    let (host, service) = unsafe {
      (
        CStr::from_ptr(host.as_ptr()).to_string_lossy().into_owned(),
        CStr::from_ptr(service.as_ptr()).to_string_lossy().into_owned(),
      )
    };

    Ok(Self { host, service })
  }

  pub fn host(&self) -> &str {
    &self.host
  }

  pub fn service(&self) -> &str {
    &self.service
  }

  pub fn is_empty(&self) -> bool {
    self.host.is_empty()
  }

  /// The peer as a socket address, when both parts are numeric.
  pub fn socket_addr(&self) -> Option<SocketAddr> {
    let ip: IpAddr = self.host.parse().ok()?;
    let port: u16 = self.service.parse().ok()?;
    Some(SocketAddr::new(ip, port))
  }
}

impl fmt::Display for Peer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_empty() {
      return Ok(());
    }
    write!(f, "{}:{}", self.host, self.service)
  }
}
