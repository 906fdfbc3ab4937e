//! Host/port resolution into ordered candidate endpoints.

use std::ffi::CString;
use std::net::SocketAddr;
use std::{mem, ptr};

use crate::error::{Error, Result, Verb};
use crate::net_utils::{gai_error_text, sockaddr_into_std};

/// Address family preference for resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Family {
  #[default]
  Unspecified,
  V4,
  V6,
}

impl Family {
  fn ai_family(self) -> libc::c_int {
    match self {
      Family::Unspecified => libc::AF_UNSPEC,
      Family::V4 => libc::AF_INET,
      Family::V6 => libc::AF_INET6,
    }
  }
}

/// Owns a list returned by `getaddrinfo`.
struct AddrInfoList(*mut libc::addrinfo);

impl AddrInfoList {
  fn iter(&self) -> impl Iterator<Item = &libc::addrinfo> {
    // SAFETY: every node is valid until freeaddrinfo runs in Drop.
    std::iter::successors(unsafe { self.0.as_ref() }, |ai| unsafe {
      ai.ai_next.as_ref()
    })
  }
}

impl Drop for AddrInfoList {
  fn drop(&mut self) {
    if !self.0.is_null() {
      unsafe { libc::freeaddrinfo(self.0) };
    }
  }
}

/// Resolves `host`/`service` to stream endpoints, in resolver order.
///
/// `passive` requests addresses suitable for binding. Failures are always
/// [`Error::Resolve`]; resolution is never subject to a deadline.
pub fn resolve(
  verb: Verb,
  host: &str,
  service: &str,
  family: Family,
  passive: bool,
) -> Result<Vec<SocketAddr>> {
  let failed = |reason: String| Error::Resolve {
    verb,
    host: host.to_owned(),
    port: service.to_owned(),
    reason,
  };

  let c_host =
    CString::new(host).map_err(|_| failed("host contains a NUL byte".into()))?;
  let c_service = CString::new(service)
    .map_err(|_| failed("port contains a NUL byte".into()))?;

  // SAFETY: addrinfo is plain data; an all-zero hints struct is the
  // documented starting point.
  let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
  hints.ai_family = family.ai_family();
  hints.ai_socktype = libc::SOCK_STREAM;
  if passive {
    hints.ai_flags = libc::AI_PASSIVE;
  }

  let mut res: *mut libc::addrinfo = ptr::null_mut();
  // SAFETY: both strings are NUL-terminated and outlive the call.
  let code = unsafe {
    libc::getaddrinfo(c_host.as_ptr(), c_service.as_ptr(), &hints, &mut res)
  };
  let list = AddrInfoList(res);
  if code != 0 {
    return Err(failed(gai_error_text(code)));
  }

  let candidates: Vec<SocketAddr> = list
    .iter()
    // SAFETY: ai_addr/ai_addrlen come straight from getaddrinfo.
    .filter_map(|ai| {
      unsafe { sockaddr_into_std(ai.ai_addr, ai.ai_addrlen) }.ok()
    })
    .collect();

  tracing::trace!(host, service, ?candidates, "resolved");

  if candidates.is_empty() {
    return Err(failed("no usable addresses".into()));
  }
  Ok(candidates)
}
