fn main() {
  cfg_aliases::cfg_aliases! {
      has_accept4: { any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "illumos",
        target_os = "linux",
        target_os = "hurd",
        target_os = "netbsd",
        target_os = "openbsd"
      ) },
      has_nosigpipe: { any(
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "dragonfly",
        target_vendor = "apple"
      ) },
      has_msg_nosignal: { any(
        target_os = "android",
        target_os = "linux",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly",
        target_os = "illumos"
      ) },
  }
}
