use std::collections::HashMap;

/// Named result cells the dispatcher writes into.
pub trait Slots {
  fn set(&mut self, name: &str, value: &[u8]);
}

impl<S: Slots + ?Sized> Slots for &mut S {
  fn set(&mut self, name: &str, value: &[u8]) {
    (**self).set(name, value)
  }
}

/// Cuts `bytes` at the first NUL. Slot values are C-string-like and cannot
/// hold one.
pub fn truncate_at_nul(bytes: &[u8]) -> &[u8] {
  match bytes.iter().position(|b| *b == 0) {
    Some(end) => &bytes[..end],
    None => bytes,
  }
}

/// In-memory [`Slots`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VarTable {
  vars: HashMap<String, Vec<u8>>,
}

impl VarTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, name: &str) -> Option<&[u8]> {
    self.vars.get(name).map(Vec::as_slice)
  }

  /// The value as text, with invalid UTF-8 replaced.
  pub fn get_lossy(&self, name: &str) -> Option<String> {
    self.get(name).map(|v| String::from_utf8_lossy(v).into_owned())
  }

  pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
    self.vars.remove(name)
  }

  pub fn len(&self) -> usize {
    self.vars.len()
  }

  pub fn is_empty(&self) -> bool {
    self.vars.is_empty()
  }
}

impl Slots for VarTable {
  fn set(&mut self, name: &str, value: &[u8]) {
    self.vars.insert(name.to_owned(), value.to_vec());
  }
}
