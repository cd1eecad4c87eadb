use std::fmt;

/// A finalized CRC32 checksum.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct Crc32(u32);

impl Crc32 {
  pub fn new(value: u32) -> Self {
    Self(value)
  }

  pub fn value(&self) -> u32 {
    self.0
  }
}

impl fmt::Display for Crc32 {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:08x}", self.0)
  }
}

/// An incremental CRC32 accumulator over the reflected IEEE polynomial.
#[derive(Clone, Debug, Default)]
pub struct CRC32Hasher(crc32fast::Hasher);

impl CRC32Hasher {
  pub fn new() -> Self {
    Self(crc32fast::Hasher::new())
  }

  pub fn update(&mut self, bytes: &[u8]) {
    self.0.update(bytes);
  }

  /// Finalizes a copy of the accumulator, leaving this one undisturbed.
  pub fn snapshot(&self) -> Crc32 {
    self.clone().finish()
  }

  pub fn finish(self) -> Crc32 {
    Crc32(self.0.finalize())
  }
}

/// Hashes a byte slice in one shot.
pub fn hash(bytes: &[u8]) -> Crc32 {
  Crc32(crc32fast::hash(bytes))
}
