use crate::io::prelude::*;
use crate::io::ReadError;

pub trait ReadVarint: Read {
  /// Reads a BPS variable-length integer.
  ///
  /// # Errors
  /// Returns [`ReadError::VarintOverflow`] if the accumulated value does not
  /// fit in 64 bits.
  fn read_varint(&mut self) -> Result<u64, ReadError> {
    let mut data: u64 = 0;
    let mut shift: u64 = 1;
    loop {
      let byte = self.read_u8()?;
      data = u64::from(byte & 0x7F)
        .checked_mul(shift)
        .and_then(|value| value.checked_add(data))
        .ok_or(ReadError::VarintOverflow)?;
      if byte & 0x80 != 0 {
        return Ok(data);
      }
      // The encoder subtracts one from every group after the first; adding
      // the next shift on the way out reverses that.
      shift = shift.checked_mul(128).ok_or(ReadError::VarintOverflow)?;
      data = data.checked_add(shift).ok_or(ReadError::VarintOverflow)?;
    }
  }

  /// Reads a BPS signed offset: bit 0 holds the sign, the rest the
  /// magnitude. 63 bits of magnitude always fit in an i64.
  fn read_signed_varint(&mut self) -> Result<i64, ReadError> {
    let encoded = self.read_varint()?;
    let magnitude = (encoded >> 1) as i64;
    Ok(if encoded & 1 == 1 { -magnitude } else { magnitude })
  }
}

impl<R: Read> ReadVarint for R {}

#[cfg(test)]
pub(crate) mod encode {
  /// Inverse of [`ReadVarint::read_varint`][super::ReadVarint::read_varint],
  /// for assembling patches in tests.
  pub fn unsigned(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
      let byte = (value & 0x7F) as u8;
      value >>= 7;
      if value == 0 {
        out.push(byte | 0x80);
        return out;
      }
      out.push(byte);
      value -= 1;
    }
  }

  pub fn signed(value: i64) -> Vec<u8> {
    unsigned((value.unsigned_abs() << 1) | u64::from(value < 0))
  }
}

#[cfg(test)]
mod tests {
  use super::encode;
  use super::*;
  use quickcheck_macros::quickcheck;
  use std::io::Cursor;

  #[test]
  fn known_vector() {
    let mut reader = Cursor::new(vec![0x0E, 0xB0, 0x80, 0x00]);
    assert_eq!(reader.read_varint().unwrap(), 6286);
    assert_eq!(reader.position(), 2);
  }

  #[test]
  fn single_byte_values() {
    for value in 0..128 {
      let mut reader = Cursor::new(encode::unsigned(value));
      assert_eq!(reader.read_varint().unwrap(), value);
    }
  }

  #[test]
  fn overflow_is_reported() {
    // Enough continuation groups to exceed 64 bits of accumulated value.
    let mut reader = Cursor::new(vec![0x7F; 16]);
    assert!(matches!(
      reader.read_varint(),
      Err(ReadError::VarintOverflow)
    ));
  }

  #[test]
  fn truncated_input() {
    let mut reader = Cursor::new(vec![0x00]);
    assert!(matches!(reader.read_varint(), Err(ReadError::UnexpectedEof)));
  }

  #[quickcheck]
  fn round_trip(value: u64) -> bool {
    let value = value >> 1;
    let mut reader = Cursor::new(encode::unsigned(value));
    reader.read_varint().unwrap() == value
  }

  #[quickcheck]
  fn signed_round_trip(value: i64) -> bool {
    let value = value / 2;
    let mut reader = Cursor::new(encode::signed(value));
    reader.read_signed_varint().unwrap() == value
  }
}
