use crate::crc::{self, CRC32Hasher};
use crate::mem;
use std::io;
use std::io::prelude::*;
use thiserror::Error;

/// Exports the reader traits used throughout the crate.
pub mod prelude {
  pub use super::ReadArray;
  pub use byteorder::{ReadBytesExt, BE, LE};
  pub use std::io::prelude::*;
}

/// Buffer size for the hot copy paths.
pub const BUFFER_SIZE: usize = 32 * 1024;

#[derive(Debug, Error)]
pub enum ReadError {
  #[error(transparent)]
  Io(io::Error),
  #[error("Unexpected end of file.")]
  UnexpectedEof,
  #[error("Variable-length integer does not fit in 64 bits.")]
  VarintOverflow,
}

impl From<io::Error> for ReadError {
  fn from(err: io::Error) -> ReadError {
    match err.kind() {
      io::ErrorKind::UnexpectedEof => ReadError::UnexpectedEof,
      _ => ReadError::Io(err),
    }
  }
}

pub trait ReadArray: Read {
  fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
    mem::try_init([0u8; N], |arr| self.read_exact(&mut arr[..]))
  }
}

impl<T: Read> ReadArray for T {}

/// A buffered sequential reader over a source, patch or output file.
///
/// Tracks the stream position and total length, and feeds every byte read
/// through a CRC32 accumulator so decoders can snapshot the running checksum
/// mid-stream.
pub struct Stream<R> {
  inner: io::BufReader<R>,
  position: u64,
  len: u64,
  crc: CRC32Hasher,
}

impl<R: Read + Seek> Stream<R> {
  pub fn new(mut inner: R) -> io::Result<Self> {
    let len = inner.seek(io::SeekFrom::End(0))?;
    inner.seek(io::SeekFrom::Start(0))?;
    Ok(Self {
      inner: io::BufReader::with_capacity(BUFFER_SIZE, inner),
      position: 0,
      len,
      crc: CRC32Hasher::new(),
    })
  }

  pub fn position(&self) -> u64 {
    self.position
  }

  pub fn len(&self) -> u64 {
    self.len
  }

  /// Seeks to an absolute position. The CRC accumulator is not rewound; it
  /// reflects exactly the bytes read, in read order.
  pub fn seek_to(&mut self, position: u64) -> io::Result<()> {
    self.inner.seek(io::SeekFrom::Start(position))?;
    self.position = position;
    Ok(())
  }

  /// Finalizes a copy of the running checksum without disturbing it.
  pub fn crc_snapshot(&self) -> crc::Crc32 {
    self.crc.snapshot()
  }

  /// Copies exactly `amount` bytes to `writer` through the internal buffer.
  pub fn copy_exactly(&mut self, mut amount: u64, writer: &mut impl Write) -> Result<(), ReadError> {
    while amount > 0 {
      let chunk = self.inner.fill_buf()?;
      if chunk.is_empty() {
        return Err(ReadError::UnexpectedEof);
      }
      let take = usize::try_from(amount).unwrap_or(usize::MAX).min(chunk.len());
      writer.write_all(&chunk[..take])?;
      self.crc.update(&chunk[..take]);
      self.inner.consume(take);
      self.position += take as u64;
      amount -= take as u64;
    }
    Ok(())
  }
}

impl<R: Read> Read for Stream<R> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    let amount = self.inner.read(buf)?;
    self.crc.update(&buf[..amount]);
    self.position += amount as u64;
    Ok(amount)
  }
}

#[cfg(test)]
mod tests {
  use super::prelude::*;
  use super::*;
  use crate::crc;
  use std::io::Cursor;

  #[test]
  fn fixed_width_reads() {
    let mut stream = Stream::new(Cursor::new(vec![0x12, 0x34, 0x56, 0x78, 0x9A])).unwrap();
    assert_eq!(stream.len(), 5);
    assert_eq!(stream.read_u16::<BE>().unwrap(), 0x1234);
    assert_eq!(stream.read_u24::<BE>().unwrap(), 0x56789A);
    assert_eq!(stream.position(), 5);
  }

  #[test]
  fn little_endian_u32() {
    let mut stream = Stream::new(Cursor::new(vec![0x78, 0x56, 0x34, 0x12])).unwrap();
    assert_eq!(stream.read_u32::<LE>().unwrap(), 0x12345678);
  }

  #[test]
  fn eof_is_distinguished_from_io_errors() {
    let mut stream = Stream::new(Cursor::new(vec![0x00])).unwrap();
    let err = ReadError::from(stream.read_u16::<BE>().unwrap_err());
    assert!(matches!(err, ReadError::UnexpectedEof));
  }

  #[test]
  fn copy_exactly_hashes_and_advances() {
    let mut stream = Stream::new(Cursor::new(b"abcdef".to_vec())).unwrap();
    let mut out = Vec::new();
    stream.copy_exactly(4, &mut out).unwrap();
    assert_eq!(out, b"abcd");
    assert_eq!(stream.position(), 4);
    assert_eq!(stream.crc_snapshot(), crc::hash(b"abcd"));
  }

  #[test]
  fn copy_exactly_past_eof() {
    let mut stream = Stream::new(Cursor::new(b"ab".to_vec())).unwrap();
    let mut out = Vec::new();
    assert!(matches!(
      stream.copy_exactly(3, &mut out),
      Err(ReadError::UnexpectedEof)
    ));
  }

  #[test]
  fn seek_and_reread() {
    let mut stream = Stream::new(Cursor::new(b"PATCH".to_vec())).unwrap();
    assert_eq!(&stream.read_array::<5>().unwrap(), b"PATCH");
    stream.seek_to(0).unwrap();
    assert_eq!(&stream.read_array::<5>().unwrap(), b"PATCH");
    assert_eq!(stream.position(), 5);
  }
}
