//! Documentation: https://www.romhacking.net/documents/746/

use super::varint::ReadVarint;
use super::{Error, Step};
use crate::crc;
use crate::io::prelude::*;
use crate::io::Stream;
use std::io;

pub const MAGIC: &[u8; 4] = b"BPS1";

/// Streaming BPS decoder.
///
/// The source is held in memory because SourceCopy is random-access, and the
/// target is built in a RAM buffer because TargetCopy reads back bytes
/// written moments earlier. The buffer is written to the output file once
/// the action stream is exhausted.
pub struct Decoder<P, O> {
  patch: Stream<P>,
  source: Vec<u8>,
  target: Vec<u8>,
  target_size: u64,
  source_cursor: u64,
  target_cursor: u64,
  output: O,
}

enum Action {
  SourceRead { length: u64 },
  TargetRead { length: u64 },
  SourceCopy { length: u64, offset: i64 },
  TargetCopy { length: u64, offset: i64 },
}

impl<P, O> Decoder<P, O>
where
  P: Read + Seek,
  O: Write,
{
  /// Checks the marker, parses the header and slurps the source.
  ///
  /// The patch checksum accumulates from the first byte of the file, so it
  /// covers the marker, header and metadata as well as the action stream.
  pub fn start(source: &mut impl Read, mut patch: Stream<P>, output: O) -> Result<Self, Error> {
    patch.seek_to(0)?;
    if &patch.read_array::<4>()? != MAGIC {
      return Err(Error::UnknownFormat);
    }
    let _source_size = patch.read_varint()?;
    let target_size = patch.read_varint()?;
    let metadata_length = patch.read_varint()?;
    // The metadata is opaque to patching but still part of the patch CRC.
    patch.copy_exactly(metadata_length, &mut io::sink())?;

    let mut source_bytes = Vec::new();
    source.read_to_end(&mut source_bytes)?;
    let capacity = usize::try_from(target_size).map_err(|_| Error::BadPatch)?;
    Ok(Self {
      patch,
      source: source_bytes,
      target: Vec::with_capacity(capacity),
      target_size,
      source_cursor: 0,
      target_cursor: 0,
      output,
    })
  }

  /// Applies one action. The output position is `target.len()`.
  pub fn next(&mut self) -> Result<Step, Error> {
    if self.target.len() as u64 >= self.target_size {
      return Ok(Step::Done);
    }
    match self.decode_action()? {
      Action::SourceRead { length } => {
        // The implicit source position is the current output position.
        let bytes = slice(&self.source, self.target.len() as u64, length)?;
        self.target.extend_from_slice(bytes);
      }
      Action::TargetRead { length } => {
        self.patch.copy_exactly(length, &mut self.target)?;
      }
      Action::SourceCopy { length, offset } => {
        self.source_cursor = adjust(self.source_cursor, offset)?;
        let bytes = slice(&self.source, self.source_cursor, length)?;
        self.target.extend_from_slice(bytes);
        self.source_cursor += length;
      }
      Action::TargetCopy { length, offset } => {
        self.target_cursor = adjust(self.target_cursor, offset)?;
        // The run may overlap the bytes it is writing, so copy one byte at
        // a time; a length longer than the cursor gap replicates the tail.
        let mut cursor = usize::try_from(self.target_cursor).map_err(|_| Error::BadPatch)?;
        for _ in 0..length {
          let byte = *self.target.get(cursor).ok_or(Error::BadPatch)?;
          self.target.push(byte);
          cursor += 1;
        }
        self.target_cursor += length;
      }
    }
    Ok(Step::Next)
  }

  fn decode_action(&mut self) -> Result<Action, Error> {
    let encoded = self.patch.read_varint()?;
    let length = (encoded >> 2) + 1;
    Ok(match encoded & 3 {
      0 => Action::SourceRead { length },
      1 => Action::TargetRead { length },
      2 => Action::SourceCopy { length, offset: self.patch.read_signed_varint()? },
      _ => Action::TargetCopy { length, offset: self.patch.read_signed_varint()? },
    })
  }

  /// Writes the produced bytes out, then verifies the trailer.
  ///
  /// The output is written before any verification, so a failed check still
  /// leaves the best-effort bytes on disk.
  pub fn finish(mut self) -> Result<(), Error> {
    self.output.write_all(&self.target)?;
    self.output.flush()?;

    let expected_source_crc = crc::Crc32::new(self.patch.read_u32::<LE>()?);
    let expected_target_crc = crc::Crc32::new(self.patch.read_u32::<LE>()?);
    // Snapshot before the trailing four bytes: the patch checksum covers
    // everything up to and including the other two.
    let patch_crc = self.patch.crc_snapshot();
    let expected_patch_crc = crc::Crc32::new(self.patch.read_u32::<LE>()?);
    log::debug!(
      "consumed {} of {} patch bytes",
      self.patch.position(),
      self.patch.len()
    );

    if self.target.len() as u64 != self.target_size {
      return Err(Error::InvalidOutputSize);
    }
    let source_crc = crc::hash(&self.source);
    if source_crc != expected_source_crc {
      log::warn!("source checksum {source_crc} does not match expected {expected_source_crc}");
      return Err(Error::InvalidOutputChecksum);
    }
    let target_crc = crc::hash(&self.target);
    if target_crc != expected_target_crc {
      log::warn!("target checksum {target_crc} does not match expected {expected_target_crc}");
      return Err(Error::InvalidOutputChecksum);
    }
    if patch_crc != expected_patch_crc {
      log::warn!("patch checksum {patch_crc} does not match expected {expected_patch_crc}");
      return Err(Error::InvalidOutputChecksum);
    }
    Ok(())
  }
}

fn slice(bytes: &[u8], start: u64, length: u64) -> Result<&[u8], Error> {
  usize::try_from(start)
    .ok()
    .zip(usize::try_from(length).ok())
    .and_then(|(start, length)| bytes.get(start..start.checked_add(length)?))
    .ok_or(Error::BadPatch)
}

fn adjust(cursor: u64, offset: i64) -> Result<u64, Error> {
  cursor.checked_add_signed(offset).ok_or(Error::BadPatch)
}
