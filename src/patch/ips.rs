//! Documentation: https://zerosoft.zophar.net/ips.php

use super::{Error, Step};
use crate::io::prelude::*;
use crate::io::Stream;
use byteorder::{BigEndian, ByteOrder};
use std::io;
use std::num;

pub const MAGIC: &[u8; 5] = b"PATCH";

const EOF_MARKER: &[u8; 3] = b"EOF";

/// Streaming IPS decoder.
pub struct Decoder<P, O> {
  patch: Stream<P>,
  output: O,
}

impl<P, O> Decoder<P, O>
where
  P: Read + Seek,
  O: Write + Seek,
{
  /// Checks the marker and primes the output with a byte-for-byte copy of
  /// the source.
  pub fn start(source: &mut impl Read, mut patch: Stream<P>, mut output: O) -> Result<Self, Error> {
    patch.seek_to(0)?;
    if &patch.read_array::<5>()? != MAGIC {
      return Err(Error::UnknownFormat);
    }
    io::copy(source, &mut output)?;
    Ok(Self { patch, output })
  }

  /// Applies one hunk. Offsets are absolute positions in the output file;
  /// hunks may overlap, with later writes overlaying earlier ones. Writing
  /// past the current end of the output extends it, zero-filling any gap.
  pub fn next(&mut self) -> Result<Step, Error> {
    let offset = self.patch.read_array::<3>()?;
    if &offset == EOF_MARKER {
      // The first EOF-shaped offset terminates the stream; anything after
      // it is ignored.
      return Ok(Step::Done);
    }
    let offset = BigEndian::read_u24(&offset[..]);
    let length = self.patch.read_u16::<BE>()?;
    self.output.seek(io::SeekFrom::Start(offset.into()))?;
    match num::NonZeroU16::new(length) {
      Some(length) => {
        // The patch contains the bytes to write verbatim.
        self
          .patch
          .copy_exactly(length.get().into(), &mut self.output)?;
      }
      None => {
        // A zero length introduces a one-byte repeating run.
        let run: u64 = self.patch.read_u16::<BE>()?.into();
        let value = self.patch.read_u8()?;
        io::copy(&mut io::repeat(value).take(run), &mut self.output)?;
      }
    }
    Ok(Step::Next)
  }

  pub fn finish(mut self) -> Result<(), Error> {
    self.output.flush()?;
    Ok(())
  }
}
