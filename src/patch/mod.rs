use crate::io::prelude::*;
use crate::io::{ReadError, Stream};
use crate::progress::{IterStatus, Progress, ProgressChannel};
use fs_err as fs;
use miette::Diagnostic;
use std::path::PathBuf;
use std::{fmt, io};

pub mod bps;
pub mod ips;
mod varint;

/// One patch application: where to read the ROM and patch, where to write
/// the result. Owned by the worker for the duration of the apply.
#[derive(Clone, Debug)]
pub struct PatchCommand {
  pub source: PathBuf,
  pub patch: PathBuf,
  pub output: PathBuf,
}

impl PatchCommand {
  pub fn new(source: PathBuf, patch: PathBuf, output: PathBuf) -> Self {
    Self { source, patch, output }
  }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Kind {
  Ips,
  Bps,
}

impl fmt::Display for Kind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Kind::Ips => write!(f, "IPS"),
      Kind::Bps => write!(f, "BPS"),
    }
  }
}

/// The decoder's report after applying one hunk or action.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
  Next,
  Done,
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
  #[error(transparent)]
  Read(ReadError),
  #[error("The patch is in an unknown format.")]
  UnknownFormat,
  #[error("The patch file is corrupt.")]
  BadPatch,
  #[error("The {0} decoder failed to start.")]
  FailedToStart(Kind, #[source] Box<Error>),
  #[error("The produced file's size does not match the patch header.")]
  InvalidOutputSize,
  #[error("The produced file's checksums do not match the patch trailer.")]
  InvalidOutputChecksum,
}

impl Error {
  /// The coarse kind surfaced on the progress channel.
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::Read(_) | Error::BadPatch => ErrorKind::Io,
      Error::UnknownFormat => ErrorKind::UnknownFormat,
      Error::FailedToStart(..) => ErrorKind::FailedToStart,
      Error::InvalidOutputSize => ErrorKind::InvalidOutputSize,
      Error::InvalidOutputChecksum => ErrorKind::InvalidOutputChecksum,
    }
  }
}

impl From<ReadError> for Error {
  fn from(err: ReadError) -> Error {
    Error::Read(err)
  }
}

impl From<io::Error> for Error {
  fn from(err: io::Error) -> Error {
    Error::Read(ReadError::from(err))
  }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  Io,
  UnknownFormat,
  FailedToStart,
  InvalidOutputSize,
  InvalidOutputChecksum,
}

/// Per-format decoder state, dispatched on the detected kind.
pub enum Context<P, O> {
  Ips(ips::Decoder<P, O>),
  Bps(bps::Decoder<P, O>),
}

impl<P, O> Context<P, O>
where
  P: Read + Seek,
  O: Write + Seek,
{
  pub fn start(
    kind: Kind,
    source: &mut impl Read,
    patch: Stream<P>,
    output: O,
  ) -> Result<Self, Error> {
    match kind {
      Kind::Ips => ips::Decoder::start(source, patch, output).map(Context::Ips),
      Kind::Bps => bps::Decoder::start(source, patch, output).map(Context::Bps),
    }
  }

  pub fn next(&mut self) -> Result<Step, Error> {
    match self {
      Context::Ips(decoder) => decoder.next(),
      Context::Bps(decoder) => decoder.next(),
    }
  }

  /// Final flushes and checks; BPS verifies its trailer checksums here.
  pub fn finish(self) -> Result<(), Error> {
    match self {
      Context::Ips(decoder) => decoder.finish(),
      Context::Bps(decoder) => decoder.finish(),
    }
  }
}

/// Sniffs the patch format from the file's first bytes.
///
/// Each attempt reads from position 0, and the stream is rewound before
/// returning so the chosen decoder re-reads its own marker.
pub fn detect_kind(patch: &mut (impl Read + Seek)) -> Result<Kind, Error> {
  let kind = if read_marker::<5>(patch)?.as_ref() == Some(ips::MAGIC) {
    Some(Kind::Ips)
  } else if read_marker::<4>(patch)?.as_ref() == Some(bps::MAGIC) {
    Some(Kind::Bps)
  } else {
    None
  };
  patch.seek(io::SeekFrom::Start(0))?;
  kind.ok_or(Error::UnknownFormat)
}

fn read_marker<const N: usize>(patch: &mut (impl Read + Seek)) -> Result<Option<[u8; N]>, Error> {
  patch.seek(io::SeekFrom::Start(0))?;
  match patch.read_array::<N>() {
    Ok(marker) => Ok(Some(marker)),
    Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
    Err(err) => Err(Error::from(err)),
  }
}

/// Applies one patch command, publishing progress after every hunk and a
/// terminal snapshot on every exit path.
pub fn apply(command: &PatchCommand, progress: &ProgressChannel) -> Result<(), Error> {
  let mut local = Progress::default();
  let result = run(command, progress, &mut local);
  local.is_done = true;
  match &result {
    Ok(()) => local.status = IterStatus::Done,
    Err(err) => {
      local.status = IterStatus::Failed;
      local.error = Some(err.kind());
    }
  }
  progress.publish(local);
  result
}

fn run(
  command: &PatchCommand,
  progress: &ProgressChannel,
  local: &mut Progress,
) -> Result<(), Error> {
  let mut source = fs::File::open(&command.source)?;
  let mut patch_file = fs::File::open(&command.patch)?;
  let output = fs::File::create(&command.output)?;

  let kind = detect_kind(&mut patch_file)?;
  let patch = Stream::new(patch_file)?;
  log::debug!("detected a {kind} patch ({} bytes)", patch.len());
  let mut context = Context::start(kind, &mut source, patch, output)
    .map_err(|err| Error::FailedToStart(kind, Box::new(err)))?;

  loop {
    match context.next()? {
      Step::Done => break,
      Step::Next => {
        local.hunk_count += 1;
        local.status = IterStatus::Advanced;
        progress.publish(*local);
      }
    }
  }
  context.finish()
}

#[cfg(test)]
pub(crate) fn create_temp(bytes: &[u8]) -> PathBuf {
  use std::sync::atomic::{AtomicU64, Ordering};
  static NEXT_ID: AtomicU64 = AtomicU64::new(0);
  let dir = std::env::temp_dir().join("rombp-test");
  fs::create_dir_all(&dir).unwrap();
  let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
  let path = dir.join(format!("{}-{id}", std::process::id()));
  fs::write(&path, bytes).unwrap();
  path
}
