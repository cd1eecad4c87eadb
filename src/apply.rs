use crate::cli;
use crate::patch::{self, PatchCommand};
use crate::progress::ProgressChannel;
use std::thread;
use std::time::Duration;

/// How often the observer samples the shared progress record.
const POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Runs the patch worker on its own thread. The worker owns the command and
/// all three file handles; the caller keeps the channel and joins after
/// observing a terminal snapshot.
pub fn spawn(
  command: PatchCommand,
  progress: ProgressChannel,
) -> thread::JoinHandle<Result<(), patch::Error>> {
  thread::spawn(move || patch::apply(&command, &progress))
}

/// The CLI path: spawn the worker, poll until it reports completion, join.
pub fn call(args: cli::Args) -> Result<(), patch::Error> {
  let command = PatchCommand::new(args.input, args.patch, args.output);
  let progress = ProgressChannel::new();
  let worker = spawn(command, progress.clone());

  let last = loop {
    let snapshot = progress.snapshot();
    if snapshot.is_done {
      break snapshot;
    }
    log::trace!("applied {} hunks so far", snapshot.hunk_count);
    thread::sleep(POLL_INTERVAL);
  };

  // The worker publishes its terminal snapshot before returning, so it is
  // ready to join once is_done is observed.
  worker.join().unwrap()?;
  log::info!("ROM patched successfully ({} hunks).", last.hunk_count);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::patch::create_temp;
  use crate::progress::IterStatus;

  #[test]
  fn worker_publishes_a_terminal_snapshot() {
    let command = PatchCommand::new(
      create_temp(&[0; 8]),
      create_temp(b"PATCH\x00\x00\x01\x00\x00\x00\x04\xFFEOF"),
      create_temp(b""),
    );
    let output_path = command.output.clone();
    let progress = ProgressChannel::new();
    let worker = spawn(command, progress.clone());

    let last = loop {
      let snapshot = progress.snapshot();
      if snapshot.is_done {
        break snapshot;
      }
      thread::sleep(Duration::from_millis(1));
    };
    worker.join().unwrap().unwrap();

    assert_eq!(last.status, IterStatus::Done);
    assert_eq!(last.hunk_count, 1);
    assert_eq!(last.error, None);
    let output = fs_err::read(&output_path).unwrap();
    assert_eq!(output, [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00]);
  }
}
