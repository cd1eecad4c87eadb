use crate::patch::ErrorKind;
use std::sync::{Arc, Mutex};

/// Where the decoder's iteration currently stands.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum IterStatus {
  #[default]
  Pending,
  Advanced,
  Done,
  Failed,
}

/// A snapshot of the patch worker's state at a hunk boundary.
#[derive(Clone, Copy, Debug, Default)]
pub struct Progress {
  pub hunk_count: u64,
  pub status: IterStatus,
  pub error: Option<ErrorKind>,
  pub is_done: bool,
}

/// The shared progress record, overwritten by the worker and polled by an
/// observer. Publications replace the whole record, so every observation is
/// a consistent hunk-boundary snapshot. Once a snapshot with `is_done` has
/// been published the record never changes again.
#[derive(Clone, Default)]
pub struct ProgressChannel {
  shared: Arc<Mutex<Progress>>,
}

impl ProgressChannel {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn publish(&self, snapshot: Progress) {
    // Locking fails iff the other side panicked while holding the lock.
    *self.shared.lock().unwrap() = snapshot;
  }

  pub fn snapshot(&self) -> Progress {
    *self.shared.lock().unwrap()
  }
}
