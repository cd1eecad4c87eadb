use std::path;

#[derive(Clone, Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// The ROM file to patch.
  #[arg(short, long)]
  pub input: path::PathBuf,
  /// The IPS or BPS patch to apply.
  #[arg(short, long)]
  pub patch: path::PathBuf,
  /// Where to write the patched ROM.
  #[arg(short, long)]
  pub output: path::PathBuf,
}
