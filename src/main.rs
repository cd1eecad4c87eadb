use clap::Parser;

mod apply;
mod cli;
mod crc;
mod io;
mod log;
mod mem;
mod patch;
mod progress;

fn main() -> miette::Result<()> {
  log::init();
  let args = cli::Args::parse();
  Ok(apply::call(args)?)
}
