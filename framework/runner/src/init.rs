use clap::Parser;

use crate::cli::SweepCli;

/// Initialise logging and parse the command line.
///
/// Logging defaults to `info` and can be changed with `RUST_LOG`.
pub fn init() -> SweepCli {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    SweepCli::parse()
}
