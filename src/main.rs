use std::process::ExitCode;

use clap::Parser;
use snapforge::{cli, logger};

fn main() -> ExitCode {
    // Overwrites the previous session log
    logger::init();

    let args = cli::CliArgs::parse();
    snapforge::log_info!("cli: {} input pattern(s)", args.input.len());
    cli::run(args)
}
