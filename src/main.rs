// Headless binary: every run composes one QR image from the command line.

use std::process::ExitCode;

use clap::Parser;
use qr_tight_studio::{cli, logger};

fn main() -> ExitCode {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let args = cli::CliArgs::parse();
    cli::run(args)
}
