mod args;
mod commands;
mod log;

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use crate::args::CliArgs;
use crate::commands::exit_code_for;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let verbosity = match args.verbosity() {
        Ok(verbosity) => verbosity,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    log::init(verbosity);

    match args.command.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}
