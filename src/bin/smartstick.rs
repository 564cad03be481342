use std::process::ExitCode;
use clap::Parser;
use log::{error, info};
use smartstick_companion::{init_logging, run};
use smartstick_companion::cli::args::Args;
use smartstick_companion::error::{AppRunError, ConfigError};

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    info!(concat!("Smart Stick Companion ", env!("CARGO_PKG_VERSION")));

    match run(args) {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            eprintln!("Another instance of smartstick is already running");
            ExitCode::FAILURE
        },
        Err(err) => {
            error!("{}", err);
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        },
        Ok(_) => ExitCode::SUCCESS,
    }
}
