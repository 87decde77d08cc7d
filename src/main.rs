//! ludusavi-restic - back up Ludusavi game saves to Restic
//!
//! Main binary entry point for the command-line interface.

use clap::Parser;
use colored::Colorize;
use ludusavi_restic::cli::Cli;
use ludusavi_restic::logging::init_logging;
use ludusavi_restic::Error;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match ludusavi_restic::cli::backup::run(&cli).await {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(summary) => {
            eprintln!(
                "{} {} game(s) could not be backed up",
                "Error".red().bold(),
                summary.failed().len()
            );
            ExitCode::from(1)
        }
        Err(err) => {
            eprintln!("{} {:#}", "Error".red().bold(), err);
            if let Some(hint) = err
                .chain()
                .find_map(|cause| cause.downcast_ref::<Error>())
                .and_then(Error::hint)
            {
                eprintln!("{}", hint);
            }
            ExitCode::from(1)
        }
    }
}
