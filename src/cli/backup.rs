//! The backup run: scan with Ludusavi, then archive with Restic.

use crate::archiver::Archiver;
use crate::cli::Cli;
use crate::config::Config;
use crate::dispatch::{Dispatcher, Summary};
use crate::progress::{format_bytes, GameStatus, Reporter};
use crate::scanner::Scanner;
use crate::tools::{find_executable, LUDUSAVI, RESTIC};
use anyhow::Context;
use colored::Colorize;
use tracing::info;

/// Run the whole backup from the process environment.
pub async fn run(cli: &Cli) -> anyhow::Result<Summary> {
    let config = Config::from_env()?;
    run_with_config(cli, config).await
}

/// Run the whole backup with an already loaded config.
///
/// Both executables are resolved before anything is spawned; a scanner
/// failure stops the run before any archiver call.
pub async fn run_with_config(cli: &Cli, config: Config) -> anyhow::Result<Summary> {
    let ludusavi = find_executable(LUDUSAVI, config.executables.ludusavi.as_deref())?;
    let restic = find_executable(RESTIC, config.executables.restic.as_deref())?;

    let scanner = Scanner::new(ludusavi);
    let archiver = Archiver::new(restic, config.repository.clone());

    let output = scanner
        .backup(&cli.games, !cli.full_backup)
        .await
        .context("Ludusavi backup failed")?;

    let processed = output.games.values().filter(|g| g.is_processed()).count();
    let reporter = Reporter::new(processed);
    let dispatcher =
        Dispatcher::new(&archiver, config.tags.clone()).with_concurrency(usize::from(cli.jobs));

    if cli.full_backup {
        let dir = scanner
            .storage_dir()
            .await
            .context("Could not list Ludusavi backups")?;
        dispatcher
            .backup_scanner_dir(dir.as_deref(), &reporter)
            .await
            .context("Restic backup of the Ludusavi directory failed")?;
    }

    let summary = dispatcher.run(&output, &reporter).await;
    reporter.finish();
    info!(
        "Run finished: {} archived, {} skipped, {} failed",
        summary.archived(),
        summary.skipped(),
        summary.failed().len()
    );

    print_summary(&summary);
    Ok(summary)
}

fn print_summary(summary: &Summary) {
    let overall = &summary.overall;

    println!("{}", "Done!".green().bold());
    println!(
        "{}",
        format!("Games: {} / {}", overall.processed_games, overall.total_games).dimmed()
    );
    println!(
        "{}",
        format!(
            "Size: {} / {}",
            format_bytes(overall.processed_bytes),
            format_bytes(overall.total_bytes)
        )
        .dimmed()
    );
    println!(
        "{}",
        format!(
            "Snapshots: {} archived, {} skipped",
            summary.archived(),
            summary.skipped()
        )
        .dimmed()
    );

    for outcome in summary.failed() {
        if let GameStatus::Failed(reason) = &outcome.status {
            println!("{} {}: {}", "Failed".red().bold(), outcome.name, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExecutableOverrides, TagConfig};
    use crate::Error;
    use clap::Parser;
    use std::path::PathBuf;

    fn config(ludusavi: Option<PathBuf>, restic: Option<PathBuf>) -> Config {
        Config {
            repository: "/tmp/restic-repo".to_string(),
            tags: TagConfig::default(),
            executables: ExecutableOverrides { ludusavi, restic },
        }
    }

    fn find_error(err: &anyhow::Error) -> Option<&Error> {
        err.chain().find_map(|cause| cause.downcast_ref::<Error>())
    }

    #[tokio::test]
    async fn test_missing_executable_stops_before_scanning() {
        let cli = Cli::parse_from(["ludusavi-restic"]);
        let err = run_with_config(
            &cli,
            config(Some(PathBuf::from("/nonexistent/ludusavi")), None),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            find_error(&err),
            Some(Error::ExecutableNotFound { program, .. }) if program == LUDUSAVI
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scanner_failure_is_fatal() {
        let (Ok(fail), Ok(ok)) = (which::which("false"), which::which("true")) else {
            return;
        };
        let cli = Cli::parse_from(["ludusavi-restic", "Celeste"]);
        let err = run_with_config(&cli, config(Some(fail), Some(ok)))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Ludusavi backup failed"));
        assert!(matches!(find_error(&err), Some(Error::CommandFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_malformed_report_is_fatal() {
        let (Ok(echo), Ok(ok)) = (which::which("echo"), which::which("true")) else {
            return;
        };
        let cli = Cli::parse_from(["ludusavi-restic"]);
        let err = run_with_config(&cli, config(Some(echo), Some(ok)))
            .await
            .unwrap_err();

        assert!(matches!(find_error(&err), Some(Error::Schema { .. })));
    }
}
