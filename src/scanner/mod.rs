//! Ludusavi client.
//!
//! Runs the scanner as a subprocess in API mode and decodes its report. Each
//! call blocks until the scanner exits; its output is parsed in one piece.

pub mod report;

pub use report::{
    archive_source_dir, parse_backup_output, parse_backups_listing, BackupListingEntry,
    BackupOutput, BackupsListing, ChangeState, Decision, FileReport, GameReport, OperationStatus,
};

use crate::{Error, Result};
use std::ffi::OsString;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

pub struct Scanner {
    program: PathBuf,
}

impl Scanner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments for `ludusavi backup`. Without `preview` Ludusavi writes its
    /// own backup as well as reporting.
    pub fn backup_args(games: &[String], preview: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["backup".into()];
        args.extend(games.iter().map(OsString::from));
        args.push("--force".into());
        args.push("--api".into());
        if preview {
            args.push("--preview".into());
        }
        args
    }

    /// Run the scanner over `games` (all games when empty).
    pub async fn backup(&self, games: &[String], preview: bool) -> Result<BackupOutput> {
        info!(
            "Scanning {} ({})",
            if games.is_empty() {
                "all games".to_string()
            } else {
                games.join(", ")
            },
            if preview { "preview" } else { "backup" }
        );

        let stdout = self.run(Self::backup_args(games, preview)).await?;
        let output = parse_backup_output(&stdout)?;

        debug!(
            "Scanner reported {}/{} games",
            output.overall.processed_games, output.overall.total_games
        );
        Ok(output)
    }

    /// List Ludusavi's existing backups.
    pub async fn backups(&self) -> Result<BackupsListing> {
        let stdout = self.run(vec!["backups".into(), "--api".into()]).await?;
        parse_backups_listing(&stdout)
    }

    /// Directory Ludusavi writes its backups to, if any game has one.
    pub async fn storage_dir(&self) -> Result<Option<PathBuf>> {
        let listing = self.backups().await?;
        Ok(archive_source_dir(&listing))
    }

    async fn run(&self, args: Vec<OsString>) -> Result<String> {
        debug!("Running {} {:?}", self.program.display(), args);

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                program: self.program.display().to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
