//! Restic invocation.
//!
//! One [`BackupRequest`] becomes one `restic backup` process. File lists are
//! streamed null-terminated over stdin (`--files-from-raw -`) so paths with
//! newlines or odd characters survive; a directory is passed as an argument.

use crate::config::REPOSITORY_VAR;
use crate::{Error, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// How long restic keeps retrying when another process holds the repository lock.
pub const RETRY_LOCK: &str = "5m";

/// Snapshots are grouped by host and tags, so each game gets its own parent.
pub const GROUP_BY: &str = "host,tags";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupTarget {
    /// Explicit file list, streamed over stdin.
    Files(Vec<String>),
    /// A whole directory, passed literally.
    Directory(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRequest {
    pub target: BackupTarget,
    pub tags: Vec<String>,
    pub quiet: bool,
}

impl BackupRequest {
    pub fn files(files: Vec<String>, tags: Vec<String>) -> Self {
        Self {
            target: BackupTarget::Files(files),
            tags,
            quiet: true,
        }
    }

    pub fn directory(dir: impl Into<PathBuf>, tags: Vec<String>) -> Self {
        Self {
            target: BackupTarget::Directory(dir.into()),
            tags,
            quiet: false,
        }
    }
}

/// Something that can store a backup request. [`Archiver`] is the real one.
#[async_trait]
pub trait ArchiveBackend: Send + Sync {
    async fn backup(&self, request: &BackupRequest) -> Result<()>;
}

pub struct Archiver {
    program: PathBuf,
    repository: String,
}

impl Archiver {
    pub fn new(program: impl Into<PathBuf>, repository: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            repository: repository.into(),
        }
    }

    pub fn backup_args(request: &BackupRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["backup".into()];
        if request.quiet {
            args.push("--quiet".into());
        }
        args.extend(
            [
                "--skip-if-unchanged",
                "--no-scan",
                "--group-by",
                GROUP_BY,
                "--retry-lock",
                RETRY_LOCK,
            ]
            .map(OsString::from),
        );
        for tag in &request.tags {
            args.push("--tag".into());
            args.push(tag.into());
        }
        match &request.target {
            BackupTarget::Files(_) => {
                args.push("--files-from-raw".into());
                args.push("-".into());
            }
            BackupTarget::Directory(dir) => args.push(dir.into()),
        }
        args
    }

    /// `path\0path\0...`, every entry terminated.
    pub fn raw_file_list(files: &[String]) -> Vec<u8> {
        let mut raw = Vec::with_capacity(files.iter().map(|f| f.len() + 1).sum());
        for file in files {
            raw.extend_from_slice(file.as_bytes());
            raw.push(0);
        }
        raw
    }

    /// Run one `restic backup`; a non-zero exit is an error.
    pub async fn backup_files(&self, request: &BackupRequest) -> Result<()> {
        let args = Self::backup_args(request);
        debug!("Running {} {:?}", self.program.display(), args);

        let stdin = match request.target {
            BackupTarget::Files(_) => Stdio::piped(),
            BackupTarget::Directory(_) => Stdio::null(),
        };

        let mut child = Command::new(&self.program)
            .args(&args)
            .env(REPOSITORY_VAR, &self.repository)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let (BackupTarget::Files(files), Some(mut pipe)) = (&request.target, child.stdin.take()) {
            let raw = Self::raw_file_list(files);
            match pipe.write_all(&raw).await {
                Ok(()) => pipe.shutdown().await?,
                // The exit status below tells us whether restic cared.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    warn!("{} closed stdin early", self.program.display());
                }
                Err(e) => return Err(e.into()),
            }
            drop(pipe);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(Error::CommandFailed {
                program: self.program.display().to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl ArchiveBackend for Archiver {
    async fn backup(&self, request: &BackupRequest) -> Result<()> {
        self.backup_files(request).await
    }
}
