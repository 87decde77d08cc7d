//! Decoding of Ludusavi's `--api` JSON output.
//!
//! The scanner's output is parsed into strict types: required fields that are
//! missing or mistyped, and enum values we do not know, fail the whole parse.
//! Extra fields are ignored since Ludusavi reports more than we consume.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Output of `ludusavi backup --api`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupOutput {
    pub overall: OperationStatus,
    pub games: BTreeMap<String, GameReport>,
}

/// Aggregate counters for one scanner run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    pub total_games: u64,
    pub total_bytes: u64,
    pub processed_games: u64,
    pub processed_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameReport {
    pub decision: Decision,
    pub files: BTreeMap<String, FileReport>,
}

/// Per-game verdict from the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Processed,
    Cancelled,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub bytes: u64,
    pub change: ChangeState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored: Option<bool>,
}

/// Per-file verdict from the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeState {
    New,
    Different,
    Removed,
    Same,
    Unknown,
}

impl GameReport {
    pub fn is_processed(&self) -> bool {
        self.decision == Decision::Processed
    }

    /// Sum of every file's size, ignored and removed files included.
    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|file| file.bytes).sum()
    }

    /// Paths that should go into the archiver: not ignored, not removed.
    pub fn eligible_files(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|(_, file)| file.is_eligible())
            .map(|(path, _)| path.clone())
            .collect()
    }
}

impl FileReport {
    pub fn is_eligible(&self) -> bool {
        !self.ignored.unwrap_or(false) && self.change != ChangeState::Removed
    }
}

/// Output of `ludusavi backups --api`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupsListing {
    pub games: BTreeMap<String, BackupListingEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupListingEntry {
    pub backup_path: String,
}

pub fn parse_backup_output(raw: &str) -> Result<BackupOutput> {
    serde_json::from_str(raw).map_err(|source| Error::Schema {
        context: "ludusavi backup",
        source,
    })
}

pub fn parse_backups_listing(raw: &str) -> Result<BackupsListing> {
    serde_json::from_str(raw).map_err(|source| Error::Schema {
        context: "ludusavi backups",
        source,
    })
}

/// Ludusavi's own backup directory: the parent of the first non-empty
/// `backupPath` in the listing.
pub fn archive_source_dir(listing: &BackupsListing) -> Option<PathBuf> {
    listing
        .games
        .values()
        .map(|entry| entry.backup_path.trim())
        .find(|path| !path.is_empty())
        .and_then(|path| Path::new(path).parent())
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
}
