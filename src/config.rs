//! Environment-backed configuration.
//!
//! Everything the run needs from the environment is read once at startup into
//! a [`Config`]; nothing else in the crate looks at environment variables.

use crate::{Error, Result};
use std::path::PathBuf;
use tracing::debug;

/// Restic repository location, required.
pub const REPOSITORY_VAR: &str = "RESTIC_REPOSITORY";
/// Tags applied to every archiver invocation.
pub const TAGS_VAR: &str = "RESTIC_TAGS";
/// Tags applied to the full Ludusavi directory snapshot.
pub const FULL_TAGS_VAR: &str = "RESTIC_FULL_TAGS";
/// Tags applied to every per-game snapshot.
pub const GAME_TAGS_VAR: &str = "RESTIC_GAME_TAGS";
/// Explicit path to the Ludusavi executable.
pub const LUDUSAVI_PATH_VAR: &str = "LUDUSAVI_PATH";
/// Explicit path to the Restic executable.
pub const RESTIC_PATH_VAR: &str = "RESTIC_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub repository: String,
    pub tags: TagConfig,
    pub executables: ExecutableOverrides,
}

/// Tag lists read from the `RESTIC_*TAGS` variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagConfig {
    pub global: Vec<String>,
    pub full: Vec<String>,
    pub game: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutableOverrides {
    pub ludusavi: Option<PathBuf>,
    pub restic: Option<PathBuf>,
}

impl Config {
    /// Load `.env` from the working directory, then read the process environment.
    ///
    /// Variables already set in the environment win over `.env` entries.
    pub fn from_env() -> Result<Self> {
        match dotenv::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => debug!("No .env file found"),
            Err(e) => return Err(Error::Config(format!("Failed to read .env: {}", e))),
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let repository = lookup(REPOSITORY_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| Error::Config(format!("{} is not set", REPOSITORY_VAR)))?;

        let tags = TagConfig {
            global: parse_tag_list(lookup(TAGS_VAR).as_deref()),
            full: parse_tag_list(lookup(FULL_TAGS_VAR).as_deref()),
            game: parse_tag_list(lookup(GAME_TAGS_VAR).as_deref()),
        };

        let executables = ExecutableOverrides {
            ludusavi: non_blank_path(lookup(LUDUSAVI_PATH_VAR)),
            restic: non_blank_path(lookup(RESTIC_PATH_VAR)),
        };

        debug!(
            "Config: repository set, {} global / {} full / {} game tags",
            tags.global.len(),
            tags.full.len(),
            tags.game.len()
        );

        Ok(Self {
            repository,
            tags,
            executables,
        })
    }
}

/// Split a comma-separated tag variable, trimming entries and dropping blanks.
pub fn parse_tag_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank_path(value: Option<String>) -> Option<PathBuf> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
