//! Command-line interface for ludusavi-restic.

use clap::Parser;
use crate::dispatch::DEFAULT_CONCURRENCY;

pub mod backup;

/// Back up Ludusavi game saves to Restic, one tagged snapshot per game
#[derive(Parser, Debug)]
#[command(name = "ludusavi-restic")]
#[command(about = "Back up Ludusavi game saves to Restic, one tagged snapshot per game")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "Environment: RESTIC_REPOSITORY (required), RESTIC_TAGS, \
RESTIC_FULL_TAGS, RESTIC_GAME_TAGS, LUDUSAVI_PATH, RESTIC_PATH. A .env file in the \
working directory is loaded first.")]
pub struct Cli {
    /// Games to back up (all games when omitted)
    #[arg(value_name = "GAME")]
    pub games: Vec<String>,

    /// Do a full Ludusavi backup and back up its directory to Restic
    #[arg(short, long, alias = "fullBackup")]
    pub full_backup: bool,

    /// Maximum number of concurrent restic processes
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY as u16, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: u16,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
