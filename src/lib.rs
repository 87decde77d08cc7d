//! # ludusavi-restic
//!
//! Backs up game saves found by [Ludusavi](https://github.com/mtkennerly/ludusavi)
//! into a [Restic](https://restic.net/) repository, one snapshot per game.
//!
//! ## How a run works
//!
//! 1. Ludusavi is run in API mode (`--preview` unless a full backup is asked
//!    for) and its JSON report is decoded strictly ([`scanner::report`]).
//! 2. Every processed game becomes a plan: the files that are neither ignored
//!    nor removed, plus tags built from the game name and the `RESTIC_*TAGS`
//!    variables ([`dispatch`]).
//! 3. Each plan with files becomes one `restic backup` process fed the paths
//!    null-separated on stdin ([`archiver`]), with a bounded number running at
//!    once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ludusavi_restic::archiver::Archiver;
//! use ludusavi_restic::config::TagConfig;
//! use ludusavi_restic::dispatch::Dispatcher;
//! use ludusavi_restic::progress::Reporter;
//! use ludusavi_restic::scanner::Scanner;
//!
//! # #[tokio::main]
//! # async fn main() -> ludusavi_restic::Result<()> {
//! let scanner = Scanner::new("ludusavi");
//! let archiver = Archiver::new("restic", "/srv/restic-repo");
//!
//! let report = scanner.backup(&[], true).await?;
//! let summary = Dispatcher::new(&archiver, TagConfig::default())
//!     .run(&report, &Reporter::hidden())
//!     .await;
//! println!("{} games archived", summary.archived());
//! # Ok(())
//! # }
//! ```

pub mod archiver;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod tools;

// Re-export commonly used types
pub use archiver::{ArchiveBackend, Archiver, BackupRequest};
pub use config::Config;
pub use dispatch::{Dispatcher, Summary};
pub use error::{Error, Result};
pub use scanner::{BackupOutput, Scanner};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
