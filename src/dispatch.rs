//! Turning a Ludusavi report into Restic snapshots.
//!
//! Every game the scanner processed becomes one [`GamePlan`]: its display
//! size, the files worth archiving and the tags to put on the snapshot. Plans
//! with files are handed to the [`ArchiveBackend`] with bounded concurrency;
//! results come back in game order and one failing game does not stop the
//! others.

use crate::archiver::{ArchiveBackend, BackupRequest};
use crate::config::TagConfig;
use crate::progress::{GameStatus, Reporter};
use crate::scanner::{BackupOutput, OperationStatus};
use crate::Result;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Concurrent restic processes when nothing else is asked for.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Restic splits `--tag` values on commas, so they cannot appear in a tag.
pub fn sanitize_tag(tag: &str) -> String {
    tag.trim().replace(',', "_")
}

/// Trim, drop blanks and duplicates, keep first-seen order.
pub fn compose_tags<'a>(parts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in parts.into_iter().map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|existing| existing == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePlan {
    /// 1-based position among processed games.
    pub index: usize,
    pub name: String,
    /// Size of every file the scanner listed, archived or not.
    pub bytes: u64,
    pub files: Vec<String>,
    pub tags: Vec<String>,
}

impl GamePlan {
    /// `None` when there is nothing to archive.
    pub fn request(&self) -> Option<BackupRequest> {
        if self.files.is_empty() {
            None
        } else {
            Some(BackupRequest::files(self.files.clone(), self.tags.clone()))
        }
    }
}

/// Plans for every processed game, in report order.
pub fn plan_games(output: &BackupOutput, tag_config: &TagConfig) -> Vec<GamePlan> {
    output
        .games
        .iter()
        .filter(|(_, game)| game.is_processed())
        .enumerate()
        .map(|(i, (name, game))| {
            let name_tag = sanitize_tag(name);
            let tags = compose_tags(
                std::iter::once(name_tag.as_str())
                    .chain(tag_config.global.iter().map(String::as_str))
                    .chain(tag_config.game.iter().map(String::as_str)),
            );
            GamePlan {
                index: i + 1,
                name: name.clone(),
                bytes: game.total_bytes(),
                files: game.eligible_files(),
                tags,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOutcome {
    pub name: String,
    pub bytes: u64,
    pub status: GameStatus,
}

/// What a dispatch run did, next to the scanner's own counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub overall: OperationStatus,
    pub outcomes: Vec<GameOutcome>,
}

impl Summary {
    pub fn archived(&self) -> usize {
        self.count(|s| matches!(s, GameStatus::Archived { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, GameStatus::Skipped))
    }

    pub fn failed(&self) -> Vec<&GameOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, GameStatus::Failed(_)))
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failed().is_empty()
    }

    fn count(&self, pred: impl Fn(&GameStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

pub struct Dispatcher<'a, B: ArchiveBackend> {
    backend: &'a B,
    tags: TagConfig,
    concurrency: usize,
}

impl<'a, B: ArchiveBackend> Dispatcher<'a, B> {
    pub fn new(backend: &'a B, tags: TagConfig) -> Self {
        Self {
            backend,
            tags,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn full_backup_tags(&self) -> Vec<String> {
        compose_tags(
            self.tags
                .global
                .iter()
                .chain(self.tags.full.iter())
                .map(String::as_str),
        )
    }

    /// Snapshot Ludusavi's whole backup directory. A missing directory is only
    /// a warning; a failing restic run is an error.
    pub async fn backup_scanner_dir(&self, dir: Option<&Path>, reporter: &Reporter) -> Result<Option<PathBuf>> {
        let Some(dir) = dir else {
            warn!("Ludusavi backup directory not found");
            reporter.warn("Could not find Ludusavi directory");
            return Ok(None);
        };

        info!("Backing up Ludusavi directory {}", dir.display());
        let request = BackupRequest::directory(dir, self.full_backup_tags());
        self.backend.backup(&request).await?;

        reporter.step("Backed up", "Ludusavi directory");
        Ok(Some(dir.to_path_buf()))
    }

    /// Archive every processed game of `output`.
    pub async fn run(&self, output: &BackupOutput, reporter: &Reporter) -> Summary {
        let plans = plan_games(output, &self.tags);
        let total = plans.len();
        info!(
            "Dispatching {} games with up to {} concurrent backups",
            total, self.concurrency
        );

        let mut results = stream::iter(plans)
            .map(|plan| async move {
                let status = self.archive(&plan).await;
                (plan, status)
            })
            .buffered(self.concurrency);

        let mut outcomes = Vec::with_capacity(total);
        while let Some((plan, status)) = results.next().await {
            reporter.game(plan.index, total, &plan.name, plan.bytes, &status);
            outcomes.push(GameOutcome {
                name: plan.name,
                bytes: plan.bytes,
                status,
            });
        }

        Summary {
            overall: output.overall,
            outcomes,
        }
    }

    async fn archive(&self, plan: &GamePlan) -> GameStatus {
        let Some(request) = plan.request() else {
            debug!("{}: no files to archive", plan.name);
            return GameStatus::Skipped;
        };

        match self.backend.backup(&request).await {
            Ok(()) => {
                debug!("{}: archived {} files", plan.name, plan.files.len());
                GameStatus::Archived {
                    files: plan.files.len(),
                }
            }
            Err(e) => {
                warn!("{}: backup failed: {}", plan.name, e);
                GameStatus::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::BackupTarget;
    use crate::scanner::parse_backup_output;
    use crate::Error;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBackend {
        requests: Mutex<Vec<BackupRequest>>,
        fail_tag: Option<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl RecordingBackend {
        fn failing_on(tag: &str) -> Self {
            Self {
                fail_tag: Some(tag.to_string()),
                ..Self::default()
            }
        }

        fn requests(&self) -> Vec<BackupRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ArchiveBackend for RecordingBackend {
        async fn backup(&self, request: &BackupRequest) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.requests.lock().unwrap().push(request.clone());
            match &self.fail_tag {
                Some(tag) if request.tags.contains(tag) => Err(Error::CommandFailed {
                    program: "restic".to_string(),
                    code: Some(1),
                    stderr: "unable to open repository".to_string(),
                }),
                _ => Ok(()),
            }
        }
    }

    const TWO_GAMES: &str = r#"{
        "overall": {"totalGames": 2, "processedGames": 2, "totalBytes": 1000, "processedBytes": 1000},
        "games": {
            "Game A": {"decision": "Processed", "files": {"save1.dat": {"bytes": 500, "change": "Same"}}},
            "Game B": {"decision": "Processed", "files": {"save2.dat": {"bytes": 500, "change": "Removed"}}}
        }
    }"#;

    fn tags(global: &[&str], full: &[&str], game: &[&str]) -> TagConfig {
        let own = |t: &[&str]| t.iter().map(|s| s.to_string()).collect();
        TagConfig {
            global: own(global),
            full: own(full),
            game: own(game),
        }
    }

    #[test]
    fn test_sanitize_tag() {
        assert_eq!(sanitize_tag("Warhammer 40,000: Boltgun"), "Warhammer 40_000: Boltgun");
        assert_eq!(sanitize_tag("  Celeste "), "Celeste");
        assert_eq!(sanitize_tag(",,"), "__");
    }

    #[test]
    fn test_compose_tags_drops_blank_and_duplicates() {
        assert_eq!(
            compose_tags(["Celeste", " ", "games", "", " games ", "pc"]),
            vec!["Celeste", "games", "pc"]
        );
    }

    #[test]
    fn test_plan_games_tags_and_filtering() {
        let output = parse_backup_output(
            r#"{
            "overall": {"totalGames": 3, "processedGames": 2, "totalBytes": 60, "processedBytes": 40},
            "games": {
                "A, the game": {"decision": "Processed", "files": {
                    "/a/keep": {"bytes": 10, "change": "New"},
                    "/a/diff": {"bytes": 5, "change": "Different"},
                    "/a/ignored": {"bytes": 5, "change": "Same", "ignored": true},
                    "/a/gone": {"bytes": 10, "change": "Removed"}
                }},
                "B": {"decision": "Ignored", "files": {"/b/x": {"bytes": 10, "change": "New"}}},
                "C": {"decision": "Processed", "files": {"/c/x": {"bytes": 10, "change": "Unknown", "ignored": false}}},
                "D": {"decision": "Cancelled", "files": {"/d/x": {"bytes": 10, "change": "New"}}}
            }
        }"#,
        )
        .unwrap();

        let plans = plan_games(&output, &tags(&["games"], &["full"], &["per-game"]));
        assert_eq!(
            plans,
            vec![
                GamePlan {
                    index: 1,
                    name: "A, the game".to_string(),
                    bytes: 30,
                    files: vec!["/a/diff".to_string(), "/a/keep".to_string()],
                    tags: vec![
                        "A_ the game".to_string(),
                        "games".to_string(),
                        "per-game".to_string()
                    ],
                },
                GamePlan {
                    index: 2,
                    name: "C".to_string(),
                    bytes: 10,
                    files: vec!["/c/x".to_string()],
                    tags: vec!["C".to_string(), "games".to_string(), "per-game".to_string()],
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_removed_only_game_is_skipped() {
        let output = parse_backup_output(TWO_GAMES).unwrap();
        let backend = RecordingBackend::default();
        let dispatcher = Dispatcher::new(&backend, TagConfig::default());

        let summary = dispatcher.run(&output, &Reporter::hidden()).await;

        assert_eq!(
            backend.requests(),
            vec![BackupRequest {
                target: BackupTarget::Files(vec!["save1.dat".to_string()]),
                tags: vec!["Game A".to_string()],
                quiet: true,
            }]
        );
        assert_eq!(
            summary.outcomes,
            vec![
                GameOutcome {
                    name: "Game A".to_string(),
                    bytes: 500,
                    status: GameStatus::Archived { files: 1 },
                },
                GameOutcome {
                    name: "Game B".to_string(),
                    bytes: 500,
                    status: GameStatus::Skipped,
                },
            ]
        );
        assert_eq!(summary.overall.processed_games, 2);
        assert_eq!(summary.archived(), 1);
        assert_eq!(summary.skipped(), 1);
        assert!(summary.is_success());
    }

    #[tokio::test]
    async fn test_cancelled_game_is_not_iterated() {
        let raw = TWO_GAMES.replace(
            r#""Game B": {"decision": "Processed""#,
            r#""Game B": {"decision": "Cancelled""#,
        );
        let output = parse_backup_output(&raw).unwrap();
        let backend = RecordingBackend::default();

        let summary = Dispatcher::new(&backend, TagConfig::default())
            .run(&output, &Reporter::hidden())
            .await;

        assert_eq!(backend.requests().len(), 1);
        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(summary.outcomes[0].name, "Game A");
        assert_eq!(summary.skipped(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_game() {
        let mut games = Vec::new();
        for i in 0..5 {
            games.push(format!(
                r#""G{i}": {{"decision": "Processed", "files": {{"/g{i}": {{"bytes": 1, "change": "New"}}}}}}"#
            ));
        }
        let raw = format!(
            r#"{{"overall": {{"totalGames": 5, "processedGames": 5, "totalBytes": 5, "processedBytes": 5}}, "games": {{{}}}}}"#,
            games.join(",")
        );
        let output = parse_backup_output(&raw).unwrap();
        let backend = RecordingBackend::failing_on("G2");

        let summary = Dispatcher::new(&backend, TagConfig::default())
            .run(&output, &Reporter::hidden())
            .await;

        assert_eq!(backend.requests().len(), 5);
        assert_eq!(summary.archived(), 4);
        assert!(!summary.is_success());

        let failed = summary.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "G2");
        assert!(matches!(&failed[0].status, GameStatus::Failed(msg) if msg.contains("exit code 1")));

        let names: Vec<&str> = summary.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["G0", "G1", "G2", "G3", "G4"]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let games: Vec<String> = (0..25)
            .map(|i| {
                format!(r#""G{i:02}": {{"decision": "Processed", "files": {{"/g": {{"bytes": 1, "change": "Same"}}}}}}"#)
            })
            .collect();
        let raw = format!(
            r#"{{"overall": {{"totalGames": 25, "processedGames": 25, "totalBytes": 25, "processedBytes": 25}}, "games": {{{}}}}}"#,
            games.join(",")
        );
        let output = parse_backup_output(&raw).unwrap();
        let backend = RecordingBackend::default();

        let summary = Dispatcher::new(&backend, TagConfig::default())
            .with_concurrency(4)
            .run(&output, &Reporter::hidden())
            .await;

        assert_eq!(summary.archived(), 25);
        let max = backend.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 4, "max in flight was {}", max);
        assert!(max > 1, "backups never overlapped");
    }

    #[tokio::test]
    async fn test_scanner_dir_backup() {
        let backend = RecordingBackend::default();
        let dispatcher = Dispatcher::new(&backend, tags(&["games", " "], &["ludusavi"], &["per-game"]));
        let reporter = Reporter::hidden();

        let done = dispatcher
            .backup_scanner_dir(Some(Path::new("/home/me/ludusavi-backup")), &reporter)
            .await
            .unwrap();
        assert_eq!(done, Some(PathBuf::from("/home/me/ludusavi-backup")));

        assert_eq!(
            backend.requests(),
            vec![BackupRequest {
                target: BackupTarget::Directory(PathBuf::from("/home/me/ludusavi-backup")),
                tags: vec!["games".to_string(), "ludusavi".to_string()],
                quiet: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_scanner_dir_is_not_fatal() {
        let backend = RecordingBackend::default();
        let dispatcher = Dispatcher::new(&backend, TagConfig::default());

        let done = dispatcher
            .backup_scanner_dir(None, &Reporter::hidden())
            .await
            .unwrap();
        assert_eq!(done, None);
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_scanner_dir_failure_is_fatal() {
        let backend = RecordingBackend::failing_on("full");
        let dispatcher = Dispatcher::new(&backend, tags(&[], &["full"], &[]));

        let result = dispatcher
            .backup_scanner_dir(Some(Path::new("/srv/ludusavi")), &Reporter::hidden())
            .await;
        assert!(matches!(result, Err(Error::CommandFailed { .. })));
    }
}
