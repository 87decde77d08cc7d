//! Console progress for the per-game loop.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Binary-unit size, e.g. `500 B`, `1.5 KiB`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Zero-padded 1-based position, as wide as `total` is long.
pub fn format_index(index: usize, total: usize) -> String {
    let width = total.max(1).to_string().len();
    format!("{:0width$}", index, width = width)
}

/// How one game ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameStatus {
    Archived { files: usize },
    Skipped,
    Failed(String),
}

/// Uncolored progress line: `[03/12] Name (1.5 KiB)` plus a marker.
pub fn progress_line(index: usize, total: usize, name: &str, bytes: u64, status: &GameStatus) -> String {
    let head = format!(
        "[{}/{}] {} ({})",
        format_index(index, total),
        total,
        name,
        format_bytes(bytes)
    );
    match status {
        GameStatus::Archived { .. } => head,
        GameStatus::Skipped => format!("{} skipped", head),
        GameStatus::Failed(reason) => format!("{} failed: {}", head, reason),
    }
}

/// Progress bar for the per-game loop, with finished games printed above it.
pub struct Reporter {
    bar: ProgressBar,
}

impl Reporter {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{prefix:.cyan.bold} [{bar:30.cyan/dim}] {pos}/{len} {msg}",
        ) {
            bar.set_style(style.progress_chars("━╸─"));
        }
        bar.set_prefix("Backing up");
        bar.set_message("on Restic");
        Self { bar }
    }

    /// A reporter that draws nothing, for tests and non-interactive use.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn step(&self, title: &str, detail: &str) {
        self.bar
            .println(format!("{} {}", title.green().bold(), detail));
    }

    pub fn warn(&self, message: &str) {
        self.bar
            .println(format!("{} {}", "Warning".yellow().bold(), message));
    }

    pub fn game(&self, index: usize, total: usize, name: &str, bytes: u64, status: &GameStatus) {
        let line = progress_line(index, total, name, bytes, status);
        let line = match status {
            GameStatus::Archived { .. } => line.normal(),
            GameStatus::Skipped => line.dimmed(),
            GameStatus::Failed(_) => line.red(),
        };
        self.bar.println(line.to_string());
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
