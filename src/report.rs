//! Terminal output: colored change listings, warnings, the scan spinner,
//! and the apply-phase progress bar.
//!
//! Color code used across the tool: cyan for directories, green for tracked
//! files, yellow for warnings and ignored entries, red for errors and
//! deletions, magenta for renames.

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::diff::ChangeSet;

/// Minimum delay between spinner redraws.
const SPINNER_INTERVAL: Duration = Duration::from_millis(200);

pub fn warn(message: impl Display) {
    println!("{}", format!("Warning: {message}").yellow());
}

pub fn error(message: impl Display) {
    eprintln!("{} {message}", "Error:".red());
}

/// Scan-phase spinner, redrawn at most every 200 ms from the calling
/// thread. `tick` is cheap enough to call once per discovered item.
pub struct Spinner {
    bar: ProgressBar,
    last_draw: Instant,
}

impl Spinner {
    pub fn new(message: &'static str) -> Self {
        println!("{message}");
        let bar = ProgressBar::new_spinner();
        Self {
            bar,
            last_draw: Instant::now(),
        }
    }

    pub fn tick(&mut self) {
        if self.last_draw.elapsed() >= SPINNER_INTERVAL {
            self.bar.tick();
            self.last_draw = Instant::now();
        }
    }

    /// Clears the spinner and prints the scan total.
    pub fn finish(self, scanned: usize) {
        self.bar.finish_and_clear();
        println!("Discovered {scanned} items.\n");
    }
}

/// Apply-phase progress bar with one message line per operation.
pub struct ApplyProgress {
    bar: ProgressBar,
}

impl ApplyProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{percent:>3}% [{bar:60}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }

    pub fn step(&self, message: String) {
        self.bar.println(message);
        self.bar.inc(1);
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
        println!("File operations completed.");
    }
}

fn print_section<I: Iterator<Item = String>>(
    header: &str,
    total: usize,
    lines: I,
    limit: usize,
    paint: fn(&str) -> colored::ColoredString,
) {
    if total == 0 {
        return;
    }
    println!("{header}:");
    for (index, line) in lines.enumerate() {
        if index == limit {
            println!("    (and {} more)", total - index);
            break;
        }
        println!("{}", paint(&line));
    }
    println!();
}

/// Prints the four change categories with a per-category output limit, then
/// the totals. With `confirmation` the totals are phrased as a pending
/// question for [`confirm`].
pub fn print_changes(changes: &ChangeSet, limit: usize, confirmation: bool) {
    if changes.is_empty() {
        println!("All up to date.");
        return;
    }

    print_section(
        "Deletions",
        changes.deletions.len(),
        changes.deletions.iter().map(|p| format!("-   {p}")),
        limit,
        |s| s.red(),
    );
    print_section(
        "Additions",
        changes.additions.len(),
        changes.additions.iter().map(|p| format!("+   {}", p.dest)),
        limit,
        |s| s.green(),
    );
    print_section(
        "Modifications",
        changes.modifications.len(),
        changes
            .modifications
            .iter()
            .map(|p| format!("*   {}", p.dest)),
        limit,
        |s| s.yellow(),
    );
    print_section(
        "Renames",
        changes.renames.len(),
        changes
            .renames
            .iter()
            .map(|p| format!("~   {} -> {}", p.source, p.dest)),
        limit,
        |s| s.magenta(),
    );

    if confirmation {
        println!("After this operation:");
    }
    let suffix = if confirmation { "will be" } else { "to" };
    let phrase = |count: usize, verb: &str, verb_pending: &str| {
        if count > 0 {
            if confirmation {
                println!("{count:>5} item(s) {suffix} {verb_pending}.");
            } else {
                println!("{count:>5} item(s) {suffix} {verb}.");
            }
        }
    };
    phrase(changes.deletions.len(), "remove", "removed");
    phrase(changes.additions.len(), "add", "added");
    phrase(changes.modifications.len(), "modify", "modified");
    phrase(changes.renames.len(), "rename", "renamed");
}

/// Asks the user to confirm the pending operation. Any reasonable spelling
/// of "yes" is accepted, whitespace stripped, case ignored.
pub fn confirm() -> bool {
    print!("\nDo you want to continue [Y/n]? ");
    let _ = io::stdout().flush();
    let mut input = String::new();
    if io::stdin().lock().read_line(&mut input).is_err() {
        return false;
    }
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    matches!(
        cleaned.as_str(),
        "y" | "ya"
            | "ye"
            | "yas"
            | "yea"
            | "yee"
            | "yep"
            | "yes"
            | "yeah"
            | "yessir"
            | "affirmative"
            | "true"
            | "sure"
    )
}
