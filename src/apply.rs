//! Applies a change set to the filesystem.
//!
//! Fixed phase order: additions (ascending, parents before children), then
//! renames (their targets' parent directories now exist, their sources
//! still do), then deletions in reverse order (every directory is empty by
//! the time it is reached), then modifications. A failed operation is
//! reported and the run continues; partial progress is still useful and
//! the next run reconciles whatever is left.

use std::fs::{self, File, OpenOptions};
use std::io;

use camino::Utf8Path;

use crate::diff::ChangeSet;
use crate::report;

/// Applies every operation in `changes`, reporting each one through
/// `progress`. Returns the number of failed operations.
pub fn apply_changes(changes: &ChangeSet, progress: &mut dyn FnMut(String)) -> usize {
    let mut failures = 0_usize;

    for pair in &changes.additions {
        progress(format!("Adding {}", pair.dest));
        let result = if pair.source.is_dir() {
            fs::create_dir_all(&pair.dest)
        } else {
            copy_new(&pair.source, &pair.dest)
        };
        if let Err(e) = result {
            report::error(format_args!("Cannot add \"{}\": {e}", pair.dest));
            failures += 1;
        }
    }

    for pair in &changes.renames {
        progress(format!("Renaming {}", pair.source));
        if let Err(e) = fs::rename(&pair.source, &pair.dest) {
            report::error(format_args!(
                "Cannot rename \"{}\" to \"{}\": {e}",
                pair.source, pair.dest
            ));
            failures += 1;
        }
    }

    for path in changes.deletions.iter().rev() {
        progress(format!("Removing {path}"));
        let path = path.as_path();
        let result = if path.is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        if let Err(e) = result {
            report::error(format_args!("Cannot remove \"{path}\": {e}"));
            failures += 1;
        }
    }

    for pair in &changes.modifications {
        progress(format!("Replacing {}", pair.dest));
        if let Err(e) = fs::copy(&pair.source, &pair.dest) {
            report::error(format_args!("Cannot replace \"{}\": {e}", pair.dest));
            failures += 1;
        }
    }

    failures
}

/// Copies a file to a destination that must not exist yet. Parent
/// directories are created as needed, since wildcard expansions do not
/// list intermediate directories.
fn copy_new(source: &Utf8Path, dest: &Utf8Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut from = File::open(source)?;
    let mut to = OpenOptions::new().write(true).create_new(true).open(dest)?;
    io::copy(&mut from, &mut to)?;
    Ok(())
}
