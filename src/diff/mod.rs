//! Change-set computation: contrast expanded source groups against the
//! live destination tree.
//!
//! For every write prefix the engine snapshots the existing destination
//! contents into a checklist. Each expanded source claims its destination
//! off the checklist: a claim with differing content is a modification, a
//! claim with equal content is satisfied, and a missing destination is an
//! addition. Whatever remains unclaimed when the config stream ends does
//! not belong to the mirror and becomes a deletion, unless an ignore
//! pattern protects it (in which case its ancestors are protected too).
//! Finally, deletion/addition pairs with identical bytes are reclassified
//! as renames.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

use crate::compare::Oracle;
use crate::config::Interpreter;
use crate::glob;
use crate::paths::{self, PathKey, cmp_filenames};
use crate::report;

/// A source/destination pairing, ordered by destination filename
/// (case-insensitive). For renames, `source` is the old destination.
#[derive(Clone, Debug)]
pub struct ChangePair {
    pub source: Utf8PathBuf,
    pub dest: Utf8PathBuf,
}

impl Ord for ChangePair {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        cmp_filenames(self.dest.as_str(), other.dest.as_str())
    }
}

impl PartialOrd for ChangePair {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ChangePair {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for ChangePair {}

/// Every mutation needed to make the destinations mirror the sources.
///
/// The four collections are disjoint over destination paths; each iterates
/// in case-insensitive filename order.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub deletions: BTreeSet<PathKey>,
    pub additions: BTreeSet<ChangePair>,
    pub modifications: BTreeSet<ChangePair>,
    pub renames: BTreeSet<ChangePair>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty()
            && self.additions.is_empty()
            && self.modifications.is_empty()
            && self.renames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deletions.len() + self.additions.len() + self.modifications.len() + self.renames.len()
    }
}

/// Comparison switches shared by `check` and `backup`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScanOptions {
    pub skip_cache: bool,
    pub fast_compare: bool,
}

/// Destination snapshot for one write prefix.
struct Checklist {
    entries: BTreeSet<PathKey>,
    /// Whether the destination root already existed before this run.
    pre_existed: bool,
}

/// Drives the whole pipeline: interpreter assignments are expanded one at a
/// time and folded into the change set, so a parse error on a later config
/// line wastes no expansion work. `progress` runs once per scanned item.
///
/// # Errors
///
/// Config errors and an uncreatable destination root abort the scan;
/// unreadable directories merely warn.
pub fn scan_changes(
    interp: &mut Interpreter,
    oracle: &mut Oracle,
    options: ScanOptions,
    progress: &mut dyn FnMut(),
) -> Result<(ChangeSet, usize)> {
    let mut changes = ChangeSet::default();
    let mut checklists: BTreeMap<Utf8PathBuf, Checklist> = BTreeMap::new();
    let mut previous_read_paths = BTreeSet::new();
    let mut scanned = 0_usize;

    while let Some(assignment) = interp.next_assignment()? {
        let group = glob::expand(
            &assignment.read_pattern,
            &interp.ignores,
            interp.options,
            &mut previous_read_paths,
        )?;
        scanned += group.relative_paths.len();
        if group.is_empty() {
            continue;
        }

        let checklist = match checklists.entry(assignment.write_prefix.clone()) {
            std::collections::btree_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::btree_map::Entry::Vacant(e) => {
                e.insert(snapshot_destination(&assignment.write_prefix)?)
            }
        };

        for relative in &group.relative_paths {
            progress();
            let relative = relative.as_path();
            let source = paths::join_relative(&group.read_prefix, relative);
            let dest = paths::join_relative(&assignment.write_prefix, relative);

            if relative.as_str().is_empty() {
                // The write prefix itself; an addition only when the root
                // had to be created just now.
                if !checklist.pre_existed {
                    changes.additions.insert(ChangePair { source, dest });
                }
                continue;
            }

            if checklist.entries.remove(&PathKey::new(dest.clone())) {
                if !oracle.equivalent(&source, &dest, options.skip_cache, options.fast_compare) {
                    changes.modifications.insert(ChangePair { source, dest });
                }
            } else {
                changes.additions.insert(ChangePair { source, dest });
            }
        }
    }

    collect_deletions(&mut changes, &checklists, interp);
    detect_renames(&mut changes, oracle, options);

    Ok((changes, scanned))
}

/// Snapshots the current contents of a destination root. A missing root is
/// created on the spot and snapshots as empty.
fn snapshot_destination(write_prefix: &Utf8Path) -> Result<Checklist> {
    if !write_prefix.is_dir() {
        fs::create_dir_all(write_prefix)
            .with_context(|| format!("cannot create destination \"{write_prefix}\""))?;
        return Ok(Checklist {
            entries: BTreeSet::new(),
            pre_existed: false,
        });
    }

    let mut entries = BTreeSet::new();
    for entry in WalkDir::new(write_prefix).min_depth(1) {
        match entry {
            Ok(entry) => match Utf8PathBuf::from_path_buf(entry.into_path()) {
                Ok(path) => {
                    entries.insert(PathKey::new(path));
                }
                Err(path) => report::warn(format_args!(
                    "Skipping non UTF-8 destination path \"{}\"",
                    path.display()
                )),
            },
            Err(e) => report::warn(format_args!("Cannot read destination entry: {e}")),
        }
    }
    Ok(Checklist {
        entries,
        pre_existed: true,
    })
}

/// Residual checklist entries become deletions, walked leaves-first so that
/// an ignored entry can protect all of its ancestor directories.
fn collect_deletions(
    changes: &mut ChangeSet,
    checklists: &BTreeMap<Utf8PathBuf, Checklist>,
    interp: &Interpreter,
) {
    for checklist in checklists.values() {
        let mut protected: BTreeSet<PathKey> = BTreeSet::new();
        for key in checklist.entries.iter().rev() {
            if protected.contains(key) {
                continue;
            }
            if interp.ignores.is_ignored(key.as_path(), interp.options) {
                for ancestor in key.as_path().ancestors().skip(1) {
                    protected.insert(PathKey::new(ancestor.to_path_buf()));
                }
            } else {
                changes.deletions.insert(key.clone());
            }
        }
    }
}

/// Moves equivalent (deletion, addition) file pairs into `renames`.
///
/// Candidates are bucketed by size; the first content-equivalent candidate
/// wins. Directories never rename, and a pair crossing mount points is
/// fine: the rename operation is expected to handle it.
fn detect_renames(changes: &mut ChangeSet, oracle: &mut Oracle, options: ScanOptions) {
    let mut by_size: BTreeMap<u64, Vec<PathKey>> = BTreeMap::new();
    for deletion in &changes.deletions {
        if let Ok(meta) = fs::metadata(deletion.as_path())
            && meta.is_file()
        {
            by_size.entry(meta.len()).or_default().push(deletion.clone());
        }
    }
    if by_size.is_empty() {
        return;
    }

    let additions: Vec<ChangePair> = changes.additions.iter().cloned().collect();
    for pair in additions {
        let Ok(meta) = fs::metadata(&pair.source) else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Some(bucket) = by_size.get_mut(&meta.len()) else {
            continue;
        };
        let matched = bucket.iter().position(|old| {
            oracle.equivalent(
                &pair.source,
                old.as_path(),
                options.skip_cache,
                options.fast_compare,
            )
        });
        if let Some(index) = matched {
            let old = bucket.remove(index);
            changes.deletions.remove(&old);
            changes.additions.remove(&pair);
            changes.renames.insert(ChangePair {
                source: old.into_path(),
                dest: pair.dest,
            });
        }
    }
}

#[cfg(test)]
mod tests;
