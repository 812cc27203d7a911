//! Pattern expansion against the live filesystem.
//!
//! A read pattern is expanded into its wildcard-free read prefix plus the
//! set of matching paths relative to that prefix. A pattern whose final
//! segment has no wildcard is treated as a directory to mirror recursively:
//! a `**` segment is appended, the directory itself becomes the empty
//! relative path, and its contents stem directly from the prefix.
//!
//! Expansion is a depth-first walk over [`WalkFrame`] records. A `**`
//! segment matches zero levels (the frame is re-pushed with the next
//! segment) or any number of levels (children are walked with `**` again).
//! Ignore patterns advance cursor-wise with the walk; a matching child is
//! skipped wholesale. Unreadable directories are reported and treated as
//! empty, so a single bad mount point cannot abort a scan.

use std::collections::BTreeSet;
use std::fs;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};

use crate::ignore::IgnoreSet;
use crate::paths::{self, PathKey};
use crate::pattern::{self, MatchOptions};
use crate::report;

const GLOBSTAR: &str = "**";

/// The result of expanding one read pattern.
#[derive(Clone, Debug, Default)]
pub struct ExpandedGroup {
    /// Longest wildcard-free prefix of the pattern.
    pub read_prefix: Utf8PathBuf,
    /// Matching paths relative to `read_prefix`, in filename order. The
    /// empty path denotes the prefix directory itself.
    pub relative_paths: BTreeSet<PathKey>,
}

impl ExpandedGroup {
    pub fn is_empty(&self) -> bool {
        self.relative_paths.is_empty()
    }
}

struct WalkFrame {
    path: Utf8PathBuf,
    segment: usize,
    cursors: Vec<usize>,
}

/// Expands `pattern` against the filesystem.
///
/// Source paths already produced by an earlier expansion are skipped and
/// recorded in `previous_read_paths`, so a file never lands in two groups.
///
/// # Errors
///
/// Only environmental failures (unresolvable working directory) error out;
/// unreadable directories degrade to warnings.
pub fn expand(
    pattern: &Utf8Path,
    ignores: &IgnoreSet,
    options: MatchOptions,
    previous_read_paths: &mut BTreeSet<PathKey>,
) -> Result<ExpandedGroup> {
    let pattern = absolute_pattern(pattern)?;
    let mut segments: Vec<String> = paths::segments(&pattern).map(str::to_string).collect();

    let synthesized = match segments.last() {
        Some(last) => !pattern::contains_wildcard(last, options),
        None => true,
    };
    if synthesized {
        segments.push(GLOBSTAR.to_string());
    }

    // Advance the read prefix through leading wildcard-free segments that
    // exist as directories.
    let mut read_prefix = Utf8PathBuf::from("/");
    let mut first_open = 0;
    while first_open < segments.len() {
        let segment = &segments[first_open];
        if segment == GLOBSTAR || pattern::contains_wildcard(segment, options) {
            break;
        }
        let candidate = read_prefix.join(segment);
        if !candidate.is_dir() {
            break;
        }
        read_prefix = candidate;
        first_open += 1;
    }

    let mut group = ExpandedGroup {
        read_prefix: read_prefix.clone(),
        relative_paths: BTreeSet::new(),
    };
    let Some(cursors) = ignores.cursors_below(&read_prefix, options) else {
        return Ok(group);
    };

    // A bare directory pattern mirrors its contents: the directory itself is
    // the empty relative path, walked with the synthesized `**` below it.
    if synthesized
        && first_open + 1 == segments.len()
        && previous_read_paths.insert(PathKey::new(read_prefix.clone()))
    {
        group.relative_paths.insert(PathKey::default());
    }

    let mut stack = vec![WalkFrame {
        path: read_prefix,
        segment: first_open,
        cursors,
    }];

    while let Some(frame) = stack.pop() {
        let is_globstar = segments[frame.segment] == GLOBSTAR;
        let emit = !is_globstar || frame.segment + 1 == segments.len();

        if is_globstar && frame.segment + 1 < segments.len() {
            // The ** also matches zero levels here.
            stack.push(WalkFrame {
                path: frame.path.clone(),
                segment: frame.segment + 1,
                cursors: frame.cursors.clone(),
            });
        }

        let entries = match fs::read_dir(&frame.path) {
            Ok(entries) => entries,
            Err(e) => {
                report::warn(format_args!("Cannot read \"{}\": {e}", frame.path));
                continue;
            }
        };
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let Ok(name) = entry.file_name().into_string() else {
                report::warn(format_args!(
                    "Skipping non UTF-8 name in \"{}\"",
                    frame.path
                ));
                continue;
            };
            if !is_globstar && !pattern::match_segment(&segments[frame.segment], &name, options) {
                continue;
            }
            let mut cursors = frame.cursors.clone();
            if ignores.step_all(&mut cursors, &name, options) {
                continue;
            }
            let child = frame.path.join(&name);
            if emit && previous_read_paths.insert(PathKey::new(child.clone())) {
                if let Ok(relative) = child.strip_prefix(&group.read_prefix) {
                    group.relative_paths.insert(PathKey::new(relative.to_path_buf()));
                }
            }
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir() && !t.is_symlink());
            if is_dir {
                let next = if is_globstar {
                    frame.segment
                } else {
                    frame.segment + 1
                };
                if next < segments.len() {
                    stack.push(WalkFrame {
                        path: child,
                        segment: next,
                        cursors,
                    });
                }
            }
        }
    }

    Ok(group)
}

/// Inserts every ancestor directory of each matched path, so a consumer
/// that renders trees sees parents before children. Insertion walks upward
/// and stops as soon as an ancestor is already present.
pub fn with_ancestors(mut group: ExpandedGroup) -> ExpandedGroup {
    let matched: Vec<Utf8PathBuf> = group
        .relative_paths
        .iter()
        .map(|k| k.as_path().to_path_buf())
        .collect();
    for path in matched {
        for ancestor in path.ancestors().skip(1) {
            if !group.relative_paths.insert(PathKey::new(ancestor.to_path_buf())) {
                break;
            }
        }
    }
    group
}

fn absolute_pattern(pattern: &Utf8Path) -> Result<Utf8PathBuf> {
    let text = pattern.as_str();
    let stripped = if text.len() > 1 && text.ends_with('/') {
        Utf8Path::new(&text[..text.len() - 1])
    } else {
        pattern
    };
    if stripped.is_absolute() {
        return Ok(stripped.to_path_buf());
    }
    let cwd = std::env::current_dir().context("cannot resolve working directory")?;
    let cwd = Utf8PathBuf::from_path_buf(cwd)
        .map_err(|p| anyhow::anyhow!("working directory is not UTF-8: {}", p.display()))?;
    Ok(paths::normalize(&cwd.join(stripped)))
}
