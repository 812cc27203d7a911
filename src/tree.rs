//! The `tree` command: renders every tracked source under its common
//! parent directory, in the style of tree(1).
//!
//! Tracked directories print cyan and tracked files green; anything present
//! on disk but not tracked (including ignored entries) prints yellow.
//! Verbose mode appends the destination of each tracked file; prune mode
//! collapses subtrees containing nothing tracked into a `(...)` line.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs;

use anyhow::{Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};

use crate::config::Interpreter;
use crate::glob;
use crate::paths::{self, PathKey, cmp_filenames};
use crate::report::{self, Spinner};
use colored::Colorize;

#[derive(Clone, Copy, Debug, Default)]
pub struct TreeOptions {
    pub verbose: bool,
    pub count_only: bool,
    pub prune: bool,
}

#[derive(Default)]
struct TreeStats {
    directories: u64,
    files: u64,
    ignored_directories: u64,
    ignored_files: u64,
}

/// Expands the whole config and prints one tree per filesystem root.
///
/// # Errors
///
/// Returns config errors, and an error when a common parent path cannot be
/// listed at all.
pub fn print_tracked_tree(interp: &mut Interpreter, options: TreeOptions) -> Result<()> {
    let mut tracked: BTreeMap<PathKey, Utf8PathBuf> = BTreeMap::new();
    // Longest common parent among sources, per root path.
    let mut common_parents: BTreeMap<Utf8PathBuf, Utf8PathBuf> = BTreeMap::new();
    let mut previous_read_paths = std::collections::BTreeSet::new();
    let mut spinner = Spinner::new("Scanning directory structure...");
    let mut scanned = 0_usize;

    while let Some(assignment) = interp.next_assignment()? {
        let group = glob::expand(
            &assignment.read_pattern,
            &interp.ignores,
            interp.options,
            &mut previous_read_paths,
        )?;
        let group = glob::with_ancestors(group);
        scanned += group.relative_paths.len();

        for relative in &group.relative_paths {
            spinner.tick();
            let relative = relative.as_path();
            let source = paths::join_relative(&group.read_prefix, relative);
            let dest = paths::join_relative(&assignment.write_prefix, relative);
            if tracked.insert(PathKey::new(source.clone()), dest).is_some() {
                report::warn(format_args!("Skipping duplicate read path: {source}"));
            }

            let root = root_of(&source);
            match common_parents.entry(root) {
                Entry::Vacant(slot) => {
                    slot.insert(source);
                }
                Entry::Occupied(mut slot) => {
                    let narrowed = common_parent(slot.get(), &source);
                    slot.insert(narrowed);
                }
            }
        }
    }
    spinner.finish(scanned);

    if tracked.is_empty() {
        println!("No files or directories found to track.");
        return Ok(());
    }

    let mut first = true;
    for common in common_parents.values() {
        if !first {
            println!();
        }
        first = false;
        let search = if common.is_file() {
            common.parent().map_or_else(|| common.clone(), Utf8Path::to_path_buf)
        } else {
            common.clone()
        };
        print_tree_root(&search, &tracked, options)?;
    }
    Ok(())
}

fn root_of(path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        Utf8PathBuf::from("/")
    } else {
        Utf8PathBuf::new()
    }
}

/// Truncates `common` to the longest leading path both arguments share.
fn common_parent(common: &Utf8Path, other: &Utf8Path) -> Utf8PathBuf {
    let mut kept = Utf8PathBuf::new();
    let mut held = common.components();
    let mut candidates = other.components();
    loop {
        match (held.next(), candidates.next()) {
            (Some(a), Some(b)) if a == b => kept.push(a),
            _ => break,
        }
    }
    kept
}

fn print_tree_root(
    search: &Utf8Path,
    tracked: &BTreeMap<PathKey, Utf8PathBuf>,
    options: TreeOptions,
) -> Result<()> {
    if !search.exists() {
        return Err(anyhow!("\"{search}\": Unable to find path."));
    }
    if !search.is_dir() {
        return Err(anyhow!("\"{search}\": No sub-directories found."));
    }
    println!("{}", search.as_str().cyan());
    let mut stats = TreeStats::default();
    print_tree_level(search, tracked, options, !options.count_only, "", &mut stats);

    println!();
    println!("{} directories, {} files", stats.directories, stats.files);
    println!(
        "{} ignored directories, {} ignored files",
        stats.ignored_directories, stats.ignored_files
    );
    Ok(())
}

fn print_tree_level(
    dir: &Utf8Path,
    tracked: &BTreeMap<PathKey, Utf8PathBuf>,
    options: TreeOptions,
    print_output: bool,
    prefix: &str,
    stats: &mut TreeStats,
) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if print_output {
                println!("{}", format!("{prefix}Error: {e}: \"{dir}\"").red());
            }
            return;
        }
    };
    let mut names: Vec<(String, bool)> = entries
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            entry.file_name().into_string().ok().map(|n| (n, is_dir))
        })
        .collect();
    names.sort_by(|a, b| cmp_filenames(&a.0, &b.0));

    if names.is_empty() {
        if options.verbose && print_output
            && let Some(dest) = tracked.get(&PathKey::new(dir.to_path_buf()))
        {
            println!("{prefix} -> {dest}");
        }
        return;
    }

    let mut print_output = print_output;
    if options.prune {
        let any_tracked = names
            .iter()
            .any(|(name, _)| tracked.contains_key(&PathKey::new(dir.join(name))));
        if !any_tracked && print_output {
            println!("{prefix}'-- {}", "(...)".yellow());
            print_output = false;
        }
    }

    for (index, (name, is_dir)) in names.iter().enumerate() {
        let path = dir.join(name);
        let is_tracked = tracked.contains_key(&PathKey::new(path.clone()));
        let is_last = index + 1 == names.len();
        let branch = if is_last { "'-- " } else { "|-- " };
        let deeper = if is_last { "    " } else { "|   " };

        if *is_dir {
            stats.directories += 1;
            if !is_tracked {
                stats.ignored_directories += 1;
            }
            if print_output {
                let painted = if is_tracked {
                    name.cyan()
                } else {
                    name.yellow()
                };
                println!("{prefix}{branch}{painted}");
            }
            print_tree_level(
                &path,
                tracked,
                options,
                print_output,
                &format!("{prefix}{deeper}"),
                stats,
            );
        } else {
            stats.files += 1;
            if !is_tracked {
                stats.ignored_files += 1;
            }
            if print_output {
                let painted = if is_tracked {
                    name.green()
                } else {
                    name.yellow()
                };
                println!("{prefix}{branch}{painted}");
                if options.verbose
                    && is_tracked
                    && let Some(dest) = tracked.get(&PathKey::new(path.clone()))
                {
                    println!("{prefix}{deeper} -> {dest}");
                }
            }
        }
    }
}
