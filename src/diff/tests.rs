#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

use super::*;
use crate::apply;

fn utf8(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().canonicalize().unwrap()).unwrap()
}

fn touch(path: &Utf8Path, contents: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn write_config(root: &Utf8Path, contents: &str) -> Utf8PathBuf {
    let path = root.join("backup.conf");
    fs::write(&path, contents).unwrap();
    path
}

fn scan(config: &Utf8Path) -> (ChangeSet, usize) {
    let mut interp = Interpreter::open(config).unwrap();
    let mut oracle = Oracle::new();
    scan_changes(&mut interp, &mut oracle, ScanOptions::default(), &mut || {}).unwrap()
}

fn additions(changes: &ChangeSet) -> Vec<(String, String)> {
    changes
        .additions
        .iter()
        .map(|p| (p.source.to_string(), p.dest.to_string()))
        .collect()
}

#[test]
fn fresh_backup_lists_everything_as_additions() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    touch(&root.join("src/a/b.txt"), b"b");
    touch(&root.join("src/a/c.txt"), b"c");
    let config = write_config(
        &root,
        &format!("root SRC {root}/src\nroot DST {root}/dst\nin DST add SRC\n"),
    );

    let (changes, scanned) = scan(&config);
    assert_eq!(scanned, 4);
    assert_eq!(
        additions(&changes),
        vec![
            (format!("{root}/src"), format!("{root}/dst")),
            (format!("{root}/src/a"), format!("{root}/dst/a")),
            (format!("{root}/src/a/b.txt"), format!("{root}/dst/a/b.txt")),
            (format!("{root}/src/a/c.txt"), format!("{root}/dst/a/c.txt")),
        ]
    );
    assert!(changes.deletions.is_empty());
    assert!(changes.modifications.is_empty());
    assert!(changes.renames.is_empty());
}

#[test]
fn matching_destination_yields_empty_change_set() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    touch(&root.join("src/a/b.txt"), b"same");
    touch(&root.join("dst/a/b.txt"), b"same");
    let config = write_config(&root, &format!("in {root}/dst add {root}/src\n"));

    let (changes, _) = scan(&config);
    assert!(changes.is_empty(), "unexpected changes: {changes:?}");
}

#[test]
fn changed_contents_become_modifications() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    touch(&root.join("src/f.txt"), b"new version");
    touch(&root.join("dst/f.txt"), b"old version");
    let config = write_config(&root, &format!("in {root}/dst add {root}/src\n"));

    let (changes, _) = scan(&config);
    assert!(changes.additions.is_empty());
    assert_eq!(changes.modifications.len(), 1);
    let pair = changes.modifications.iter().next().unwrap();
    assert_eq!(pair.dest, root.join("dst/f.txt"));
}

#[test]
fn stray_destination_entries_become_deletions() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    touch(&root.join("src/keepme.txt"), b"k");
    touch(&root.join("dst/keepme.txt"), b"k");
    touch(&root.join("dst/stray/deep.txt"), b"s");
    let config = write_config(&root, &format!("in {root}/dst add {root}/src\n"));

    let (changes, _) = scan(&config);
    let deleted: Vec<String> = changes.deletions.iter().map(ToString::to_string).collect();
    assert_eq!(
        deleted,
        vec![format!("{root}/dst/stray"), format!("{root}/dst/stray/deep.txt")]
    );
}

#[test]
fn pure_rename_is_detected() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    touch(&root.join("src/b.txt"), b"identical bytes");
    touch(&root.join("dst/a.txt"), b"identical bytes");
    let config = write_config(&root, &format!("in {root}/dst add {root}/src\n"));

    let (changes, _) = scan(&config);
    assert!(changes.additions.is_empty(), "got {changes:?}");
    assert!(changes.deletions.is_empty(), "got {changes:?}");
    assert_eq!(changes.renames.len(), 1);
    let rename = changes.renames.iter().next().unwrap();
    assert_eq!(rename.source, root.join("dst/a.txt"));
    assert_eq!(rename.dest, root.join("dst/b.txt"));
}

#[test]
fn rename_requires_equal_contents() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    touch(&root.join("src/b.txt"), b"same length A");
    touch(&root.join("dst/a.txt"), b"same length B");
    let config = write_config(&root, &format!("in {root}/dst add {root}/src\n"));

    let (changes, _) = scan(&config);
    assert!(changes.renames.is_empty());
    assert_eq!(changes.additions.len(), 1);
    assert_eq!(changes.deletions.len(), 1);
}

#[test]
fn directories_never_rename() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    fs::create_dir_all(root.join("src/newname")).unwrap();
    fs::create_dir_all(root.join("dst/oldname")).unwrap();
    let config = write_config(&root, &format!("in {root}/dst add {root}/src\n"));

    let (changes, _) = scan(&config);
    assert!(changes.renames.is_empty());
    assert_eq!(changes.additions.len(), 1);
    assert_eq!(changes.deletions.len(), 1);
}

#[test]
fn ignored_subtree_is_protected_from_deletion() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    touch(&root.join("src/data.txt"), b"d");
    touch(&root.join("dst/data.txt"), b"d");
    touch(&root.join("dst/keep/important.bin"), b"precious");
    let config = write_config(
        &root,
        &format!("ignore keep\nin {root}/dst add {root}/src\n"),
    );

    let (changes, _) = scan(&config);
    assert!(changes.is_empty(), "got {changes:?}");
    assert!(root.join("dst/keep/important.bin").is_file());
}

#[test]
fn ignore_protects_ancestors_of_the_ignored_entry() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    touch(&root.join("src/data.txt"), b"d");
    touch(&root.join("dst/data.txt"), b"d");
    touch(&root.join("dst/nest/inner/keep"), b"precious");
    touch(&root.join("dst/nest/trash.txt"), b"junk");
    let config = write_config(
        &root,
        &format!("ignore keep\nin {root}/dst add {root}/src\n"),
    );

    let (changes, _) = scan(&config);
    let deleted: Vec<String> = changes.deletions.iter().map(ToString::to_string).collect();
    // nest and nest/inner shelter the ignored file; the sibling goes.
    assert_eq!(deleted, vec![format!("{root}/dst/nest/trash.txt")]);
}

#[test]
fn missing_destination_root_is_created_during_scan() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    touch(&root.join("src/f.txt"), b"f");
    let config = write_config(&root, &format!("in {root}/dst add {root}/src\n"));

    let (changes, _) = scan(&config);
    assert!(root.join("dst").is_dir());
    // The new root itself is among the additions.
    assert!(
        additions(&changes).contains(&(format!("{root}/src"), format!("{root}/dst")))
    );
}

#[test]
fn second_scan_after_apply_is_empty() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    touch(&root.join("src/a/b.txt"), b"b");
    touch(&root.join("src/a/c.txt"), b"c");
    touch(&root.join("src/top.txt"), b"t");
    touch(&root.join("dst/stale.txt"), b"x");
    let config = write_config(&root, &format!("in {root}/dst add {root}/src\n"));

    let (changes, _) = scan(&config);
    assert_eq!(apply::apply_changes(&changes, &mut |_| {}), 0);

    let (after, _) = scan(&config);
    assert!(after.is_empty(), "re-scan found {after:?}");
}

#[test]
fn multiple_groups_share_one_destination_checklist() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    touch(&root.join("one/a.txt"), b"a");
    touch(&root.join("two/b.txt"), b"b");
    touch(&root.join("dst/a.txt"), b"a");
    touch(&root.join("dst/b.txt"), b"b");
    let config = write_config(
        &root,
        &format!("in {root}/dst\n    add {root}/one/a.txt\n    add {root}/two/b.txt\n"),
    );

    let (changes, _) = scan(&config);
    assert!(changes.is_empty(), "got {changes:?}");
}

#[test]
fn globbed_sources_do_not_claim_unmatched_destinations() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    touch(&root.join("src/x.txt"), b"x");
    touch(&root.join("src/skip.bin"), b"s");
    touch(&root.join("dst/x.txt"), b"x");
    touch(&root.join("dst/skip.bin"), b"s");
    let config = write_config(&root, &format!("in {root}/dst add {root}/src/*.txt\n"));

    let (changes, _) = scan(&config);
    // skip.bin is unclaimed at the destination and marked for deletion.
    let deleted: Vec<String> = changes.deletions.iter().map(ToString::to_string).collect();
    assert_eq!(deleted, vec![format!("{root}/dst/skip.bin")]);
}

#[test]
fn scan_error_on_bad_config_line() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    touch(&root.join("src/f"), b"f");
    let config = write_config(&root, &format!("in {root}/dst add {root}/src\nnonsense\n"));

    let mut interp = Interpreter::open(&config).unwrap();
    let mut oracle = Oracle::new();
    let err = scan_changes(&mut interp, &mut oracle, ScanOptions::default(), &mut || {});
    assert!(err.is_err());
}
