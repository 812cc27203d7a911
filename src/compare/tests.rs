#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use filetime::{FileTime, set_file_mtime};
use tempfile::TempDir;

use super::*;

fn utf8(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().canonicalize().unwrap()).unwrap()
}

fn write(path: &Utf8Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn set_mtime(path: &Utf8Path, seconds: i64) {
    set_file_mtime(path, FileTime::from_unix_time(seconds, 0)).unwrap();
}

#[test]
fn identical_files_are_equivalent() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    write(&root.join("a"), b"same contents");
    write(&root.join("b"), b"same contents");
    let mut oracle = Oracle::new();
    assert!(oracle.equivalent(&root.join("a"), &root.join("b"), true, false));
}

#[test]
fn different_contents_same_size_differ() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    write(&root.join("a"), b"contents one");
    write(&root.join("b"), b"contents two");
    let mut oracle = Oracle::new();
    assert!(!oracle.equivalent(&root.join("a"), &root.join("b"), true, false));
}

#[test]
fn different_sizes_differ_without_reading() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    write(&root.join("a"), b"short");
    write(&root.join("b"), b"much longer contents");
    let mut oracle = Oracle::new();
    assert!(!oracle.equivalent(&root.join("a"), &root.join("b"), true, false));
}

#[test]
fn missing_path_is_never_equivalent() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    write(&root.join("a"), b"x");
    let mut oracle = Oracle::new();
    assert!(!oracle.equivalent(&root.join("a"), &root.join("absent"), true, false));
    assert!(!oracle.equivalent(&root.join("absent"), &root.join("a"), true, false));
}

#[test]
fn directories_compare_by_final_name() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    fs::create_dir_all(root.join("src/data")).unwrap();
    fs::create_dir_all(root.join("dst/data")).unwrap();
    fs::create_dir_all(root.join("dst/other")).unwrap();
    let mut oracle = Oracle::new();
    assert!(oracle.equivalent(&root.join("src/data"), &root.join("dst/data"), true, false));
    assert!(!oracle.equivalent(&root.join("src/data"), &root.join("dst/other"), true, false));
}

#[test]
fn file_and_directory_are_not_equivalent() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    write(&root.join("a"), b"x");
    fs::create_dir_all(root.join("b")).unwrap();
    let mut oracle = Oracle::new();
    assert!(!oracle.equivalent(&root.join("a"), &root.join("b"), true, false));
}

#[test]
fn fast_compare_trusts_mtimes() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    write(&root.join("a"), b"one contents");
    write(&root.join("b"), b"two contents");
    set_mtime(&root.join("a"), 1_600_000_000);
    set_mtime(&root.join("b"), 1_600_000_001);
    let mut oracle = Oracle::new();
    // Within the 2 s tolerance the contents are never read.
    assert!(oracle.equivalent(&root.join("a"), &root.join("b"), true, true));
    set_mtime(&root.join("b"), 1_600_000_100);
    assert!(!oracle.equivalent(&root.join("a"), &root.join("b"), true, true));
}

#[test]
fn cached_verdict_is_reused_while_mtimes_hold() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    write(&root.join("a"), b"same");
    write(&root.join("b"), b"same");
    set_mtime(&root.join("a"), 1_600_000_000);
    set_mtime(&root.join("b"), 1_600_000_000);

    let mut oracle = Oracle::new();
    assert!(oracle.equivalent(&root.join("a"), &root.join("b"), false, false));
    assert_eq!(oracle.len(), 1);

    // Change the bytes but keep both mtimes: the cached verdict wins.
    write(&root.join("b"), b"diff");
    set_mtime(&root.join("b"), 1_600_000_000);
    assert!(oracle.equivalent(&root.join("a"), &root.join("b"), false, false));
    // Skipping the cache forces a real comparison.
    assert!(!oracle.equivalent(&root.join("a"), &root.join("b"), true, false));
}

#[test]
fn touched_dest_invalidates_the_entry() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    write(&root.join("a"), b"same");
    write(&root.join("b"), b"same");
    set_mtime(&root.join("a"), 1_600_000_000);
    set_mtime(&root.join("b"), 1_600_000_000);

    let mut oracle = Oracle::new();
    assert!(oracle.equivalent(&root.join("a"), &root.join("b"), false, false));

    write(&root.join("b"), b"diff");
    set_mtime(&root.join("b"), 1_600_000_100);
    assert!(!oracle.equivalent(&root.join("a"), &root.join("b"), false, false));
}

#[test]
fn cache_roundtrips_through_disk() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    write(&root.join("a"), b"same");
    write(&root.join("b"), b"same");
    set_mtime(&root.join("a"), 1_600_000_000);
    set_mtime(&root.join("b"), 1_600_000_000);

    let mut oracle = Oracle::new();
    oracle.equivalent(&root.join("a"), &root.join("b"), false, false);
    let cache = root.join(".cachedir/test.cache");
    oracle.save(&cache, 42).unwrap();

    let loaded = Oracle::load(&cache, 42).unwrap();
    assert_eq!(loaded.len(), 1);

    // Reloaded verdicts short-circuit the comparison.
    let mut loaded = loaded;
    write(&root.join("b"), b"diff");
    set_mtime(&root.join("b"), 1_600_000_000);
    assert!(loaded.equivalent(&root.join("a"), &root.join("b"), false, false));
}

#[test]
fn changed_config_mtime_drops_the_cache() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    write(&root.join("a"), b"same");
    write(&root.join("b"), b"same");
    let mut oracle = Oracle::new();
    oracle.equivalent(&root.join("a"), &root.join("b"), false, false);
    let cache = root.join("test.cache");
    oracle.save(&cache, 42).unwrap();

    assert!(Oracle::load(&cache, 43).is_none());
}

#[test]
fn corrupt_cache_is_discarded_silently() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    let cache = root.join("test.cache");

    // Valid tag, garbage records.
    let mut bytes = 42_i64.to_le_bytes().to_vec();
    bytes.extend_from_slice(b"/some/path\x00truncated");
    fs::write(&cache, bytes).unwrap();
    let oracle = Oracle::load(&cache, 42).unwrap();
    assert!(oracle.is_empty());

    // Too short for even the tag.
    fs::write(&cache, b"abc").unwrap();
    let oracle = Oracle::load(&cache, 42).unwrap();
    assert!(oracle.is_empty());

    // Missing file loads as empty.
    let oracle = Oracle::load(&root.join("absent.cache"), 42).unwrap();
    assert!(oracle.is_empty());
}

#[test]
fn fast_compare_does_not_populate_the_cache() {
    let dir = TempDir::new().unwrap();
    let root = utf8(&dir);
    write(&root.join("a"), b"same");
    write(&root.join("b"), b"same");
    let mut oracle = Oracle::new();
    oracle.equivalent(&root.join("a"), &root.join("b"), false, true);
    assert!(oracle.is_empty());
}
