//! File equivalence checks with a persistent verdict cache.
//!
//! Two directories are equivalent when their final names match (they are
//! placeholders, not content). Two regular files are equivalent when their
//! sizes match and a byte-for-byte stream comparison agrees. Because a full
//! scan is expensive, verdicts are cached keyed by source path and reused
//! while both mtimes are unchanged; a 2-second tolerance absorbs
//! filesystems with coarse timestamp resolution (FAT32).
//!
//! The cache file is tagged with the mtime of the config file that produced
//! it. A different config mtime on load drops the whole cache, since a
//! config edit can change what "equivalent" pairs even exist. Corrupt cache
//! data is silently discarded.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use camino::Utf8Path;

/// Seconds of mtime slack tolerated before two timestamps count as
/// different.
const MTIME_TOLERANCE: i64 = 2;

const RECORD_END: u8 = 0x0A;
const PATH_END: u8 = 0x00;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CacheEntry {
    source_mtime: i64,
    dest_mtime: i64,
    equivalent: bool,
}

/// Equivalence oracle with its in-memory cache.
#[derive(Debug, Default)]
pub struct Oracle {
    entries: BTreeMap<String, CacheEntry>,
}

impl Oracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a cache file written for a config with mtime `config_mtime`.
    ///
    /// Returns `None` when the tag does not match (the config changed), and
    /// an empty oracle when the file is unreadable or corrupt.
    pub fn load(path: &Utf8Path, config_mtime: i64) -> Option<Self> {
        let Ok(bytes) = fs::read(path) else {
            return Some(Self::new());
        };
        if bytes.len() < 8 {
            return Some(Self::new());
        }
        let mut tag = [0_u8; 8];
        tag.copy_from_slice(&bytes[..8]);
        if i64::from_le_bytes(tag) != config_mtime {
            return None;
        }
        Some(Self {
            entries: parse_records(&bytes[8..]).unwrap_or_default(),
        })
    }

    /// Writes the cache tagged with the config mtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn save(&self, path: &Utf8Path, config_mtime: i64) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create cache directory \"{parent}\""))?;
        }
        let mut out = Vec::new();
        out.extend_from_slice(&config_mtime.to_le_bytes());
        for (source, entry) in &self.entries {
            out.extend_from_slice(source.as_bytes());
            out.push(PATH_END);
            out.extend_from_slice(&entry.source_mtime.to_le_bytes());
            out.extend_from_slice(&entry.dest_mtime.to_le_bytes());
            out.push(u8::from(entry.equivalent));
            out.push(RECORD_END);
        }
        fs::write(path, out).with_context(|| format!("cannot write cache file \"{path}\""))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decides whether `source` and `dest` hold identical content.
    ///
    /// Directories compare by final name. Missing paths and special files
    /// are never equivalent, and neither is an unreadable file (so it shows
    /// up as a modification rather than silently passing).
    pub fn equivalent(
        &mut self,
        source: &Utf8Path,
        dest: &Utf8Path,
        skip_cache: bool,
        fast_compare: bool,
    ) -> bool {
        let (Ok(source_meta), Ok(dest_meta)) = (fs::metadata(source), fs::metadata(dest)) else {
            return false;
        };
        if source_meta.is_dir() && dest_meta.is_dir() {
            return source.file_name() == dest.file_name();
        }
        if !source_meta.is_file() || !dest_meta.is_file() {
            return false;
        }

        let source_mtime = mtime_seconds(&source_meta);
        let dest_mtime = mtime_seconds(&dest_meta);

        if !skip_cache
            && let Some(entry) = self.entries.get(source.as_str())
            && within_tolerance(entry.source_mtime, source_mtime)
            && within_tolerance(entry.dest_mtime, dest_mtime)
        {
            return entry.equivalent;
        }

        if fast_compare {
            return within_tolerance(source_mtime, dest_mtime);
        }

        let equivalent = if source_meta.len() == dest_meta.len() {
            same_contents(source, dest).unwrap_or(false)
        } else {
            false
        };

        if !skip_cache {
            self.entries.insert(
                source.as_str().to_string(),
                CacheEntry {
                    source_mtime,
                    dest_mtime,
                    equivalent,
                },
            );
        }
        equivalent
    }
}

fn parse_records(mut bytes: &[u8]) -> Option<BTreeMap<String, CacheEntry>> {
    let mut entries = BTreeMap::new();
    while !bytes.is_empty() {
        let path_end = bytes.iter().position(|&b| b == PATH_END)?;
        let path = std::str::from_utf8(&bytes[..path_end]).ok()?.to_string();
        let rest = &bytes[path_end + 1..];
        if rest.len() < 18 || rest[17] != RECORD_END {
            return None;
        }
        let mut word = [0_u8; 8];
        word.copy_from_slice(&rest[..8]);
        let source_mtime = i64::from_le_bytes(word);
        word.copy_from_slice(&rest[8..16]);
        let dest_mtime = i64::from_le_bytes(word);
        let equivalent = match rest[16] {
            0 => false,
            1 => true,
            _ => return None,
        };
        entries.insert(
            path,
            CacheEntry {
                source_mtime,
                dest_mtime,
                equivalent,
            },
        );
        bytes = &rest[18..];
    }
    Some(entries)
}

/// Whole seconds since the Unix epoch, or 0 when the filesystem cannot say.
pub fn mtime_seconds(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or(0)
}

/// Mtime of a path in whole seconds, if it exists.
pub fn path_mtime_seconds(path: &Utf8Path) -> Option<i64> {
    fs::metadata(path).ok().map(|m| mtime_seconds(&m))
}

fn within_tolerance(a: i64, b: i64) -> bool {
    (a - b).abs() <= MTIME_TOLERANCE
}

fn same_contents(a: &Utf8Path, b: &Utf8Path) -> std::io::Result<bool> {
    let mut a = BufReader::new(File::open(a)?);
    let mut b = BufReader::new(File::open(b)?);
    let mut buf_a = [0_u8; 8192];
    let mut buf_b = [0_u8; 8192];
    loop {
        let read_a = read_full(&mut a, &mut buf_a)?;
        let read_b = read_full(&mut b, &mut buf_b)?;
        if read_a != read_b || buf_a[..read_a] != buf_b[..read_b] {
            return Ok(false);
        }
        if read_a == 0 {
            return Ok(true);
        }
    }
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests;
