//! Path values and ordering shared across the pipeline.
//!
//! All core path handling is UTF-8 (`camino`); conversion to `std::path`
//! happens only at filesystem call sites. Change collections and destination
//! checklists order paths case-insensitively, which is a behavioral contract:
//! rename detection and deletion ordering both depend on it.

use std::cmp::Ordering;
use std::fmt;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Compares two path strings ignoring ASCII case, so `A.txt` groups with
/// `a.txt` in listings and change sets.
pub fn cmp_filenames(lhs: &str, rhs: &str) -> Ordering {
    let lhs = lhs.bytes().map(|b| b.to_ascii_lowercase());
    let rhs = rhs.bytes().map(|b| b.to_ascii_lowercase());
    lhs.cmp(rhs)
}

/// A path wrapper whose ordering (and therefore set identity) is
/// case-insensitive over the full path string.
#[derive(Clone, Debug, Default)]
pub struct PathKey(Utf8PathBuf);

impl PathKey {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Utf8Path {
        &self.0
    }

    pub fn into_path(self) -> Utf8PathBuf {
        self.0
    }
}

impl From<Utf8PathBuf> for PathKey {
    fn from(path: Utf8PathBuf) -> Self {
        Self(path)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Ord for PathKey {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_filenames(self.0.as_str(), other.0.as_str())
    }
}

impl PartialOrd for PathKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PathKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PathKey {}

/// Collapses `.` and `..` lexically, without touching the filesystem.
///
/// Leading `..` components of a relative path are preserved; `..` directly
/// under the root is dropped, matching lexical normalization rules.
pub fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut components = path.components().peekable();
    let mut out = if let Some(c @ Utf8Component::Prefix(..)) = components.peek() {
        let buf = Utf8PathBuf::from(c.as_str());
        components.next();
        buf
    } else {
        Utf8PathBuf::new()
    };

    for component in components {
        match component {
            Utf8Component::Prefix(..) | Utf8Component::RootDir => out.push(component),
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => match out.components().next_back() {
                Some(Utf8Component::Normal(_)) => {
                    out.pop();
                }
                Some(Utf8Component::RootDir | Utf8Component::Prefix(..)) => {}
                _ => out.push(".."),
            },
            Utf8Component::Normal(c) => out.push(c),
        }
    }

    out
}

/// Parses a path as written in a config file or on the command line:
/// backslashes are accepted as separators, the result is lexically
/// normalized, and a trailing separator survives normalization (it is
/// significant to ignore patterns).
pub fn from_user_input(raw: &str) -> Utf8PathBuf {
    let canonical = raw.replace('\\', "/");
    let trailing = canonical.len() > 1 && canonical.ends_with('/');
    let normalized = normalize(Utf8Path::new(&canonical));
    if trailing && !normalized.as_str().is_empty() && !normalized.as_str().ends_with('/') {
        Utf8PathBuf::from(format!("{normalized}/"))
    } else {
        normalized
    }
}

/// The named segments of a path, root excluded.
pub fn segments(path: &Utf8Path) -> impl Iterator<Item = &str> {
    path.components().filter_map(|c| match c {
        Utf8Component::Normal(s) => Some(s),
        _ => None,
    })
}

/// Joins a relative path onto a prefix; an empty relative path denotes the
/// prefix itself.
pub fn join_relative(prefix: &Utf8Path, relative: &Utf8Path) -> Utf8PathBuf {
    if relative.as_str().is_empty() {
        prefix.to_path_buf()
    } else {
        prefix.join(relative)
    }
}
