//! Ignore patterns evaluated incrementally during tree walks.
//!
//! Each pattern carries a cursor into its own segment sequence. Walking one
//! level deeper advances every cursor by one segment: a match advances the
//! cursor, a miss rewinds it to the nearest earlier `**` (or exhausts it).
//! This keeps the per-child cost O(1) instead of re-matching the whole path
//! at every depth; the price is a cursor vector cloned per walk frame.
//!
//! A relative pattern may match anywhere in the tree (it behaves as if
//! prefixed with `**`); an absolute pattern is anchored at the root. A
//! pattern with a trailing separator, or ending in `**`, covers the whole
//! subtree below its match.

use camino::{Utf8Path, Utf8PathBuf};

use crate::paths;
use crate::pattern::{self, MatchOptions};

const GLOBSTAR: &str = "**";

/// One ignore pattern, pre-split into match segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IgnorePattern {
    raw: Utf8PathBuf,
    segments: Vec<String>,
}

impl IgnorePattern {
    fn new(raw: Utf8PathBuf) -> Self {
        let text = raw.as_str();
        let (anchored, body) = match text.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let mut segments = Vec::new();
        if !anchored {
            segments.push(GLOBSTAR.to_string());
        }
        segments.extend(body.split('/').map(str::to_string));
        Self { raw, segments }
    }

    /// Advances this pattern's cursor by one path segment.
    ///
    /// Returns true when the pattern is now fully consumed, i.e. the walk
    /// position (and everything below it, for a trailing `**` or separator)
    /// is ignored.
    fn step(&self, cursor: &mut usize, segment: &str, options: MatchOptions) -> bool {
        let segs = &self.segments;
        if *cursor >= segs.len() {
            return false;
        }
        let mut at = *cursor;
        while at < segs.len() && segs[at] == GLOBSTAR {
            at += 1;
        }
        if at >= segs.len() || (Self::is_last(segs, at) && segs[at].is_empty()) {
            // A trailing ** consumed the remainder; the subtree is ignored.
            *cursor = at;
            return true;
        }
        if pattern::match_segment(&segs[at], segment, options) {
            *cursor = at + 1;
            *cursor >= segs.len() || (Self::is_last(segs, *cursor) && segs[*cursor].is_empty())
        } else {
            match segs[..at].iter().rposition(|s| s == GLOBSTAR) {
                Some(star) => *cursor = star,
                None => *cursor = segs.len(),
            }
            false
        }
    }

    fn is_last(segs: &[String], index: usize) -> bool {
        index + 1 == segs.len()
    }
}

/// The set of active ignore patterns, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct IgnoreSet {
    patterns: Vec<IgnorePattern>,
}

impl IgnoreSet {
    pub fn add(&mut self, path: Utf8PathBuf) {
        self.patterns.push(IgnorePattern::new(path));
    }

    /// Removes the pattern that was declared with exactly `path`.
    pub fn remove(&mut self, path: &Utf8Path) -> bool {
        match self.patterns.iter().position(|p| p.raw == path) {
            Some(index) => {
                self.patterns.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Fresh cursors for a walk starting at the filesystem root.
    pub fn cursors(&self) -> Vec<usize> {
        vec![0; self.patterns.len()]
    }

    /// Steps every cursor by one segment; true when any pattern matched,
    /// meaning the walk position is ignored.
    pub fn step_all(&self, cursors: &mut [usize], segment: &str, options: MatchOptions) -> bool {
        let mut ignored = false;
        for (pattern, cursor) in self.patterns.iter().zip(cursors.iter_mut()) {
            if pattern.step(cursor, segment, options) {
                ignored = true;
            }
        }
        ignored
    }

    /// Cursors pre-stepped over a walk root below the filesystem root.
    /// Returns `None` when the root itself is already ignored.
    pub fn cursors_below(&self, root: &Utf8Path, options: MatchOptions) -> Option<Vec<usize>> {
        let mut cursors = self.cursors();
        for segment in paths::segments(root) {
            if self.step_all(&mut cursors, segment, options) {
                return None;
            }
        }
        Some(cursors)
    }

    /// Runs a fresh cursor over the whole path, root first.
    pub fn is_ignored(&self, path: &Utf8Path, options: MatchOptions) -> bool {
        self.cursors_below(path, options).is_none()
    }
}
