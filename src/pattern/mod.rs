//! Segment-level glob matching.
//!
//! Implements the portable subset of `fnmatch(3)`: `*`, `?`, and bracket
//! classes with ranges and `!`/`^` inversion. A segment never contains a
//! path separator; multi-segment patterns are handled by [`match_path`] and
//! the recursive `**` token is a walker concern, not a matcher one.
//!
//! Wildcards: `?` matches any single character, `*` any run of characters
//! (both refuse a leading `.` unless hidden matching is on), `[abc]`/
//! `[a-z]`/`[!a-z]` match one character against a class. Unlike Unix
//! fnmatch, a class may match a leading dot, and a malformed class falls
//! back to literal text (see `match_class`).

use std::path::MAIN_SEPARATOR;

/// Matching switches controlled by `set` commands in a config stream.
///
/// Threaded through every call site; a `set` mid-stream only affects the
/// assignments and ignore checks that follow it.
#[derive(Clone, Copy, Debug)]
pub struct MatchOptions {
    /// When off, segments compare as literal text (`**` keeps working).
    pub glob: bool,
    /// When off, `*` and `?` refuse to match a leading `.` in a name.
    pub match_hidden: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            glob: true,
            match_hidden: true,
        }
    }
}

/// Matches a single path segment against a single pattern segment.
pub fn match_segment(pattern: &str, text: &str, options: MatchOptions) -> bool {
    if !options.glob {
        return pattern == text;
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    if !options.match_hidden
        && matches!(pattern.first(), Some('*' | '?'))
        && text.first() == Some(&'.')
    {
        return false;
    }
    match_chars(&pattern, &text)
}

/// Matches a full path against a full pattern, segment by segment.
///
/// Both sides are split at the separator and must have the same number of
/// segments; `**` is not interpreted here.
pub fn match_path(pattern: &str, text: &str, options: MatchOptions) -> bool {
    let mut pattern_segments = pattern.split(MAIN_SEPARATOR);
    let mut text_segments = text.split(MAIN_SEPARATOR);
    loop {
        match (pattern_segments.next(), text_segments.next()) {
            (Some(p), Some(t)) => {
                if !match_segment(p, t, options) {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Whether a string contains glob wildcards: `*`, `?`, or a bracket class
/// with a closing `]` far enough along to hold at least one member.
pub fn contains_wildcard(pattern: &str, options: MatchOptions) -> bool {
    if !options.glob {
        return false;
    }
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' | '?' => return true,
            '[' => {
                if chars.get(i + 2..).is_some_and(|rest| rest.contains(&']')) {
                    return true;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    false
}

fn match_chars(mut pattern: &[char], mut text: &[char]) -> bool {
    while let Some(&t) = text.first() {
        match pattern.first() {
            Some('*') => {
                while pattern.first() == Some(&'*') {
                    pattern = &pattern[1..];
                }
                if match_chars(pattern, text) {
                    return true;
                }
                while let Some((_, rest)) = text.split_first() {
                    text = rest;
                    if match_chars(pattern, text) {
                        return true;
                    }
                }
                return false;
            }
            Some('?') => {
                pattern = &pattern[1..];
                text = &text[1..];
            }
            Some('[') => match match_class(&pattern[1..], text) {
                ClassOutcome::Advance {
                    pattern_used,
                    text_used,
                } => {
                    pattern = &pattern[1 + pattern_used..];
                    text = &text[text_used..];
                }
                // No closing bracket: the remaining pattern is literal text.
                ClassOutcome::LiteralRemainder => return pattern == text,
                ClassOutcome::NoMatch => return false,
            },
            Some(&p) if p == t => {
                pattern = &pattern[1..];
                text = &text[1..];
            }
            _ => return false,
        }
    }

    while pattern.first() == Some(&'*') {
        pattern = &pattern[1..];
    }
    pattern.is_empty()
}

enum ClassOutcome {
    /// The class matched; consume this much pattern (after the `[`) and text.
    Advance {
        pattern_used: usize,
        text_used: usize,
    },
    /// No closing `]`: degrade to exact-text comparison of the remainder.
    LiteralRemainder,
    NoMatch,
}

/// Matches one bracket class. `class` starts just after the `[`.
///
/// A `!` or `^` in first position inverts. The scan for the closing `]`
/// starts after the first member position, so a leading `]` is a literal
/// member. Degenerate forms kept from the original matcher: `[]` with no
/// later `]` requires the text to contain a literal `[]`; `[!]`/`[^]` with
/// no later `]` require the literal inverter character.
fn match_class(class: &[char], text: &[char]) -> ClassOutcome {
    let mut i = 0;
    let invert = matches!(class.first(), Some('!' | '^'));
    if invert {
        i += 1;
    }
    if i >= class.len() {
        return ClassOutcome::LiteralRemainder;
    }

    let Some(close) = class[i + 1..].iter().position(|&c| c == ']').map(|p| p + i + 1) else {
        if class[i] != ']' {
            return ClassOutcome::LiteralRemainder;
        }
        if invert {
            // `[!]` matches the inverter character itself.
            let inverter = class[0];
            return if text.first() == Some(&inverter) {
                ClassOutcome::Advance {
                    pattern_used: 2,
                    text_used: 1,
                }
            } else {
                ClassOutcome::NoMatch
            };
        }
        // `[]` matches the two literal characters `[]`.
        return if text.first() == Some(&'[') && text.get(1) == Some(&']') {
            ClassOutcome::Advance {
                pattern_used: 1,
                text_used: 2,
            }
        } else {
            ClassOutcome::NoMatch
        };
    };

    let Some(&t) = text.first() else {
        return ClassOutcome::NoMatch;
    };
    if class_contains(&class[i..close], t) != invert {
        ClassOutcome::Advance {
            pattern_used: close + 1,
            text_used: 1,
        }
    } else {
        ClassOutcome::NoMatch
    }
}

/// Whether `t` is covered by the class members, honoring `X-Y` ranges.
/// A `-` in first or last position is a literal member; an empty range
/// (`X > Y`) covers nothing.
fn class_contains(members: &[char], t: char) -> bool {
    let mut hit = false;
    let mut k = 0;
    while k < members.len() {
        if k + 2 < members.len() && members[k + 1] == '-' {
            if members[k] <= t && t <= members[k + 2] {
                hit = true;
            }
            k += 3;
        } else {
            if members[k] == t {
                hit = true;
            }
            k += 1;
        }
    }
    hit
}
