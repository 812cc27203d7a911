//! The backup configuration language.
//!
//! A config file is a newline-delimited command stream: `root` declares a
//! path alias, `ignore`/`include` maintain the ignore set, `set` flips
//! matching options, and `in`/`add` emit (write prefix, read pattern)
//! assignments. Blank lines and `#` comments are skipped. Paths containing
//! spaces must be double-quoted; both `/` and `\` work as separators.
//!
//! The interpreter is a lazy cursor: [`Interpreter::next_assignment`] parses
//! only as far as the next assignment, so expansion work is interleaved with
//! parsing and an error on a later line costs nothing until reached. Any
//! syntax or semantic error aborts the stream with a positional
//! `"<file>" at line N: <reason>` diagnostic.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};

use anyhow::{Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};

use crate::ignore::IgnoreSet;
use crate::paths;
use crate::pattern::MatchOptions;

/// One `(write prefix, read pattern)` pair emitted by the config stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub write_prefix: Utf8PathBuf,
    pub read_pattern: Utf8PathBuf,
}

/// Streaming interpreter over one config file.
#[derive(Debug)]
pub struct Interpreter {
    lines: Lines<BufReader<File>>,
    file_label: String,
    line_number: u32,
    aliases: BTreeMap<String, Utf8PathBuf>,
    write_prefix: Option<Utf8PathBuf>,
    /// Ignore patterns declared so far; grows as the stream is consumed.
    pub ignores: IgnoreSet,
    /// Matching options as of the current stream position.
    pub options: MatchOptions,
}

impl Interpreter {
    /// Opens a config file for streaming interpretation.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened for reading.
    pub fn open(path: &Utf8Path) -> Result<Self> {
        let file =
            File::open(path).map_err(|_| anyhow!("\"{path}\": Unable to open file for reading."))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            file_label: path.to_string(),
            line_number: 0,
            aliases: BTreeMap::new(),
            write_prefix: None,
            ignores: IgnoreSet::default(),
            options: MatchOptions::default(),
        })
    }

    /// Advances the stream to the next assignment, or `None` at end of file.
    ///
    /// # Errors
    ///
    /// Returns a positional diagnostic for any malformed or misplaced
    /// command.
    pub fn next_assignment(&mut self) -> Result<Option<Assignment>> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            let line = line.map_err(|e| anyhow!("\"{}\": read failed: {e}", self.file_label))?;
            self.line_number += 1;
            if let Some(assignment) = self.interpret_line(line.trim_end_matches('\r'))? {
                return Ok(Some(assignment));
            }
        }
    }

    fn interpret_line(&mut self, line: &str) -> Result<Option<Assignment>> {
        let mut cursor = LineCursor::new(line);
        cursor.skip_spaces();
        if cursor.at_end() || cursor.peek() == Some(b'#') {
            return Ok(None);
        }

        let command = cursor.next_word().to_string();
        cursor.skip_spaces();
        let result = match command.as_str() {
            "set" => {
                self.run_set(&mut cursor)?;
                None
            }
            "root" => {
                self.run_root(&mut cursor)?;
                None
            }
            "ignore" => {
                let path = self.operand(&mut cursor, "Missing ignore path parameter.")?;
                self.ignores.add(path);
                None
            }
            "include" => {
                let path = self.operand(&mut cursor, "Missing include path parameter.")?;
                if !self.ignores.remove(&path) {
                    return Err(self.fail(format!("No previous ignore matches \"{path}\".")));
                }
                None
            }
            "in" => self.run_in(&mut cursor)?,
            "add" => {
                let Some(write_prefix) = self.write_prefix.clone() else {
                    return Err(self.fail("Missing previous call to \"in <write path>\"."));
                };
                let read_pattern = self.operand(&mut cursor, "Missing read path parameter.")?;
                Some(Assignment {
                    write_prefix,
                    read_pattern,
                })
            }
            _ => return Err(self.fail(format!("Unknown command \"{command}\"."))),
        };

        cursor.skip_spaces();
        if !cursor.at_end() {
            return Err(self.fail("Unexpected data after command."));
        }
        Ok(result)
    }

    fn run_set(&mut self, cursor: &mut LineCursor) -> Result<()> {
        if cursor.at_end() {
            return Err(self.fail("Missing variable name parameter."));
        }
        let variable = cursor.next_word().to_string();
        cursor.skip_spaces();
        if cursor.at_end() {
            return Err(self.fail("Missing value parameter."));
        }
        let token = cursor.next_word();
        let value =
            parse_bool(token).ok_or_else(|| self.fail(format!("Invalid value \"{token}\".")))?;
        match variable.as_str() {
            "glob-matching" => self.options.glob = value,
            "match-hidden" => self.options.match_hidden = value,
            _ => return Err(self.fail(format!("Unknown variable \"{variable}\"."))),
        }
        Ok(())
    }

    fn run_root(&mut self, cursor: &mut LineCursor) -> Result<()> {
        if cursor.at_end() {
            return Err(self.fail("Missing identifier path parameter."));
        }
        let key = self.parse_path(cursor)?;
        cursor.skip_spaces();
        if cursor.at_end() {
            return Err(self.fail("Missing replacement path parameter."));
        }
        let value = self.parse_path(cursor)?;
        self.aliases.insert(key.into_string(), value);
        Ok(())
    }

    fn run_in(&mut self, cursor: &mut LineCursor) -> Result<Option<Assignment>> {
        if cursor.at_end() {
            return Err(self.fail("Missing write path parameter."));
        }
        let write_prefix = self.substitute(self.parse_path(cursor)?);
        self.write_prefix = Some(write_prefix.clone());
        cursor.skip_spaces();
        if cursor.at_end() {
            return Ok(None);
        }
        let command = cursor.next_word().to_string();
        if command != "add" {
            return Err(self.fail(format!(
                "Unexpected command \"{command}\" after \"in <write path>\"."
            )));
        }
        cursor.skip_spaces();
        if cursor.at_end() {
            return Err(self.fail("Missing read path parameter."));
        }
        let read_pattern = self.substitute(self.parse_path(cursor)?);
        Ok(Some(Assignment {
            write_prefix,
            read_pattern,
        }))
    }

    /// Parses a path operand and applies root-alias substitution.
    fn operand(&self, cursor: &mut LineCursor, missing: &str) -> Result<Utf8PathBuf> {
        if cursor.at_end() {
            return Err(self.fail(missing));
        }
        let path = self.parse_path(cursor)?;
        Ok(self.substitute(path))
    }

    fn parse_path(&self, cursor: &mut LineCursor) -> Result<Utf8PathBuf> {
        let token = cursor.next_path_token().map_err(|msg| self.fail(msg))?;
        Ok(paths::from_user_input(token))
    }

    /// Replaces the leading segment with its alias target, if one matches.
    fn substitute(&self, path: Utf8PathBuf) -> Utf8PathBuf {
        if path.is_absolute() {
            return path;
        }
        let segments = paths::segments(&path).collect::<Vec<_>>();
        let mut segments = segments.into_iter();
        let Some(first) = segments.next() else {
            return path;
        };
        let Some(replacement) = self.aliases.get(first) else {
            return path;
        };
        let rest = segments.collect::<Vec<_>>().join("/");
        if rest.is_empty() {
            replacement.clone()
        } else {
            replacement.join(rest)
        }
    }

    fn fail(&self, reason: impl std::fmt::Display) -> anyhow::Error {
        anyhow!(
            "\"{}\" at line {}: {reason}",
            self.file_label,
            self.line_number
        )
    }
}

fn parse_bool(token: &str) -> Option<bool> {
    match token {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Byte cursor over one config line. Space is the only delimiter; double
/// quotes group a path operand containing spaces.
struct LineCursor<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> LineCursor<'a> {
    fn new(line: &'a str) -> Self {
        Self { line, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.line.len()
    }

    fn peek(&self) -> Option<u8> {
        self.line.as_bytes().get(self.pos).copied()
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn next_word(&mut self) -> &'a str {
        let start = self.pos;
        while !self.at_end() && self.peek() != Some(b' ') {
            self.pos += 1;
        }
        &self.line[start..self.pos]
    }

    fn next_path_token(&mut self) -> Result<&'a str, String> {
        if self.peek() == Some(b'"') {
            self.pos += 1;
            let start = self.pos;
            while !self.at_end() {
                if self.peek() == Some(b'"') {
                    let token = &self.line[start..self.pos];
                    self.pos += 1;
                    return Ok(token);
                }
                self.pos += 1;
            }
            Err("Missing closing quote in path.".to_string())
        } else {
            Ok(self.next_word())
        }
    }
}
