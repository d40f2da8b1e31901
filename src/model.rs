use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::ParseError;

/// A resolved `NAME=VALUE` entry from a `.env` file or input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub value: String,
    pub quote: QuoteKind,
    /// Whether the line carried a leading `export` keyword.
    pub exported: bool,
    pub line: u32,
}

/// Quoting style of an entry's raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteKind {
    /// Bare value, trimmed and taken literally.
    #[default]
    None,
    /// `'...'`, taken literally.
    Single,
    /// `"..."`, escape-processed and interpolated.
    Double,
}

/// Outcome of parsing one configuration source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParseResult {
    /// Resolved entries in source order, one per name (last assignment wins).
    pub entries: Vec<Entry>,
    /// Line numbers of blank and comment lines.
    pub skipped_lines: Vec<u32>,
    /// Lines that failed to parse, in source order.
    pub errors: Vec<ParseError>,
    pub path: Option<PathBuf>,
}

impl ParseResult {
    /// Returns `true` when every non-blank line parsed.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value.as_str())
    }

    /// Converts into the entry list, failing with the first parse error.
    pub fn into_entries(self) -> Result<Vec<Entry>, ParseError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.entries),
        }
    }
}

/// Summary of a load operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadReport {
    /// Names whose repository write succeeded.
    pub applied: BTreeSet<String>,
    /// Names whose repository write was refused, typically because immutable
    /// mode found them already defined.
    pub rejected: BTreeSet<String>,
    /// Number of sources processed.
    pub sources: usize,
}

impl LoadReport {
    pub fn is_applied(&self, name: &str) -> bool {
        self.applied.contains(name)
    }

    pub(crate) fn merge(&mut self, other: LoadReport) {
        self.applied.extend(other.applied);
        self.rejected.extend(other.rejected);
        self.sources += other.sources;
    }
}
