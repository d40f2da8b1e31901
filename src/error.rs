use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to locate a dotenv file, tried: {}", display_paths(.candidates))]
    InvalidPath { candidates: Vec<PathBuf> },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("invalid UTF-8 input: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),
}

impl Error {
    /// Whether no configuration source could be located.
    ///
    /// Optional loads usually ignore this kind and fail on everything else.
    pub fn is_invalid_path(&self) -> bool {
        matches!(self, Self::InvalidPath { .. })
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "(no candidates)".to_owned();
    }

    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error{} at line {line}, column {column}: {kind}", display_path(.path))]
pub struct ParseError {
    pub line: u32,
    pub column: u32,
    pub kind: ParseErrorKind,
    /// The physical line the error was found on.
    pub content: String,
    pub path: Option<PathBuf>,
}

impl ParseError {
    pub(crate) fn new(line: u32, column: u32, kind: ParseErrorKind, content: &str) -> Self {
        Self {
            line,
            column,
            kind,
            content: content.to_owned(),
            path: None,
        }
    }

    pub(crate) fn with_path(mut self, path: Option<&Path>) -> Self {
        self.path = path.map(Path::to_path_buf);
        self
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("invalid syntax")]
    InvalidSyntax,
    #[error("missing name")]
    MissingName,
    #[error("invalid name")]
    InvalidName,
    #[error("unterminated quote")]
    UnterminatedQuote,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_mentions_source_and_position() {
        let err = ParseError::new(3, 7, ParseErrorKind::UnterminatedQuote, "A=\"open")
            .with_path(Some(Path::new("app/.env")));

        assert_eq!(
            err.to_string(),
            "parse error in app/.env at line 3, column 7: unterminated quote"
        );
    }

    #[test]
    fn invalid_path_lists_candidates() {
        let err = Error::InvalidPath {
            candidates: vec![PathBuf::from("a/.env"), PathBuf::from("b/.env")],
        };

        assert!(err.is_invalid_path());
        assert_eq!(
            err.to_string(),
            "unable to locate a dotenv file, tried: a/.env, b/.env"
        );
    }
}
