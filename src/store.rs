use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub(crate) const DEFAULT_FILE_NAME: &str = ".env";

/// Raw text read from one dotenv file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub path: PathBuf,
    pub content: String,
}

/// Builder-style list of candidate dotenv files.
///
/// Every directory is combined with every file name, directories first. With
/// no names configured the default `.env` is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreBuilder {
    paths: Vec<PathBuf>,
    names: Vec<String>,
    short_circuit: bool,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.paths
            .extend(paths.into_iter().map(|path| path.as_ref().to_path_buf()));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Stop at the first candidate that exists.
    pub fn short_circuit(mut self, short_circuit: bool) -> Self {
        self.short_circuit = short_circuit;
        self
    }

    pub fn build(self) -> FileStore {
        let names = if self.names.is_empty() {
            vec![DEFAULT_FILE_NAME.to_owned()]
        } else {
            self.names
        };

        let candidates = self
            .paths
            .iter()
            .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
            .collect();

        FileStore {
            candidates,
            short_circuit: self.short_circuit,
        }
    }
}

/// Resolved candidate files, read in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStore {
    candidates: Vec<PathBuf>,
    short_circuit: bool,
}

impl FileStore {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// A store over explicit file paths, read in the given order.
    pub fn from_files<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            candidates: files
                .into_iter()
                .map(|path| path.as_ref().to_path_buf())
                .collect(),
            short_circuit: false,
        }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Reads every existing candidate, or only the first one when
    /// short-circuiting.
    ///
    /// Missing candidates are skipped; if none exists the result is
    /// [`Error::InvalidPath`]. Any other I/O failure is returned as is.
    pub fn read(&self) -> Result<Vec<Source>, Error> {
        let mut sources = Vec::new();

        for path in &self.candidates {
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "dotenv candidate not found");
                    continue;
                }
                Err(err) => return Err(Error::Io(err)),
            };

            let content = String::from_utf8(bytes).map_err(|err| err.utf8_error())?;
            tracing::debug!(path = %path.display(), "read dotenv file");
            sources.push(Source {
                path: path.clone(),
                content,
            });

            if self.short_circuit {
                break;
            }
        }

        if sources.is_empty() {
            return Err(Error::InvalidPath {
                candidates: self.candidates.clone(),
            });
        }

        Ok(sources)
    }
}
