use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::loader::Loader;
use crate::model::{LoadReport, ParseResult};
use crate::parser::parse_with_lookup;
use crate::repository::{Repository, RepositoryBuilder};
use crate::store::{DEFAULT_FILE_NAME, FileStore, Source, StoreBuilder};

/// Load `.env` from the current working directory into the process
/// environment, keeping variables that are already set.
///
/// # Safety
///
/// Mutates the process environment; see [`ProcessAdapter::new`](crate::ProcessAdapter::new).
pub unsafe fn dotenv() -> Result<LoadReport, Error> {
    // SAFETY: forwarded to the caller.
    unsafe { from_filename(DEFAULT_FILE_NAME) }
}

/// Load a dotenv file from a specific path into the process environment.
///
/// # Safety
///
/// Mutates the process environment; see [`ProcessAdapter::new`](crate::ProcessAdapter::new).
pub unsafe fn from_path(path: impl AsRef<Path>) -> Result<LoadReport, Error> {
    // SAFETY: forwarded to the caller.
    unsafe { from_paths([path]) }
}

/// Load multiple dotenv files, in order, into the process environment.
///
/// # Safety
///
/// Mutates the process environment; see [`ProcessAdapter::new`](crate::ProcessAdapter::new).
pub unsafe fn from_paths<I, P>(paths: I) -> Result<LoadReport, Error>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    // SAFETY: forwarded to the caller.
    let repository = unsafe { RepositoryBuilder::with_default_adapters() }.build();
    Dotenv::new(FileStore::from_files(paths), repository).load()
}

/// Load a dotenv file by filename from the current working directory.
///
/// # Safety
///
/// Mutates the process environment; see [`ProcessAdapter::new`](crate::ProcessAdapter::new).
pub unsafe fn from_filename(name: &str) -> Result<LoadReport, Error> {
    // SAFETY: forwarded to the caller.
    unsafe { from_path(PathBuf::from(name)) }
}

/// Locates dotenv files and loads them into a repository.
#[derive(Debug, Clone)]
pub struct Dotenv {
    store: FileStore,
    repository: Repository,
}

impl Dotenv {
    pub fn new(store: FileStore, repository: Repository) -> Self {
        Self { store, repository }
    }

    /// Every directory in `paths` combined with every name in `names`
    /// (`.env` when empty), stopping at the first file found when
    /// `short_circuit` is set.
    pub fn create<P, N>(repository: Repository, paths: P, names: N, short_circuit: bool) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<Path>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        let store = StoreBuilder::new()
            .paths(paths)
            .names(names)
            .short_circuit(short_circuit)
            .build();
        Self::new(store, repository)
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Reads, parses and loads every located file in order.
    ///
    /// Each file is parsed against the repository as left by the files before
    /// it, so placeholders can refer to values loaded earlier.
    pub fn load(&self) -> Result<LoadReport, Error> {
        let mut report = LoadReport::default();
        for source in self.store.read()? {
            let result = self.parse_source(&source);
            report.merge(Loader::load_one(&self.repository, result)?);
        }
        Ok(report)
    }

    /// Like [`Dotenv::load`], but a missing file yields an empty report.
    pub fn safe_load(&self) -> Result<LoadReport, Error> {
        match self.load() {
            Err(err) if err.is_invalid_path() => {
                tracing::debug!(%err, "no dotenv file found, nothing loaded");
                Ok(LoadReport::default())
            }
            other => other,
        }
    }

    /// Parses every located file without writing anything.
    ///
    /// Placeholders fall back to the repository's current state only.
    pub fn parse(&self) -> Result<Vec<ParseResult>, Error> {
        let sources = self.store.read()?;
        Ok(sources
            .iter()
            .map(|source| self.parse_source(source))
            .collect())
    }

    fn parse_source(&self, source: &Source) -> ParseResult {
        parse_with_lookup(&source.content, Some(source.path.as_path()), &|name| {
            self.repository.read(name)
        })
    }
}
