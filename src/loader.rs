use crate::error::Error;
use crate::model::{LoadReport, ParseResult};
use crate::repository::Repository;

/// Applies parsed entries to a [`Repository`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Loader;

impl Loader {
    /// Writes every entry of every result, in order.
    ///
    /// A result that recorded any parse error stops the load before any of its
    /// entries are written; results before it stay applied. Refused writes are
    /// not errors and show up in [`LoadReport::rejected`].
    pub fn load<I>(repository: &Repository, results: I) -> Result<LoadReport, Error>
    where
        I: IntoIterator<Item = ParseResult>,
    {
        let mut report = LoadReport::default();
        for result in results {
            report.merge(Self::load_one(repository, result)?);
        }
        Ok(report)
    }

    pub(crate) fn load_one(
        repository: &Repository,
        result: ParseResult,
    ) -> Result<LoadReport, Error> {
        let path = result.path.clone();
        let entries = result.into_entries()?;
        let mut report = LoadReport {
            sources: 1,
            ..LoadReport::default()
        };

        for entry in entries {
            if repository.write(&entry.name, &entry.value) {
                report.applied.insert(entry.name);
            } else {
                tracing::debug!(name = %entry.name, "write not applied");
                report.rejected.insert(entry.name);
            }
        }

        tracing::debug!(
            path = ?path,
            applied = report.applied.len(),
            rejected = report.rejected.len(),
            "loaded dotenv source"
        );
        Ok(report)
    }
}
