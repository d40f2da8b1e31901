//! Parse `.env` files and load them through an environment [`Repository`].
//!
//! A [`Repository`] combines several [`Adapter`]s (the process environment, a
//! process-wide mirror, an in-memory map, an external getter/setter pair) into
//! one `has`/`read`/`write`/`delete` surface. Reads use the first reader that
//! defines a name; writes fan out to every writer. In immutable mode names that
//! are already defined are never overwritten.
//!
//! [`Dotenv`] ties file discovery, parsing and loading together.
//!
//! ```no_run
//! use envseed::{Dotenv, MemoryAdapter, Repository};
//!
//! let store = MemoryAdapter::new();
//! let repository = Repository::builder()
//!     .adapter(store.clone())
//!     .immutable(true)
//!     .build();
//!
//! let report = Dotenv::create(repository, ["."], [".env"], false).load()?;
//! assert!(report.applied.iter().all(|name| store.get(name).is_some()));
//! # Ok::<(), envseed::Error>(())
//! ```
//!
//! Convenience loaders (`dotenv`, `from_path`, `from_paths`, `from_filename`)
//! mutate the process environment and are `unsafe`, because callers must
//! guarantee no concurrent process-environment access.

mod adapter;
mod dotenv;
mod error;
mod loader;
mod model;
mod parser;
mod repository;
mod store;

pub use adapter::{Adapter, GlobalAdapter, HookAdapter, MemoryAdapter, ProcessAdapter, globals};
pub use dotenv::{Dotenv, dotenv, from_filename, from_path, from_paths};
pub use error::{Error, ParseError, ParseErrorKind};
pub use loader::Loader;
pub use model::{Entry, LoadReport, ParseResult, QuoteKind};
pub use parser::{parse_bytes, parse_str, parse_str_with_env};
pub use repository::{Repository, RepositoryBuilder};
pub use store::{FileStore, Source, StoreBuilder};
