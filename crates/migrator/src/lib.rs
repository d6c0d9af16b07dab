//! # tarantool-migrator
//!
//! Versioned schema migrations for Tarantool.
//!
//! Migrations are pairs of Lua scripts (or Rust callbacks) identified by a
//! sortable ID. A tracking space records which IDs have been applied, so
//! [`Migrator::migrate`] only runs what is pending and
//! [`Migrator::rollback_last`] always undoes the most recent one.
//!
//! ```ignore
//! use std::sync::Arc;
//! use tarantool_migrator::{CancellationToken, FsLoader, MigrationSource, Migrator, Options};
//!
//! let migrations = FsLoader::new("migrations").load_migrations()?;
//! let migrator = Migrator::new(Arc::new(pool), migrations).with_options(Options::from_env()?);
//! let report = migrator.migrate(&CancellationToken::new()).await?;
//! ```
//!
//! The store itself is reached through the [`Pooler`] trait; connection
//! handling belongs to the caller.

pub mod backend;
pub mod collection;
pub mod error;
pub mod executor;
pub mod loader;
pub mod migration;
pub mod migrator;
pub mod options;

#[cfg(test)]
mod testing;

pub use backend::{
    BackendError, BackendResult, Connection, Mode, PoolConnection, Pooler, Request, Transaction,
    TransactionConnection,
};
pub use collection::MigrationsCollection;
pub use error::{MigratorError, MigratorResult};
pub use executor::{Executor, MigrationRecord};
pub use loader::{Direction, EmbeddedLoader, FsLoader, MigrationFile, MigrationSource};
pub use migration::{Callback, LuaScript, MigrateFn, Migration};
pub use migrator::{MigrateReport, MigrationState, Migrator, RollbackReport};
pub use options::{ConfigError, LogLevel, Options, DEFAULT_MIGRATIONS_SPACE};

pub use tokio_util::sync::CancellationToken;
