//! Error types for the migrator
//!
//! Definition errors (bad IDs, missing functions, malformed file names) and
//! lookup errors are never retried. Backend errors are carried verbatim and
//! enriched with the migration ID when they cross from the executor into the
//! migrator.

use std::path::PathBuf;
use thiserror::Error;

use crate::backend::BackendError;
use crate::options::ConfigError;

/// Result type alias for migrator operations
pub type MigratorResult<T> = Result<T, MigratorError>;

/// Error types for migration loading, tracking and execution
#[derive(Debug, Error)]
pub enum MigratorError {
    #[error("missing ID in migration")]
    MissingId,

    #[error("missing migrate function in migration")]
    MissingMigrateFunction,

    #[error("missing rollback function in migration")]
    MissingRollbackFunction,

    #[error("no defined migrations")]
    NoDefinedMigrations,

    #[error("tried to migrate to an ID that doesn't exist")]
    MigrationIdDoesNotExist,

    #[error("duplicate migration ID \"{0}\"")]
    DuplicateMigrationId(String),

    #[error("wrong migration file format: \"{0}\"")]
    WrongFileFormat(String),

    #[error("wrong migration cmd format: \"{0}\"")]
    WrongDirectionFormat(String),

    #[error("no applied migrations")]
    NoAppliedMigrations,

    #[error("empty result")]
    EmptyResult,

    #[error("malformed migration record: {0}")]
    MalformedRecord(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("migration \"{id}\" error: {source}")]
    Migration {
        id: String,
        #[source]
        source: Box<MigratorError>,
    },

    #[error("init migrations space error: {0}")]
    InitTrackingSpace(#[source] Box<MigratorError>),

    #[error("find applied migration error: {0}")]
    FindAppliedMigration(#[source] Box<MigratorError>),
}

impl MigratorError {
    /// Attach a migration ID to an error. Cancellation passes through as-is.
    pub fn in_migration(id: impl Into<String>, err: MigratorError) -> Self {
        match err {
            MigratorError::Cancelled => MigratorError::Cancelled,
            other => MigratorError::Migration {
                id: id.into(),
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn init_tracking_space(err: MigratorError) -> Self {
        match err {
            MigratorError::Cancelled => MigratorError::Cancelled,
            other => MigratorError::InitTrackingSpace(Box::new(other)),
        }
    }

    pub(crate) fn find_applied(err: MigratorError) -> Self {
        match err {
            MigratorError::Cancelled => MigratorError::Cancelled,
            other => MigratorError::FindAppliedMigration(Box::new(other)),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigratorError::Io {
            path: path.into(),
            source,
        }
    }

    /// The innermost error once every context layer is peeled off
    pub fn root_cause(&self) -> &MigratorError {
        match self {
            MigratorError::Migration { source, .. }
            | MigratorError::InitTrackingSpace(source)
            | MigratorError::FindAppliedMigration(source) => source.root_cause(),
            other => other,
        }
    }

    /// ID of the migration the error was raised for, if any
    pub fn migration_id(&self) -> Option<&str> {
        match self {
            MigratorError::Migration { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Whether the run stopped because the caller cancelled it
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), MigratorError::Cancelled)
    }
}
