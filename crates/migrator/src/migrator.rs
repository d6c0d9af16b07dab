//! Migration orchestrator
//!
//! Applies pending migrations in ascending ID order and rolls back the most
//! recently applied one. Runs are strictly sequential and stop at the first
//! failure.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::Pooler;
use crate::collection::MigrationsCollection;
use crate::error::{MigratorError, MigratorResult};
use crate::executor::Executor;
use crate::options::{LogLevel, Options};

/// Outcome of a successful [`Migrator::migrate`] run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateReport {
    /// Migrations applied by this run, in order. In dry-run mode, the ones that would be.
    pub applied: Vec<String>,
    /// Migrations that were already applied
    pub skipped: Vec<String>,
    pub elapsed: Duration,
}

/// Outcome of a successful [`Migrator::rollback_last`] run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub rolled_back: String,
    pub elapsed: Duration,
}

/// Applied state of one known migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationState {
    pub id: String,
    pub applied: bool,
}

/// Applies and rolls back a collection of migrations against one store
pub struct Migrator {
    pool: Arc<dyn Pooler>,
    executor: Executor,
    migrations: MigrationsCollection,
}

impl Migrator {
    /// Create a new migrator with default options
    pub fn new(pool: Arc<dyn Pooler>, migrations: MigrationsCollection) -> Self {
        let executor = Executor::new(pool.clone(), Options::default());
        Self {
            pool,
            executor,
            migrations,
        }
    }

    /// Replace the options snapshot. Validation happens when a run starts.
    pub fn with_options(mut self, options: Options) -> Self {
        self.executor = Executor::new(self.pool.clone(), options);
        self
    }

    /// Get the options snapshot
    pub fn options(&self) -> &Options {
        self.executor.options()
    }

    /// Get the migrations this migrator manages
    pub fn migrations(&self) -> &MigrationsCollection {
        &self.migrations
    }

    fn log_enabled(&self, level: LogLevel) -> bool {
        self.options().log_level >= level
    }

    /// Apply every migration not yet recorded in the tracking space
    pub async fn migrate(&self, ctx: &CancellationToken) -> MigratorResult<MigrateReport> {
        let started = Instant::now();
        self.options().validate()?;

        if self.migrations.is_empty() {
            return Err(MigratorError::NoDefinedMigrations);
        }

        // A dry run never creates the space; when it is missing nothing is applied yet.
        let space_exists = if self.options().dry_run {
            self.executor
                .has_tracking_space(ctx)
                .await
                .map_err(MigratorError::init_tracking_space)?
        } else {
            self.executor
                .ensure_tracking_space(ctx)
                .await
                .map_err(MigratorError::init_tracking_space)?;
            true
        };

        let mut report = MigrateReport {
            applied: Vec::new(),
            skipped: Vec::new(),
            elapsed: Duration::ZERO,
        };

        for migration in &self.migrations {
            let id = migration.id.as_str();
            migration
                .validate_for_migrate()
                .map_err(|e| MigratorError::in_migration(id, e))?;

            if self.log_enabled(LogLevel::Info) {
                info!(migration_id = %id, "migration \"{}\" process started", id);
            }

            let applied = if space_exists {
                self.executor
                    .has_applied_migration(ctx, id)
                    .await
                    .map_err(|e| MigratorError::in_migration(id, e))?
            } else {
                false
            };

            if applied {
                if self.log_enabled(LogLevel::Info) {
                    info!(migration_id = %id, "is already migrated");
                }
                report.skipped.push(id.to_string());
                continue;
            }

            let begin = Instant::now();
            self.executor
                .apply_migration(ctx, migration)
                .await
                .map_err(|e| MigratorError::in_migration(id, e))?;

            if self.log_enabled(LogLevel::Info) {
                info!(
                    migration_id = %id,
                    dry_run = self.options().dry_run,
                    "successfully migrated in {}ms",
                    begin.elapsed().as_millis()
                );
            }
            report.applied.push(id.to_string());
        }

        report.elapsed = started.elapsed();
        if self.log_enabled(LogLevel::Debug) {
            debug!(
                applied = report.applied.len(),
                skipped = report.skipped.len(),
                "migrate finished"
            );
        }
        Ok(report)
    }

    /// Roll back the migration with the greatest applied ID
    pub async fn rollback_last(&self, ctx: &CancellationToken) -> MigratorResult<RollbackReport> {
        let started = Instant::now();
        self.options().validate()?;

        if self.migrations.is_empty() {
            return Err(MigratorError::NoDefinedMigrations);
        }

        let record = self
            .executor
            .find_last_applied_migration(ctx)
            .await
            .map_err(MigratorError::find_applied)?;
        let id = record.id.as_str();

        let migration = self
            .migrations
            .find(id)
            .map_err(|e| MigratorError::in_migration(id, e))?;
        migration
            .validate_for_rollback()
            .map_err(|e| MigratorError::in_migration(id, e))?;

        if self.log_enabled(LogLevel::Info) {
            info!(
                migration_id = %id,
                executed_at = %record.executed_at,
                "migration \"{}\" process started",
                id
            );
        }

        let begin = Instant::now();
        self.executor
            .rollback_migration(ctx, migration)
            .await
            .map_err(|e| MigratorError::in_migration(id, e))?;

        if self.log_enabled(LogLevel::Info) {
            info!(
                migration_id = %id,
                dry_run = self.options().dry_run,
                "successfully rolled back in {}ms",
                begin.elapsed().as_millis()
            );
        }

        Ok(RollbackReport {
            rolled_back: record.id,
            elapsed: started.elapsed(),
        })
    }

    /// Applied state of every known migration, ascending. Read-only.
    pub async fn status(&self, ctx: &CancellationToken) -> MigratorResult<Vec<MigrationState>> {
        self.options().validate()?;

        if self.migrations.is_empty() {
            return Ok(Vec::new());
        }

        let space_exists = self
            .executor
            .has_tracking_space(ctx)
            .await
            .map_err(MigratorError::init_tracking_space)?;

        let mut states = Vec::with_capacity(self.migrations.len());
        for migration in &self.migrations {
            let applied = if space_exists {
                self.executor
                    .has_applied_migration(ctx, &migration.id)
                    .await
                    .map_err(|e| MigratorError::in_migration(&migration.id, e))?
            } else {
                false
            };
            states.push(MigrationState {
                id: migration.id.clone(),
                applied,
            });
        }
        Ok(states)
    }
}
