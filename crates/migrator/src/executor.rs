//! Tracking-space protocol
//!
//! The executor is the only component that talks to the store. It knows how
//! to create and query the tracking space and how to run one direction of a
//! migration together with its tracking write. It never looks inside the
//! migration payloads.

use chrono::Utc;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{
    BackendResult, Connection, Mode, PoolConnection, Pooler, Request, Transaction,
    TransactionConnection,
};
use crate::error::{MigratorError, MigratorResult};
use crate::migration::{MigrateFn, Migration};
use crate::options::{LogLevel, Options};

const CREATE_MIGRATIONS_SPACE: &str = include_str!("../lua/create_migrations_space.up.lua");

/// Row of the tracking space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub id: String,
    pub executed_at: String,
}

impl MigrationRecord {
    fn from_tuple(tuple: &Value) -> MigratorResult<Self> {
        let fields = tuple
            .as_array()
            .ok_or_else(|| MigratorError::MalformedRecord(format!("expected a tuple, got {}", tuple)))?;

        let field = |index: usize, name: &str| -> MigratorResult<String> {
            fields
                .get(index)
                .and_then(Value::as_str)
                .map(String::from)
                .ok_or_else(|| {
                    MigratorError::MalformedRecord(format!("missing string field '{}' in {}", name, tuple))
                })
        };

        Ok(Self {
            id: field(0, "id")?,
            executed_at: field(1, "executed_at")?,
        })
    }
}

/// Await a backend future unless the caller cancels first
async fn guard<T>(
    ctx: &CancellationToken,
    fut: impl Future<Output = BackendResult<T>>,
) -> MigratorResult<T> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(MigratorError::Cancelled),
        result = fut => Ok(result?),
    }
}

/// Roll back unguarded: the caller may already be cancelled and the rollback must still go out
async fn abort_transaction(tx: Box<dyn Transaction>, migration_id: &str) {
    if let Err(rollback_err) = tx.rollback().await {
        warn!(
            migration_id = %migration_id,
            error = %rollback_err,
            "failed to roll back transaction"
        );
    }
}

/// Mediates every store access made on behalf of the migrator
pub struct Executor {
    pool: Arc<dyn Pooler>,
    options: Options,
}

impl Executor {
    /// Create a new executor over a pool
    pub fn new(pool: Arc<dyn Pooler>, options: Options) -> Self {
        Self { pool, options }
    }

    /// Get the options this executor runs with
    pub fn options(&self) -> &Options {
        &self.options
    }

    fn space(&self) -> &str {
        &self.options.migrations_space
    }

    async fn call(
        &self,
        ctx: &CancellationToken,
        request: Request,
        mode: Mode,
    ) -> MigratorResult<Vec<Value>> {
        if self.options.log_level >= LogLevel::Debug {
            debug!(?request, %mode, "sending request");
        }
        guard(ctx, self.pool.execute(request, mode)).await
    }

    /// Whether the tracking space exists; read-only
    pub async fn has_tracking_space(&self, ctx: &CancellationToken) -> MigratorResult<bool> {
        let expr = format!("return box.space.{} ~= nil", self.space());
        let response = self
            .call(ctx, Request::eval(expr), self.options.read_mode)
            .await?;

        let first = response.first().ok_or(MigratorError::EmptyResult)?;
        first
            .as_bool()
            .ok_or_else(|| MigratorError::MalformedRecord(format!("expected a boolean, got {}", first)))
    }

    /// Create the tracking space and its unique `id` index unless they exist
    pub async fn ensure_tracking_space(&self, ctx: &CancellationToken) -> MigratorResult<()> {
        let payload = CREATE_MIGRATIONS_SPACE.replace("{migrations_space}", self.space());
        self.call(ctx, Request::eval(payload), self.options.write_mode)
            .await?;
        Ok(())
    }

    /// Whether a tracking record exists for the ID; read-only
    pub async fn has_applied_migration(
        &self,
        ctx: &CancellationToken,
        migration_id: &str,
    ) -> MigratorResult<bool> {
        let request = Request::Select {
            space: self.space().to_string(),
            key: vec![Value::from(migration_id)],
        };
        let tuples = self.call(ctx, request, self.options.read_mode).await?;
        Ok(!tuples.is_empty())
    }

    /// Record a migration as applied; a duplicate ID fails on the unique index
    pub async fn insert_migration_record(
        &self,
        ctx: &CancellationToken,
        migration_id: &str,
    ) -> MigratorResult<()> {
        let mut conn = PoolConnection::new(self.pool.as_ref());
        self.insert_record_on(ctx, &mut conn, migration_id).await
    }

    /// Remove a migration record; removing an absent ID is not an error
    pub async fn delete_migration_record(
        &self,
        ctx: &CancellationToken,
        migration_id: &str,
    ) -> MigratorResult<()> {
        let mut conn = PoolConnection::new(self.pool.as_ref());
        self.delete_record_on(ctx, &mut conn, migration_id).await
    }

    /// Most recently applied migration, i.e. the greatest ID in the tracking space
    pub async fn find_last_applied_migration(
        &self,
        ctx: &CancellationToken,
    ) -> MigratorResult<MigrationRecord> {
        let expr = format!("return box.space.{}.index.id:max()", self.space());
        let response = self
            .call(ctx, Request::eval(expr), self.options.read_mode)
            .await?;

        match response.first() {
            None | Some(Value::Null) => Err(MigratorError::NoAppliedMigrations),
            Some(tuple) => MigrationRecord::from_tuple(tuple),
        }
    }

    /// Run the forward function and record the migration. No-op in dry-run mode.
    pub async fn apply_migration(
        &self,
        ctx: &CancellationToken,
        migration: &Migration,
    ) -> MigratorResult<()> {
        if self.options.dry_run {
            if self.options.log_level >= LogLevel::Debug {
                debug!(migration_id = %migration.id, "dry run, skipping apply");
            }
            return Ok(());
        }
        let migrate = migration
            .migrate
            .as_deref()
            .ok_or(MigratorError::MissingMigrateFunction)?;

        if !self.options.transactions_enabled {
            let mut conn = PoolConnection::new(self.pool.as_ref());
            guard(ctx, migrate.execute(&mut conn, &self.options)).await?;
            return self.insert_record_on(ctx, &mut conn, &migration.id).await;
        }

        let mut tx = guard(ctx, self.pool.begin(self.options.write_mode)).await?;
        let result = self
            .apply_in_transaction(ctx, tx.as_mut(), migrate, &migration.id)
            .await;
        self.finish_transaction(ctx, tx, result, &migration.id).await
    }

    /// Run the backward function and drop the record. No-op in dry-run mode.
    pub async fn rollback_migration(
        &self,
        ctx: &CancellationToken,
        migration: &Migration,
    ) -> MigratorResult<()> {
        if self.options.dry_run {
            if self.options.log_level >= LogLevel::Debug {
                debug!(migration_id = %migration.id, "dry run, skipping rollback");
            }
            return Ok(());
        }
        let rollback = migration
            .rollback
            .as_deref()
            .ok_or(MigratorError::MissingRollbackFunction)?;

        if !self.options.transactions_enabled {
            let mut conn = PoolConnection::new(self.pool.as_ref());
            guard(ctx, rollback.execute(&mut conn, &self.options)).await?;
            return self.delete_record_on(ctx, &mut conn, &migration.id).await;
        }

        let mut tx = guard(ctx, self.pool.begin(self.options.write_mode)).await?;
        let result = self
            .rollback_in_transaction(ctx, tx.as_mut(), rollback, &migration.id)
            .await;
        self.finish_transaction(ctx, tx, result, &migration.id).await
    }

    async fn apply_in_transaction(
        &self,
        ctx: &CancellationToken,
        tx: &mut dyn Transaction,
        migrate: &dyn MigrateFn,
        migration_id: &str,
    ) -> MigratorResult<()> {
        let mut conn = TransactionConnection::new(tx);
        guard(ctx, migrate.execute(&mut conn, &self.options)).await?;
        self.insert_record_on(ctx, &mut conn, migration_id).await
    }

    async fn rollback_in_transaction(
        &self,
        ctx: &CancellationToken,
        tx: &mut dyn Transaction,
        rollback: &dyn MigrateFn,
        migration_id: &str,
    ) -> MigratorResult<()> {
        let mut conn = TransactionConnection::new(tx);
        guard(ctx, rollback.execute(&mut conn, &self.options)).await?;
        self.delete_record_on(ctx, &mut conn, migration_id).await
    }

    async fn finish_transaction(
        &self,
        ctx: &CancellationToken,
        tx: Box<dyn Transaction>,
        result: MigratorResult<()>,
        migration_id: &str,
    ) -> MigratorResult<()> {
        match result {
            // Once sent, a commit is awaited to completion and never raced against the token.
            Ok(()) if ctx.is_cancelled() => {
                abort_transaction(tx, migration_id).await;
                Err(MigratorError::Cancelled)
            }
            Ok(()) => Ok(tx.commit().await?),
            Err(err) => {
                abort_transaction(tx, migration_id).await;
                Err(err)
            }
        }
    }

    async fn insert_record_on(
        &self,
        ctx: &CancellationToken,
        conn: &mut dyn Connection,
        migration_id: &str,
    ) -> MigratorResult<()> {
        let request = Request::Insert {
            space: self.space().to_string(),
            tuple: vec![
                Value::from(migration_id),
                Value::from(Utc::now().format("%Y-%m-%d %H:%M:%S%.f UTC").to_string()),
            ],
        };
        guard(ctx, conn.execute(request, self.options.write_mode)).await?;
        Ok(())
    }

    async fn delete_record_on(
        &self,
        ctx: &CancellationToken,
        conn: &mut dyn Connection,
        migration_id: &str,
    ) -> MigratorResult<()> {
        let request = Request::Delete {
            space: self.space().to_string(),
            key: vec![Value::from(migration_id)],
        };
        guard(ctx, conn.execute(request, self.options.write_mode)).await?;
        Ok(())
    }
}
