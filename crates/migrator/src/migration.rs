//! Migration definitions
//!
//! A [`Migration`] pairs an ID with a forward and an optional backward
//! function. Both are [`MigrateFn`] capabilities: either a Lua payload
//! evaluated on the store ([`LuaScript`]) or caller code ([`Callback`]).

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

use crate::backend::{BackendResult, Connection, Request};
use crate::error::{MigratorError, MigratorResult};
use crate::options::Options;

/// Something that can run one direction of a migration against the store
pub trait MigrateFn: Send + Sync {
    fn execute<'a>(
        &'a self,
        conn: &'a mut dyn Connection,
        options: &'a Options,
    ) -> BoxFuture<'a, BackendResult<()>>;
}

/// Lua payload evaluated on a writable instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuaScript {
    source: String,
}

impl LuaScript {
    /// Create a script from Lua source
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Get the Lua source
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl MigrateFn for LuaScript {
    fn execute<'a>(
        &'a self,
        conn: &'a mut dyn Connection,
        options: &'a Options,
    ) -> BoxFuture<'a, BackendResult<()>> {
        Box::pin(async move {
            conn.execute(Request::eval(self.source.as_str()), options.write_mode)
                .await?;
            Ok(())
        })
    }
}

/// Caller-supplied migration function
///
/// ```ignore
/// let up = Callback::new(|conn, options| {
///     Box::pin(async move {
///         conn.execute(Request::eval("box.schema.space.create('users')"), options.write_mode)
///             .await?;
///         Ok(())
///     })
/// });
/// ```
pub struct Callback<F> {
    f: F,
}

impl<F> Callback<F>
where
    F: for<'a> Fn(&'a mut dyn Connection, &'a Options) -> BoxFuture<'a, BackendResult<()>>
        + Send
        + Sync,
{
    /// Wrap a closure
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> MigrateFn for Callback<F>
where
    F: for<'a> Fn(&'a mut dyn Connection, &'a Options) -> BoxFuture<'a, BackendResult<()>>
        + Send
        + Sync,
{
    fn execute<'a>(
        &'a self,
        conn: &'a mut dyn Connection,
        options: &'a Options,
    ) -> BoxFuture<'a, BackendResult<()>> {
        (self.f)(conn, options)
    }
}

/// A single, uniquely identified schema change
#[derive(Clone)]
pub struct Migration {
    /// Migration identifier, usually a timestamp prefix like "202410082345_users"
    pub id: String,
    /// Executed when the migration is applied
    pub migrate: Option<Arc<dyn MigrateFn>>,
    /// Executed on rollback; may be absent
    pub rollback: Option<Arc<dyn MigrateFn>>,
}

impl Migration {
    /// Create a migration with no functions attached
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            migrate: None,
            rollback: None,
        }
    }

    /// Migration made of two Lua payloads
    pub fn lua(id: impl Into<String>, up: impl Into<String>, down: impl Into<String>) -> Self {
        Self::new(id)
            .with_migrate(LuaScript::new(up))
            .with_rollback(LuaScript::new(down))
    }

    /// Set the forward function
    pub fn with_migrate(mut self, f: impl MigrateFn + 'static) -> Self {
        self.migrate = Some(Arc::new(f));
        self
    }

    /// Set the backward function
    pub fn with_rollback(mut self, f: impl MigrateFn + 'static) -> Self {
        self.rollback = Some(Arc::new(f));
        self
    }

    /// Set the forward function from a closure
    pub fn with_callback<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut dyn Connection, &'a Options) -> BoxFuture<'a, BackendResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.with_migrate(Callback::new(f))
    }

    /// Set the backward function from a closure
    pub fn with_rollback_callback<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut dyn Connection, &'a Options) -> BoxFuture<'a, BackendResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.with_rollback(Callback::new(f))
    }

    /// Check that the migration can be applied
    pub fn validate_for_migrate(&self) -> MigratorResult<()> {
        if self.id.is_empty() {
            return Err(MigratorError::MissingId);
        }
        if self.migrate.is_none() {
            return Err(MigratorError::MissingMigrateFunction);
        }
        Ok(())
    }

    /// Check that the migration can be rolled back
    pub fn validate_for_rollback(&self) -> MigratorResult<()> {
        if self.id.is_empty() {
            return Err(MigratorError::MissingId);
        }
        if self.rollback.is_none() {
            return Err(MigratorError::MissingRollbackFunction);
        }
        Ok(())
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("id", &self.id)
            .field("migrate", &self.migrate.is_some())
            .field("rollback", &self.rollback.is_some())
            .finish()
    }
}
