//! Backend Abstractions
//!
//! The migrator never speaks the Tarantool wire protocol itself. Connection
//! pooling and request encoding belong to whoever implements [`Pooler`]; the
//! crate only describes the handful of requests it needs and the routing hint
//! to send them with.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Instance routing hint forwarded to the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Any instance
    Any,
    /// Writable instance only
    Rw,
    /// Read-only instance only
    Ro,
    /// Writable if available, otherwise any
    PreferRw,
    /// Read-only if available, otherwise any
    PreferRo,
}

impl Mode {
    /// Wire name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Any => "any",
            Mode::Rw => "rw",
            Mode::Ro => "ro",
            Mode::PreferRw => "prefer_rw",
            Mode::PreferRo => "prefer_ro",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "any" => Ok(Mode::Any),
            "rw" => Ok(Mode::Rw),
            "ro" => Ok(Mode::Ro),
            "prefer_rw" | "prefer-rw" => Ok(Mode::PreferRw),
            "prefer_ro" | "prefer-ro" => Ok(Mode::PreferRo),
            _ => Err(format!("Unsupported pool mode: {}", s)),
        }
    }
}

/// A single request sent to the store
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Evaluate a Lua expression
    Eval { expr: String, args: Vec<Value> },
    /// Select tuples from a space by primary key
    Select { space: String, key: Vec<Value> },
    /// Insert a tuple, failing on a duplicate primary key
    Insert { space: String, tuple: Vec<Value> },
    /// Delete a tuple by primary key
    Delete { space: String, key: Vec<Value> },
}

impl Request {
    /// Eval request without arguments
    pub fn eval(expr: impl Into<String>) -> Self {
        Request::Eval {
            expr: expr.into(),
            args: Vec::new(),
        }
    }
}

/// Raw error returned by the store or the transport
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
    /// Create an error from a raw message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error that keeps the underlying transport error
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get the raw message
    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Connection pool to one or more store instances
#[async_trait]
pub trait Pooler: Send + Sync {
    /// Send a request to an instance picked by `mode` and return the response body
    async fn execute(&self, request: Request, mode: Mode) -> BackendResult<Vec<Value>>;

    /// Open an interactive transaction on an instance picked by `mode`
    async fn begin(&self, mode: Mode) -> BackendResult<Box<dyn Transaction>>;
}

/// Interactive transaction bound to a single instance
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Execute a request inside the transaction
    async fn execute(&mut self, request: Request) -> BackendResult<Vec<Value>>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> BackendResult<()>;

    /// Roll the transaction back
    async fn rollback(self: Box<Self>) -> BackendResult<()>;
}

/// Handle handed to migration functions
///
/// Depending on configuration the requests either go straight to the pool or
/// through the transaction that also records the migration.
#[async_trait]
pub trait Connection: Send {
    async fn execute(&mut self, request: Request, mode: Mode) -> BackendResult<Vec<Value>>;
}

/// Connection that routes every request through the pool
pub struct PoolConnection<'a> {
    pool: &'a dyn Pooler,
}

impl<'a> PoolConnection<'a> {
    /// Wrap a pool
    pub fn new(pool: &'a dyn Pooler) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Connection for PoolConnection<'_> {
    async fn execute(&mut self, request: Request, mode: Mode) -> BackendResult<Vec<Value>> {
        self.pool.execute(request, mode).await
    }
}

/// Connection bound to an open transaction; the routing hint is ignored
pub struct TransactionConnection<'a> {
    tx: &'a mut dyn Transaction,
}

impl<'a> TransactionConnection<'a> {
    /// Wrap an open transaction
    pub fn new(tx: &'a mut dyn Transaction) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Connection for TransactionConnection<'_> {
    async fn execute(&mut self, request: Request, _mode: Mode) -> BackendResult<Vec<Value>> {
        self.tx.execute(request).await
    }
}
