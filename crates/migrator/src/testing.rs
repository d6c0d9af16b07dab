//! Test doubles for the store
//!
//! [`MockPool`] replays scripted replies and records every request, for tests
//! that pin down the exact request sequence. [`MemoryStore`] behaves like a
//! tiny Tarantool with a tracking space, for scenario tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::backend::{BackendError, BackendResult, Mode, Pooler, Request, Transaction};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Scripted response to one request
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(Vec<Value>),
    Err(String),
}

impl Reply {
    pub fn empty() -> Self {
        Reply::Ok(Vec::new())
    }

    pub fn tuples(tuples: Vec<Value>) -> Self {
        Reply::Ok(tuples)
    }

    pub fn value(value: Value) -> Self {
        Reply::Ok(vec![value])
    }

    pub fn error(message: &str) -> Self {
        Reply::Err(message.to_string())
    }
}

/// Request observed by [`MockPool`]
#[derive(Debug, Clone)]
pub struct Call {
    pub request: Request,
    pub mode: Mode,
    pub in_transaction: bool,
}

#[derive(Default)]
struct MockState {
    replies: VecDeque<Reply>,
    calls: Vec<Call>,
    begun: usize,
    commits: usize,
    rollbacks: usize,
}

impl MockState {
    fn next(&mut self, call: Call) -> BackendResult<Vec<Value>> {
        self.calls.push(call);
        match self.replies.pop_front() {
            Some(Reply::Ok(body)) => Ok(body),
            Some(Reply::Err(message)) => Err(BackendError::new(message)),
            None => Err(BackendError::new("no scripted reply left")),
        }
    }
}

/// Pool that answers from a script of replies
#[derive(Clone, Default)]
pub struct MockPool {
    state: Arc<Mutex<MockState>>,
}

impl MockPool {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                replies: replies.into(),
                ..MockState::default()
            })),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn transactions_begun(&self) -> usize {
        self.state.lock().unwrap().begun
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }
}

#[async_trait]
impl Pooler for MockPool {
    async fn execute(&self, request: Request, mode: Mode) -> BackendResult<Vec<Value>> {
        self.state.lock().unwrap().next(Call {
            request,
            mode,
            in_transaction: false,
        })
    }

    async fn begin(&self, _mode: Mode) -> BackendResult<Box<dyn Transaction>> {
        self.state.lock().unwrap().begun += 1;
        Ok(Box::new(MockTransaction {
            state: self.state.clone(),
        }))
    }
}

struct MockTransaction {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn execute(&mut self, request: Request) -> BackendResult<Vec<Value>> {
        self.state.lock().unwrap().next(Call {
            request,
            mode: Mode::Rw,
            in_transaction: true,
        })
    }

    async fn commit(self: Box<Self>) -> BackendResult<()> {
        self.state.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> BackendResult<()> {
        self.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct StoreData {
    /// `None` until the tracking space is created
    tracking: Option<BTreeMap<String, Value>>,
    /// Payloads evaluated on behalf of migrations, in order
    payloads: Vec<String>,
}

#[derive(Default)]
struct StoreState {
    data: StoreData,
    mutations: usize,
}

/// In-memory stand-in for a single Tarantool instance
///
/// Understands the tracking-space requests the executor sends. Any other eval
/// is treated as a migration payload and logged; a payload starting with
/// `error(` fails.
#[derive(Clone)]
pub struct MemoryStore {
    space: String,
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new(space: &str) -> Self {
        Self {
            space: space.to_string(),
            state: Arc::new(Mutex::new(StoreState::default())),
        }
    }

    /// IDs currently recorded as applied, ascending
    pub fn applied_ids(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .data
            .tracking
            .as_ref()
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.state.lock().unwrap().data.payloads.clone()
    }

    /// Number of requests that changed the store
    pub fn mutations(&self) -> usize {
        self.state.lock().unwrap().mutations
    }

    pub fn has_space(&self) -> bool {
        self.state.lock().unwrap().data.tracking.is_some()
    }

    /// Pretend a migration was applied by someone else
    pub fn seed_record(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .data
            .tracking
            .get_or_insert_with(BTreeMap::new)
            .insert(id.to_string(), json!([id, "2024-10-08 23:45:00 UTC"]));
    }

    fn apply(&self, request: Request) -> BackendResult<Vec<Value>> {
        let mut state = self.state.lock().unwrap();
        let space = self.space.as_str();

        match request {
            Request::Eval { expr, .. } => {
                if expr == format!("return box.space.{} ~= nil", space) {
                    return Ok(vec![Value::Bool(state.data.tracking.is_some())]);
                }
                if expr == format!("return box.space.{}.index.id:max()", space) {
                    let last = state
                        .data
                        .tracking
                        .as_ref()
                        .and_then(|rows| rows.values().next_back().cloned());
                    return Ok(vec![last.unwrap_or(Value::Null)]);
                }
                if expr.contains(&format!("box.schema.space.create('{}'", space)) {
                    if state.data.tracking.is_none() {
                        state.data.tracking = Some(BTreeMap::new());
                        state.mutations += 1;
                    }
                    return Ok(Vec::new());
                }
                if let Some(message) = expr.strip_prefix("error(") {
                    return Err(BackendError::new(message.trim_end_matches(')').trim_matches('\'')));
                }
                state.data.payloads.push(expr);
                state.mutations += 1;
                Ok(Vec::new())
            }
            Request::Select { key, .. } => {
                let rows = Self::rows(&mut state, space)?;
                let id = key_id(&key)?;
                Ok(rows.get(&id).cloned().into_iter().collect())
            }
            Request::Insert { tuple, .. } => {
                let rows = Self::rows(&mut state, space)?;
                let id = key_id(&tuple)?;
                if rows.contains_key(&id) {
                    return Err(BackendError::new(format!(
                        "Duplicate key exists in unique index \"id\" in space \"{}\"",
                        space
                    )));
                }
                rows.insert(id, Value::Array(tuple));
                state.mutations += 1;
                Ok(Vec::new())
            }
            Request::Delete { key, .. } => {
                let rows = Self::rows(&mut state, space)?;
                let id = key_id(&key)?;
                if rows.remove(&id).is_some() {
                    state.mutations += 1;
                }
                Ok(Vec::new())
            }
        }
    }

    fn rows<'a>(
        state: &'a mut StoreState,
        space: &str,
    ) -> BackendResult<&'a mut BTreeMap<String, Value>> {
        state
            .data
            .tracking
            .as_mut()
            .ok_or_else(|| BackendError::new(format!("Space '{}' does not exist", space)))
    }
}

fn key_id(values: &[Value]) -> BackendResult<String> {
    values
        .first()
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| BackendError::new("Supplied key type of part 0 does not match index part type"))
}

#[async_trait]
impl Pooler for MemoryStore {
    async fn execute(&self, request: Request, _mode: Mode) -> BackendResult<Vec<Value>> {
        self.apply(request)
    }

    async fn begin(&self, _mode: Mode) -> BackendResult<Box<dyn Transaction>> {
        let snapshot = self.state.lock().unwrap().data.clone();
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            snapshot,
        }))
    }
}

/// Runs requests against the live store and restores a snapshot on rollback
struct MemoryTransaction {
    store: MemoryStore,
    snapshot: StoreData,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn execute(&mut self, request: Request) -> BackendResult<Vec<Value>> {
        self.store.apply(request)
    }

    async fn commit(self: Box<Self>) -> BackendResult<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> BackendResult<()> {
        let mut state = self.store.state.lock().unwrap();
        state.data = self.snapshot;
        Ok(())
    }
}
