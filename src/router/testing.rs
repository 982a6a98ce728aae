//! In-memory native connection for unit tests.

use crate::db::{NativeConnection, SavepointHandle};
use crate::error::{DbError, DbResult};
use crate::models::{ExecuteOptions, ExecuteOutcome, TypeMap, Warning};
use crate::router::backend::Backend;
use crate::router::registry::Registry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug)]
pub struct StubState {
    pub auto_commit: bool,
    pub read_only: bool,
    pub schema: String,
    pub calls: Vec<String>,
    pub closed: bool,
    /// Operation name -> number of calls that succeed before it starts failing.
    pub fail_after: HashMap<&'static str, usize>,
    seen: HashMap<&'static str, usize>,
    next_savepoint: u64,
}

impl Default for StubState {
    fn default() -> Self {
        Self {
            auto_commit: true,
            read_only: false,
            schema: "public".to_string(),
            calls: Vec::new(),
            closed: false,
            fail_after: HashMap::new(),
            seen: HashMap::new(),
            next_savepoint: 1,
        }
    }
}

#[derive(Clone, Default)]
pub struct StubConnection {
    pub state: Arc<Mutex<StubState>>,
}

impl StubConnection {
    pub fn failing(op: &'static str, after: usize) -> Self {
        let stub = Self::default();
        stub.state.lock().unwrap().fail_after.insert(op, after);
        stub
    }

    fn enter(&self, op: &'static str) -> DbResult<std::sync::MutexGuard<'_, StubState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op.to_string());
        let seen = state.seen.entry(op).or_insert(0);
        *seen += 1;
        let seen = *seen;
        if state.fail_after.get(op).is_some_and(|after| seen > *after) {
            return Err(DbError::internal(format!("{} failed", op)));
        }
        Ok(state)
    }
}

pub fn backend(name: &str, pattern: &str) -> Backend {
    Backend::with_pattern(name, pattern, Box::new(StubConnection::default())).unwrap()
}

pub fn stub_backend(name: &str, stub: &StubConnection) -> Backend {
    Backend::with_pattern(name, name, Box::new(stub.clone())).unwrap()
}

pub async fn registry(backends: Vec<Backend>, default: Option<&str>) -> Registry {
    Registry::build(backends, default).await.unwrap()
}

#[async_trait]
impl NativeConnection for StubConnection {
    async fn execute(&mut self, _sql: &str, _options: &ExecuteOptions) -> DbResult<ExecuteOutcome> {
        self.enter("execute")?;
        Ok(ExecuteOutcome::write_result(0, 0))
    }

    async fn auto_commit(&mut self) -> DbResult<bool> {
        Ok(self.enter("auto_commit")?.auto_commit)
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> DbResult<()> {
        self.enter("set_auto_commit")?.auto_commit = auto_commit;
        Ok(())
    }

    async fn read_only(&mut self) -> DbResult<bool> {
        Ok(self.enter("read_only")?.read_only)
    }

    async fn set_read_only(&mut self, read_only: bool) -> DbResult<()> {
        self.enter("set_read_only")?.read_only = read_only;
        Ok(())
    }

    async fn schema(&mut self) -> DbResult<String> {
        Ok(self.enter("schema")?.schema.clone())
    }

    async fn set_schema(&mut self, schema: &str) -> DbResult<()> {
        self.enter("set_schema")?.schema = schema.to_string();
        Ok(())
    }

    async fn catalog(&mut self) -> DbResult<String> {
        self.enter("catalog")?;
        Ok(String::new())
    }

    async fn set_catalog(&mut self, _catalog: &str) -> DbResult<()> {
        self.enter("set_catalog")?;
        Ok(())
    }

    async fn network_timeout(&mut self) -> DbResult<Option<Duration>> {
        self.enter("network_timeout")?;
        Ok(None)
    }

    async fn set_network_timeout(&mut self, _timeout: Option<Duration>) -> DbResult<()> {
        self.enter("set_network_timeout")?;
        Ok(())
    }

    async fn type_map(&mut self) -> DbResult<TypeMap> {
        self.enter("type_map")?;
        Ok(TypeMap::new())
    }

    async fn set_type_map(&mut self, _type_map: TypeMap) -> DbResult<()> {
        self.enter("set_type_map")?;
        Ok(())
    }

    async fn set_savepoint(&mut self, _label: &str) -> DbResult<SavepointHandle> {
        let mut state = self.enter("set_savepoint")?;
        let id = state.next_savepoint;
        state.next_savepoint += 1;
        Ok(SavepointHandle::new(id, format!("sp_{}", id)))
    }

    async fn rollback_to_savepoint(&mut self, _savepoint: &SavepointHandle) -> DbResult<()> {
        self.enter("rollback_to_savepoint")?;
        Ok(())
    }

    async fn release_savepoint(&mut self, _savepoint: &SavepointHandle) -> DbResult<()> {
        self.enter("release_savepoint")?;
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.enter("commit")?;
        Ok(())
    }

    async fn close(&mut self) -> DbResult<()> {
        self.enter("close")?.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    async fn warnings(&mut self) -> DbResult<Vec<Warning>> {
        self.enter("warnings")?;
        Ok(Vec::new())
    }

    async fn clear_warnings(&mut self) -> DbResult<()> {
        self.enter("clear_warnings")?;
        Ok(())
    }

    async fn abort(&mut self) -> DbResult<()> {
        self.enter("abort")?.closed = true;
        Ok(())
    }
}
