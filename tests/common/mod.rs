//! Shared test doubles for the router integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use db_router::config::ProxyConfig;
use db_router::db::{NativeConnection, SavepointHandle};
use db_router::error::{DbError, DbResult};
use db_router::models::{BackendConfig, ExecuteOptions, ExecuteOutcome, TypeMap, Warning};
use db_router::router::{Backend, Connector, Registry, RoutedSession};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Calls made across every mock in a test, as `"<backend>:<op>"`.
pub type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone, Copy)]
pub enum Fail {
    /// Every call fails.
    Always,
    /// Only the n-th call (1-based) fails.
    Nth(usize),
}

#[derive(Debug)]
pub struct MockState {
    pub auto_commit: bool,
    pub read_only: bool,
    pub schema: String,
    pub catalog: String,
    pub network_timeout: Option<Duration>,
    pub type_map: TypeMap,
    pub closed: bool,
    pub warnings: Vec<Warning>,
    fail: HashMap<&'static str, Fail>,
    seen: HashMap<&'static str, usize>,
    next_savepoint: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            auto_commit: true,
            read_only: false,
            schema: "public".to_string(),
            catalog: "main".to_string(),
            network_timeout: None,
            type_map: TypeMap::new(),
            closed: false,
            warnings: Vec::new(),
            fail: HashMap::new(),
            seen: HashMap::new(),
            next_savepoint: 1,
        }
    }
}

/// Native connection double that records every call into a shared journal.
#[derive(Clone)]
pub struct MockConnection {
    pub name: String,
    pub state: Arc<Mutex<MockState>>,
    journal: Journal,
}

impl MockConnection {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::new(Mutex::new(MockState::default())),
            journal: journal.clone(),
        }
    }

    pub fn fail(&self, op: &'static str, mode: Fail) -> &Self {
        self.state.lock().unwrap().fail.insert(op, mode);
        self
    }

    pub fn heal(&self, op: &'static str) {
        self.state.lock().unwrap().fail.remove(op);
    }

    pub fn push_warning(&self, message: &str) {
        self.state.lock().unwrap().warnings.push(Warning::new(message));
    }

    pub fn read_only_value(&self) -> bool {
        self.state.lock().unwrap().read_only
    }

    pub fn is_closed_now(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    fn enter(&self, op: &'static str) -> DbResult<std::sync::MutexGuard<'_, MockState>> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, op));
        let mut state = self.state.lock().unwrap();
        let seen = {
            let seen = state.seen.entry(op).or_insert(0);
            *seen += 1;
            *seen
        };
        let failing = match state.fail.get(op) {
            Some(Fail::Always) => true,
            Some(Fail::Nth(n)) => *n == seen,
            None => false,
        };
        if failing {
            return Err(DbError::internal(format!("{} refused by {}", op, self.name)));
        }
        Ok(state)
    }
}

#[async_trait]
impl NativeConnection for MockConnection {
    async fn execute(&mut self, sql: &str, _options: &ExecuteOptions) -> DbResult<ExecuteOutcome> {
        self.enter("execute")?;
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:sql:{}", self.name, sql));
        Ok(ExecuteOutcome::write_result(1, 0))
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
        Ok(self.enter("catalog")?.catalog.clone())
    }

    async fn set_catalog(&mut self, catalog: &str) -> DbResult<()> {
        self.enter("set_catalog")?.catalog = catalog.to_string();
        Ok(())
    }

    async fn network_timeout(&mut self) -> DbResult<Option<Duration>> {
        Ok(self.enter("network_timeout")?.network_timeout)
    }

    async fn set_network_timeout(&mut self, timeout: Option<Duration>) -> DbResult<()> {
        self.enter("set_network_timeout")?.network_timeout = timeout;
        Ok(())
    }

    async fn type_map(&mut self) -> DbResult<TypeMap> {
        Ok(self.enter("type_map")?.type_map.clone())
    }

    async fn set_type_map(&mut self, type_map: TypeMap) -> DbResult<()> {
        self.enter("set_type_map")?.type_map = type_map;
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
        Ok(self.enter("warnings")?.warnings.clone())
    }

    async fn clear_warnings(&mut self) -> DbResult<()> {
        self.enter("clear_warnings")?.warnings.clear();
        Ok(())
    }

    async fn abort(&mut self) -> DbResult<()> {
        self.enter("abort")?.closed = true;
        Ok(())
    }
}

/// One mock per name, all recording into one journal.
pub fn mocks(names: &[&str]) -> (Vec<MockConnection>, Journal) {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let mocks = names
        .iter()
        .map(|name| MockConnection::new(name, &journal))
        .collect();
    (mocks, journal)
}

pub fn backends(specs: &[(&str, &str)], mocks: &[MockConnection]) -> Vec<Backend> {
    specs
        .iter()
        .zip(mocks)
        .map(|((name, pattern), mock)| {
            Backend::with_pattern(*name, pattern, Box::new(mock.clone())).unwrap()
        })
        .collect()
}

pub async fn registry(
    specs: &[(&str, &str)],
    default: Option<&str>,
) -> (Registry, Vec<MockConnection>, Journal) {
    let names: Vec<&str> = specs.iter().map(|(name, _)| *name).collect();
    let (mocks, journal) = mocks(&names);
    let registry = Registry::build(backends(specs, &mocks), default)
        .await
        .unwrap();
    (registry, mocks, journal)
}

/// A session over backends `a`, `b`, `c` routing on `alpha`, `beta`, `gamma`.
pub async fn session_abc() -> (RoutedSession, Vec<MockConnection>, Journal) {
    let (registry, mocks, journal) =
        registry(&[("a", "alpha"), ("b", "beta"), ("c", "gamma")], None).await;
    (RoutedSession::new(registry), mocks, journal)
}

pub fn journal_entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

pub fn clear_journal(journal: &Journal) {
    journal.lock().unwrap().clear();
}

/// Number of `op` calls recorded for `backend`.
pub fn count(journal: &Journal, backend: &str, op: &str) -> usize {
    let entry = format!("{}:{}", backend, op);
    journal.lock().unwrap().iter().filter(|e| **e == entry).count()
}

/// Connector handing out mocks, failing for the named backends.
pub struct MockConnector {
    pub journal: Journal,
    pub failing: Vec<String>,
    pub opened: Mutex<Vec<MockConnection>>,
}

impl MockConnector {
    pub fn new(failing: &[&str]) -> Self {
        Self {
            journal: Arc::new(Mutex::new(Vec::new())),
            failing: failing.iter().map(|s| s.to_string()).collect(),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<MockConnection> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, config: &BackendConfig) -> DbResult<Box<dyn NativeConnection>> {
        if self.failing.contains(&config.name) {
            return Err(DbError::connection(
                format!("cannot reach {}", config.name),
                "check the backend",
            ));
        }
        let mock = MockConnection::new(&config.name, &self.journal);
        self.opened.lock().unwrap().push(mock.clone());
        Ok(Box::new(mock))
    }
}

/// Backend configs on in-memory SQLite URLs; the mock connector never dials them.
pub fn proxy_config(specs: &[(&str, &str)], default: Option<&str>) -> ProxyConfig {
    ProxyConfig {
        backends: specs
            .iter()
            .map(|(name, pattern)| {
                BackendConfig::new(*name, "sqlite::memory:", *pattern, None).unwrap()
            })
            .collect(),
        default: default.map(str::to_string),
    }
}
