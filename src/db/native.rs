//! The capability every routed backend connection provides.
//!
//! The routing core only ever talks to backends through [`NativeConnection`],
//! so any driver (or a test double) can sit behind a backend.

use crate::error::DbResult;
use crate::models::{ExecuteOptions, ExecuteOutcome, TypeMap, Warning};
use async_trait::async_trait;
use std::time::Duration;

/// A savepoint set on one native connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavepointHandle {
    pub id: u64,
    /// Identifier the backend knows the savepoint by.
    pub name: String,
}

impl SavepointHandle {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// One live connection to one database.
///
/// Every call is a single awaited operation; implementations must not retry.
#[async_trait]
pub trait NativeConnection: Send {
    /// Run one SQL statement.
    async fn execute(&mut self, sql: &str, options: &ExecuteOptions) -> DbResult<ExecuteOutcome>;

    async fn auto_commit(&mut self) -> DbResult<bool>;
    async fn set_auto_commit(&mut self, auto_commit: bool) -> DbResult<()>;

    async fn read_only(&mut self) -> DbResult<bool>;
    async fn set_read_only(&mut self, read_only: bool) -> DbResult<()>;

    async fn schema(&mut self) -> DbResult<String>;
    async fn set_schema(&mut self, schema: &str) -> DbResult<()>;

    async fn catalog(&mut self) -> DbResult<String>;
    async fn set_catalog(&mut self, catalog: &str) -> DbResult<()>;

    /// `None` means no timeout.
    async fn network_timeout(&mut self) -> DbResult<Option<Duration>>;
    async fn set_network_timeout(&mut self, timeout: Option<Duration>) -> DbResult<()>;

    async fn type_map(&mut self) -> DbResult<TypeMap>;
    async fn set_type_map(&mut self, type_map: TypeMap) -> DbResult<()>;

    /// Set a savepoint. `label` is informational; the handle carries the
    /// identifier the backend actually uses.
    async fn set_savepoint(&mut self, label: &str) -> DbResult<SavepointHandle>;
    async fn rollback_to_savepoint(&mut self, savepoint: &SavepointHandle) -> DbResult<()>;
    async fn release_savepoint(&mut self, savepoint: &SavepointHandle) -> DbResult<()>;

    async fn commit(&mut self) -> DbResult<()>;

    /// Close the connection. Closing an already closed connection succeeds.
    async fn close(&mut self) -> DbResult<()>;
    fn is_closed(&self) -> bool;

    async fn warnings(&mut self) -> DbResult<Vec<Warning>>;
    async fn clear_warnings(&mut self) -> DbResult<()>;

    /// Drop the connection without a graceful shutdown.
    async fn abort(&mut self) -> DbResult<()>;
}
