//! One logical session over every backend.
//!
//! Queries go to the single backend the dispatcher picks; property changes,
//! checkpoints, commit and close fan out to all backends in registry order.

use crate::error::{BackendFailure, RouterError, RouterResult};
use crate::models::{
    BackendInfo, PropertyKind, PropertyValue, RoutedOutcome, TypeMap, Warning,
    timeout_from_millis,
};
use crate::router::backend::Backend;
use crate::router::checkpoint::{Checkpoint, CheckpointManager, CheckpointRef};
use crate::router::dispatcher;
use crate::router::properties::{PropertyCoordinator, PropertyStore};
use crate::router::registry::Registry;
use crate::router::statement::StatementOptions;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
    /// A close or abort left these backends open.
    Degraded { failed: Vec<String> },
}

/// Calls made on every open backend, continuing past failures.
#[derive(Debug, Clone, Copy)]
enum Sweep {
    ClearWarnings,
    Abort,
    Close,
}

impl Sweep {
    fn name(&self) -> &'static str {
        match self {
            Self::ClearWarnings => "clear_warnings",
            Self::Abort => "abort",
            Self::Close => "close",
        }
    }
}

pub struct RoutedSession {
    registry: Registry,
    properties: PropertyStore,
    checkpoints: BTreeMap<u64, Checkpoint>,
    current: Option<u64>,
    state: SessionState,
}

impl RoutedSession {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            properties: PropertyStore::new(),
            checkpoints: BTreeMap::new(),
            current: None,
            state: SessionState::Open,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn ensure_open(&self) -> RouterResult<()> {
        match &self.state {
            SessionState::Open => Ok(()),
            SessionState::Closed => Err(RouterError::SessionClosed),
            SessionState::Degraded { failed } => Err(RouterError::CloseDegraded {
                backends: failed.clone(),
            }),
        }
    }

    // =========================================================================
    // Routing and execution
    // =========================================================================

    /// Name of the backend `sql` would run on.
    pub fn backend_for(&self, sql: &str) -> RouterResult<&str> {
        self.ensure_open()?;
        dispatcher::select(sql, &self.registry).map(Backend::name)
    }

    pub async fn execute(&mut self, sql: &str) -> RouterResult<RoutedOutcome> {
        self.execute_with(sql, &StatementOptions::default()).await
    }

    /// Route `sql` and run it with the statement's options replayed.
    pub async fn execute_with(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> RouterResult<RoutedOutcome> {
        self.ensure_open()?;
        let index = dispatcher::select_index(sql, &self.registry)?;
        self.execute_at(index, sql, options).await
    }

    /// Run `sql` on the named backend, bypassing dispatch.
    pub async fn execute_on(
        &mut self,
        backend: &str,
        sql: &str,
        options: &StatementOptions,
    ) -> RouterResult<RoutedOutcome> {
        self.ensure_open()?;
        let index = self
            .registry
            .position(backend)
            .ok_or_else(|| RouterError::unknown_backend(backend))?;
        self.execute_at(index, sql, options).await
    }

    async fn execute_at(
        &mut self,
        index: usize,
        sql: &str,
        options: &StatementOptions,
    ) -> RouterResult<RoutedOutcome> {
        let exec_options = options.to_execute_options();
        let backend = self
            .registry
            .at_mut(index)
            .ok_or_else(|| RouterError::unknown_backend(index.to_string()))?;
        let name = backend.name().to_string();
        let outcome = backend
            .connection()
            .execute(sql, &exec_options)
            .await
            .map_err(|e| RouterError::backend(&name, e))?;
        Ok(RoutedOutcome {
            backend: name,
            outcome,
        })
    }

    // =========================================================================
    // Coordinated properties
    // =========================================================================

    /// Apply a property on every backend.
    pub async fn set_property(&mut self, value: PropertyValue) -> RouterResult<()> {
        self.ensure_open()?;
        let kind = value.kind();
        let commits = matches!(value, PropertyValue::AutoCommit(true))
            && self.properties.get(kind).ok() != Some(&PropertyValue::AutoCommit(true));
        PropertyCoordinator::apply(
            &mut self.properties,
            self.registry.backends_mut(),
            value,
        )
        .await?;
        if commits {
            // Switching auto-commit on commits the open transaction.
            self.forget_checkpoints_after(0);
        }
        Ok(())
    }

    /// Last confirmed value of a property. Never touches the backends.
    pub fn property(&self, kind: PropertyKind) -> RouterResult<PropertyValue> {
        self.ensure_open()?;
        if kind == PropertyKind::TypeMap && !self.properties.was_initiated(kind) {
            return Ok(PropertyValue::TypeMap(TypeMap::new()));
        }
        self.properties.get(kind).cloned()
    }

    pub async fn set_auto_commit(&mut self, auto_commit: bool) -> RouterResult<()> {
        self.set_property(PropertyValue::AutoCommit(auto_commit))
            .await
    }

    pub fn auto_commit(&self) -> RouterResult<bool> {
        match self.property(PropertyKind::AutoCommit)? {
            PropertyValue::AutoCommit(on) => Ok(on),
            other => Err(mismatch(PropertyKind::AutoCommit, &other)),
        }
    }

    pub async fn set_read_only(&mut self, read_only: bool) -> RouterResult<()> {
        self.set_property(PropertyValue::ReadOnly(read_only)).await
    }

    pub fn read_only(&self) -> RouterResult<bool> {
        match self.property(PropertyKind::ReadOnly)? {
            PropertyValue::ReadOnly(on) => Ok(on),
            other => Err(mismatch(PropertyKind::ReadOnly, &other)),
        }
    }

    pub async fn set_schema(&mut self, schema: &str) -> RouterResult<()> {
        self.set_property(PropertyValue::Schema(schema.to_string()))
            .await
    }

    pub fn schema(&self) -> RouterResult<String> {
        match self.property(PropertyKind::Schema)? {
            PropertyValue::Schema(schema) => Ok(schema),
            other => Err(mismatch(PropertyKind::Schema, &other)),
        }
    }

    pub async fn set_catalog(&mut self, catalog: &str) -> RouterResult<()> {
        self.set_property(PropertyValue::Catalog(catalog.to_string()))
            .await
    }

    pub fn catalog(&self) -> RouterResult<String> {
        match self.property(PropertyKind::Catalog)? {
            PropertyValue::Catalog(catalog) => Ok(catalog),
            other => Err(mismatch(PropertyKind::Catalog, &other)),
        }
    }

    pub async fn set_network_timeout(&mut self, timeout: Option<Duration>) -> RouterResult<()> {
        self.set_property(PropertyValue::network_timeout(timeout))
            .await
    }

    pub fn network_timeout(&self) -> RouterResult<Option<Duration>> {
        match self.property(PropertyKind::NetworkTimeout)? {
            PropertyValue::NetworkTimeout(millis) => Ok(timeout_from_millis(millis)),
            other => Err(mismatch(PropertyKind::NetworkTimeout, &other)),
        }
    }

    pub async fn set_type_map(&mut self, type_map: TypeMap) -> RouterResult<()> {
        self.set_property(PropertyValue::TypeMap(type_map)).await
    }

    /// The confirmed type map, or an empty map if none was ever set.
    pub fn type_map(&self) -> RouterResult<TypeMap> {
        match self.property(PropertyKind::TypeMap)? {
            PropertyValue::TypeMap(map) => Ok(map),
            other => Err(mismatch(PropertyKind::TypeMap, &other)),
        }
    }

    /// True if `timeout` fits within the confirmed network timeout.
    ///
    /// A network timeout of zero means no limit.
    pub fn is_valid(&self, timeout: Duration) -> RouterResult<bool> {
        Ok(match self.network_timeout()? {
            Some(limit) => timeout <= limit,
            None => true,
        })
    }

    // =========================================================================
    // Commit and checkpoints
    // =========================================================================

    /// Commit every backend in order, stopping at the first failure.
    ///
    /// Backends committed before the failure stay committed.
    pub async fn commit(&mut self) -> RouterResult<()> {
        self.ensure_open()?;
        for backend in self.registry.backends_mut() {
            if let Err(source) = backend.connection().commit().await {
                error!(backend = %backend.name(), error = %source, "Commit aborted");
                return Err(RouterError::Commit {
                    backend: backend.name().to_string(),
                    source,
                });
            }
        }
        self.forget_checkpoints_after(0);
        info!(backends = self.registry.len(), "Session committed");
        Ok(())
    }

    /// Set a savepoint on every backend and make it the current checkpoint.
    ///
    /// If any backend refuses, no checkpoint is current afterwards.
    pub async fn set_savepoint(&mut self, name: Option<&str>) -> RouterResult<CheckpointRef> {
        self.ensure_open()?;
        let checkpoint = match CheckpointManager::create(name, self.registry.backends_mut()).await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                self.current = None;
                return Err(e);
            }
        };
        let reference = checkpoint.to_ref();
        self.current = Some(reference.id);
        self.checkpoints.insert(reference.id, checkpoint);
        Ok(reference)
    }

    pub fn current_checkpoint(&self) -> Option<CheckpointRef> {
        self.current
            .and_then(|id| self.checkpoints.get(&id))
            .map(Checkpoint::to_ref)
    }

    /// Roll back to the current checkpoint.
    pub async fn rollback(&mut self) -> RouterResult<()> {
        self.ensure_open()?;
        let reference = self
            .current_checkpoint()
            .ok_or(RouterError::NoCurrentCheckpoint)?;
        self.rollback_to(&reference).await
    }

    pub async fn rollback_to(&mut self, reference: &CheckpointRef) -> RouterResult<()> {
        self.ensure_open()?;
        let checkpoint = active_checkpoint(&mut self.checkpoints, reference)?;
        CheckpointManager::rollback_to(checkpoint, self.registry.backends_mut()).await?;
        // Rolling back to a savepoint discards it and every later one.
        self.forget_checkpoints_after(reference.id.saturating_sub(1));
        Ok(())
    }

    pub async fn release_savepoint(&mut self, reference: &CheckpointRef) -> RouterResult<()> {
        self.ensure_open()?;
        let checkpoint = active_checkpoint(&mut self.checkpoints, reference)?;
        let result =
            CheckpointManager::release(checkpoint, self.registry.backends_mut()).await;
        self.forget_checkpoints_after(reference.id.saturating_sub(1));
        result
    }

    /// Drop checkpoints with an id above `id`, clearing the current slot if
    /// it pointed at one of them.
    fn forget_checkpoints_after(&mut self, id: u64) {
        let dropped = self.checkpoints.split_off(&(id + 1));
        if !dropped.is_empty() {
            debug!(checkpoints = dropped.len(), "Checkpoints retired");
        }
        if self.current.is_some_and(|current| current > id) {
            self.current = None;
        }
    }

    // =========================================================================
    // Default backend
    // =========================================================================

    pub fn set_default_backend(&mut self, name: &str) -> RouterResult<()> {
        self.ensure_open()?;
        self.registry.set_default(name)
    }

    pub fn unset_default_backend(&mut self) -> RouterResult<()> {
        self.ensure_open()?;
        self.registry.unset_default();
        Ok(())
    }

    pub fn backends(&self) -> Vec<BackendInfo> {
        self.registry.summary()
    }

    // =========================================================================
    // Warnings, abort and close
    // =========================================================================

    /// Warnings from every backend, tagged with the backend name.
    pub async fn warnings(&mut self) -> RouterResult<Vec<Warning>> {
        self.ensure_open()?;
        let mut all = Vec::new();
        let mut failures = Vec::new();
        for backend in self.registry.backends_mut() {
            match backend.connection().warnings().await {
                Ok(warnings) => all.extend(warnings.into_iter().map(|mut w| {
                    w.backend = backend.name().to_string();
                    w
                })),
                Err(e) => failures.push(BackendFailure::new(backend.name(), e)),
            }
        }
        if failures.is_empty() {
            Ok(all)
        } else {
            Err(RouterError::Aggregated {
                operation: "warnings".to_string(),
                failures,
            })
        }
    }

    pub async fn clear_warnings(&mut self) -> RouterResult<()> {
        self.ensure_open()?;
        let failures = self.sweep(Sweep::ClearWarnings).await;
        aggregate(Sweep::ClearWarnings.name(), failures)
    }

    /// Abort every backend. The session is closed once all aborts succeed.
    pub async fn abort(&mut self) -> RouterResult<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        let failures = self.sweep(Sweep::Abort).await;
        self.settle_shutdown(&failures);
        aggregate(Sweep::Abort.name(), failures)
    }

    /// Close every backend, collecting every failure.
    ///
    /// The session only counts as closed once every backend closed; otherwise
    /// it is degraded and [`RoutedSession::is_closed`] reports which backends
    /// are still open. Closing again retries the remaining backends.
    pub async fn close(&mut self) -> RouterResult<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        let failures = self.sweep(Sweep::Close).await;
        self.settle_shutdown(&failures);
        if failures.is_empty() {
            info!("Routed session closed");
            Ok(())
        } else {
            Err(RouterError::AggregatedClose { failures })
        }
    }

    /// `Ok(true)` once fully closed; `CloseDegraded` if a close left backends open.
    pub fn is_closed(&self) -> RouterResult<bool> {
        match &self.state {
            SessionState::Open => Ok(false),
            SessionState::Closed => Ok(true),
            SessionState::Degraded { failed } => Err(RouterError::CloseDegraded {
                backends: failed.clone(),
            }),
        }
    }

    fn settle_shutdown(&mut self, failures: &[BackendFailure]) {
        self.checkpoints.clear();
        self.current = None;
        if failures.is_empty() {
            self.state = SessionState::Closed;
        } else {
            let failed: Vec<String> = failures.iter().map(|f| f.backend.clone()).collect();
            warn!(backends = ?failed, "Session shutdown incomplete");
            self.state = SessionState::Degraded { failed };
        }
    }

    /// Run `op` on every backend that is still open, continuing past failures.
    async fn sweep(&mut self, op: Sweep) -> Vec<BackendFailure> {
        let mut failures = Vec::new();
        for backend in self.registry.backends_mut() {
            if backend.is_closed() {
                continue;
            }
            let conn = backend.connection();
            let result = match op {
                Sweep::ClearWarnings => conn.clear_warnings().await,
                Sweep::Abort => conn.abort().await,
                Sweep::Close => conn.close().await,
            };
            if let Err(e) = result {
                warn!(backend = %backend.name(), operation = op.name(), error = %e, "Backend call failed");
                failures.push(BackendFailure::new(backend.name(), e));
            }
        }
        failures
    }

    // =========================================================================
    // Unsupported surface
    // =========================================================================

    pub fn set_transaction_isolation(&mut self, _level: &str) -> RouterResult<()> {
        Err(RouterError::unsupported("set_transaction_isolation"))
    }

    pub fn transaction_isolation(&self) -> RouterResult<String> {
        Err(RouterError::unsupported("transaction_isolation"))
    }

    pub fn set_holdability(&mut self, _holdability: &str) -> RouterResult<()> {
        Err(RouterError::unsupported("set_holdability"))
    }

    pub fn holdability(&self) -> RouterResult<String> {
        Err(RouterError::unsupported("holdability"))
    }

    pub fn set_client_info(&mut self, _name: &str, _value: &str) -> RouterResult<()> {
        Err(RouterError::unsupported("set_client_info"))
    }

    /// LOB, array and struct values cannot be created across backends.
    pub fn create_value(&mut self, kind: &str) -> RouterResult<()> {
        Err(RouterError::unsupported(format!("create {}", kind)))
    }
}

fn active_checkpoint<'c>(
    checkpoints: &'c mut BTreeMap<u64, Checkpoint>,
    reference: &CheckpointRef,
) -> RouterResult<&'c mut Checkpoint> {
    checkpoints
        .get_mut(&reference.id)
        .filter(|cp| cp.name() == reference.name)
        .ok_or_else(|| RouterError::InvalidCheckpoint {
            id: reference.id,
            name: reference.name.clone(),
        })
}

fn aggregate(operation: &str, failures: Vec<BackendFailure>) -> RouterResult<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(RouterError::Aggregated {
            operation: operation.to_string(),
            failures,
        })
    }
}

fn mismatch(kind: PropertyKind, value: &PropertyValue) -> RouterError {
    RouterError::Config {
        message: format!("property {} holds a {} value", kind, value.kind()),
    }
}

impl std::fmt::Debug for RoutedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutedSession")
            .field("backends", &self.registry.names())
            .field("current", &self.current)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::testing::{StubConnection, registry, stub_backend};

    async fn session(stubs: &[(&str, &StubConnection)]) -> RoutedSession {
        let backends = stubs.iter().map(|(n, s)| stub_backend(n, s)).collect();
        RoutedSession::new(registry(backends, None).await)
    }

    #[tokio::test]
    async fn test_type_map_defaults_to_empty() {
        let a = StubConnection::default();
        let s = session(&[("a", &a)]).await;
        assert!(s.type_map().unwrap().is_empty());
        assert!(matches!(
            s.schema(),
            Err(RouterError::PropertyNotSet { .. })
        ));
    }

    #[tokio::test]
    async fn test_is_valid_compares_network_timeout() {
        let a = StubConnection::default();
        let mut s = session(&[("a", &a)]).await;
        s.set_network_timeout(Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(s.is_valid(Duration::from_secs(5)).unwrap());
        assert!(!s.is_valid(Duration::from_secs(6)).unwrap());
        s.set_network_timeout(None).await.unwrap();
        assert!(s.is_valid(Duration::from_secs(600)).unwrap());
    }

    #[tokio::test]
    async fn test_rollback_without_checkpoint() {
        let a = StubConnection::default();
        let mut s = session(&[("a", &a)]).await;
        assert!(matches!(
            s.rollback().await,
            Err(RouterError::NoCurrentCheckpoint)
        ));
    }

    #[tokio::test]
    async fn test_rollback_retires_later_checkpoints() {
        let a = StubConnection::default();
        let mut s = session(&[("a", &a)]).await;
        let first = s.set_savepoint(Some("first")).await.unwrap();
        let second = s.set_savepoint(None).await.unwrap();
        assert_eq!(s.current_checkpoint(), Some(second.clone()));

        s.rollback_to(&first).await.unwrap();
        assert_eq!(s.current_checkpoint(), None);
        assert!(matches!(
            s.release_savepoint(&second).await,
            Err(RouterError::InvalidCheckpoint { .. })
        ));
    }

    #[tokio::test]
    async fn test_unsupported_surface() {
        let a = StubConnection::default();
        let mut s = session(&[("a", &a)]).await;
        assert!(matches!(
            s.set_transaction_isolation("SERIALIZABLE"),
            Err(RouterError::Unsupported { .. })
        ));
        assert!(matches!(
            s.create_value("blob"),
            Err(RouterError::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_session_rejects_calls() {
        let a = StubConnection::default();
        let mut s = session(&[("a", &a)]).await;
        s.close().await.unwrap();
        assert!(s.is_closed().unwrap());
        assert!(matches!(
            s.execute("SELECT 1").await,
            Err(RouterError::SessionClosed)
        ));
        assert!(matches!(
            s.set_read_only(true).await,
            Err(RouterError::SessionClosed)
        ));
        // Closing twice is a no-op.
        s.close().await.unwrap();
    }
}
