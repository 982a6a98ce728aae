//! Savepoints spanning every backend.

use crate::db::SavepointHandle;
use crate::error::{BackendFailure, DbError, RouterError, RouterResult};
use crate::router::backend::Backend;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

static NEXT_CHECKPOINT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_CHECKPOINT_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointState {
    Pending,
    Active,
    RolledBack,
    Released,
}

impl CheckpointState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RolledBack | Self::Released)
    }
}

/// What callers hold to name a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct BackendSavepoint {
    pub backend: String,
    pub handle: SavepointHandle,
}

/// One savepoint per backend, created and retired together.
#[derive(Debug)]
pub struct Checkpoint {
    id: u64,
    name: String,
    savepoints: Vec<BackendSavepoint>,
    state: CheckpointState,
    created_at: DateTime<Utc>,
}

impl Checkpoint {
    fn pending(name: Option<&str>) -> Self {
        let id = next_id();
        Self {
            id,
            name: name
                .map(String::from)
                .unwrap_or_else(|| format!("db{}_savepoint", id)),
            savepoints: Vec::new(),
            state: CheckpointState::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CheckpointState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn savepoints(&self) -> &[BackendSavepoint] {
        &self.savepoints
    }

    pub fn to_ref(&self) -> CheckpointRef {
        CheckpointRef {
            id: self.id,
            name: self.name.clone(),
        }
    }

    fn ensure_active(&self) -> RouterResult<()> {
        if self.state == CheckpointState::Active {
            Ok(())
        } else {
            Err(RouterError::InvalidCheckpoint {
                id: self.id,
                name: self.name.clone(),
            })
        }
    }
}

fn backend_named<'b>(backends: &'b mut [Backend], name: &str) -> Option<&'b mut Backend> {
    backends.iter_mut().find(|b| b.name() == name)
}

pub struct CheckpointManager;

impl CheckpointManager {
    /// Set a savepoint on every backend in registry order.
    ///
    /// If any backend fails, every savepoint already set is released and no
    /// checkpoint is returned.
    pub async fn create(name: Option<&str>, backends: &mut [Backend]) -> RouterResult<Checkpoint> {
        let mut checkpoint = Checkpoint::pending(name);
        let mut failure = None;

        for backend in backends.iter_mut() {
            match backend.connection().set_savepoint(&checkpoint.name).await {
                Ok(handle) => checkpoint.savepoints.push(BackendSavepoint {
                    backend: backend.name().to_string(),
                    handle,
                }),
                Err(source) => {
                    failure = Some((backend.name().to_string(), source));
                    break;
                }
            }
        }

        if let Some((failed, source)) = failure {
            warn!(
                checkpoint = %checkpoint.name,
                backend = %failed,
                error = %source,
                "Savepoint failed, releasing partial checkpoint"
            );
            let release_failures = release_each(&checkpoint.savepoints, backends).await;
            return Err(RouterError::PartialSavepoint {
                checkpoint: checkpoint.name,
                backend: failed,
                source,
                release_failures,
            });
        }

        checkpoint.state = CheckpointState::Active;
        info!(
            checkpoint = %checkpoint.name,
            id = checkpoint.id,
            backends = checkpoint.savepoints.len(),
            "Checkpoint created"
        );
        Ok(checkpoint)
    }

    /// Roll every backend back to the checkpoint, stopping at the first failure.
    ///
    /// Backends after the failing one are not attempted and the checkpoint
    /// stays active.
    pub async fn rollback_to(
        checkpoint: &mut Checkpoint,
        backends: &mut [Backend],
    ) -> RouterResult<()> {
        checkpoint.ensure_active()?;

        for sp in &checkpoint.savepoints {
            let result = match backend_named(backends, &sp.backend) {
                Some(backend) => backend.connection().rollback_to_savepoint(&sp.handle).await,
                None => Err(DbError::internal("backend left the registry")),
            };
            if let Err(source) = result {
                error!(
                    checkpoint = %checkpoint.name,
                    backend = %sp.backend,
                    error = %source,
                    "Rollback to checkpoint aborted"
                );
                return Err(RouterError::CheckpointRollback {
                    checkpoint: checkpoint.name.clone(),
                    backend: sp.backend.clone(),
                    source,
                });
            }
        }

        checkpoint.state = CheckpointState::RolledBack;
        info!(checkpoint = %checkpoint.name, "Rolled back to checkpoint");
        Ok(())
    }

    /// Release the checkpoint on every backend, collecting every failure.
    pub async fn release(checkpoint: &mut Checkpoint, backends: &mut [Backend]) -> RouterResult<()> {
        checkpoint.ensure_active()?;

        let failures = release_each(&checkpoint.savepoints, backends).await;
        checkpoint.state = CheckpointState::Released;

        if failures.is_empty() {
            info!(checkpoint = %checkpoint.name, "Checkpoint released");
            Ok(())
        } else {
            Err(RouterError::CheckpointRelease {
                checkpoint: checkpoint.name.clone(),
                failures,
            })
        }
    }
}

async fn release_each(savepoints: &[BackendSavepoint], backends: &mut [Backend]) -> Vec<BackendFailure> {
    let mut failures = Vec::new();
    for sp in savepoints {
        let result = match backend_named(backends, &sp.backend) {
            Some(backend) => backend.connection().release_savepoint(&sp.handle).await,
            None => Err(DbError::internal("backend left the registry")),
        };
        match result {
            Ok(()) => debug!(backend = %sp.backend, savepoint = %sp.handle.name, "Savepoint released"),
            Err(e) => {
                warn!(backend = %sp.backend, error = %e, "Failed to release savepoint");
                failures.push(BackendFailure::new(&sp.backend, e));
            }
        }
    }
    failures
}
