//! Transaction tools spanning every backend.
//!
//! This module implements MCP tools for the session-wide transaction:
//! - `commit`: commit every backend in order
//! - `set_savepoint`: create a checkpoint on every backend
//! - `rollback`: roll back to a checkpoint (the current one by default)
//! - `release_savepoint`: release a checkpoint on every backend
//!
//! Savepoints require auto-commit to be off (`set_property` with
//! `auto_commit` = false).

use crate::error::{RouterError, RouterResult};
use crate::router::CheckpointRef;
use crate::tools::SharedSession;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Output from the commit tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CommitOutput {
    /// Whether every backend committed
    pub success: bool,
    /// Number of backends committed
    pub backends: usize,
    /// Human-readable status message
    pub message: String,
}

/// Input for the set_savepoint tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SetSavepointInput {
    /// Optional savepoint name. Generated from the checkpoint id if omitted
    #[serde(default)]
    pub name: Option<String>,
}

/// Output from the set_savepoint tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SetSavepointOutput {
    /// Reference to pass to rollback/release_savepoint
    pub checkpoint: CheckpointRef,
    /// Human-readable status message
    pub message: String,
}

/// Input for the rollback tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RollbackInput {
    /// Checkpoint from set_savepoint. Omit to roll back to the current checkpoint
    #[serde(default)]
    pub checkpoint: Option<CheckpointRef>,
}

/// Output from the rollback tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RollbackOutput {
    /// Whether the rollback succeeded on every backend
    pub success: bool,
    /// The checkpoint rolled back to
    pub checkpoint: CheckpointRef,
    /// Human-readable status message
    pub message: String,
}

/// Input for the release_savepoint tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReleaseSavepointInput {
    /// Checkpoint from set_savepoint
    pub checkpoint: CheckpointRef,
}

/// Output from the release_savepoint tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ReleaseSavepointOutput {
    /// Whether every backend released the savepoint
    pub success: bool,
    /// The released checkpoint
    pub checkpoint: CheckpointRef,
    /// Human-readable status message
    pub message: String,
}

/// Handler for transaction management tools.
pub struct TransactionToolHandler {
    session: SharedSession,
}

impl TransactionToolHandler {
    /// Create a new transaction tool handler.
    pub fn new(session: SharedSession) -> Self {
        Self { session }
    }

    /// Handle the commit tool call.
    pub async fn commit(&self) -> RouterResult<CommitOutput> {
        let mut session = self.session.lock().await;
        session.commit().await?;
        let backends = session.registry().len();

        Ok(CommitOutput {
            success: true,
            backends,
            message: format!("Committed on {} backends", backends),
        })
    }

    /// Handle the set_savepoint tool call.
    pub async fn set_savepoint(&self, input: SetSavepointInput) -> RouterResult<SetSavepointOutput> {
        let mut session = self.session.lock().await;
        let checkpoint = session.set_savepoint(input.name.as_deref()).await?;

        info!(
            checkpoint_id = checkpoint.id,
            name = %checkpoint.name,
            "Checkpoint created"
        );

        Ok(SetSavepointOutput {
            message: format!(
                "Savepoint '{}' set on every backend. It is now the current checkpoint.",
                checkpoint.name
            ),
            checkpoint,
        })
    }

    /// Handle the rollback tool call.
    pub async fn rollback(&self, input: RollbackInput) -> RouterResult<RollbackOutput> {
        let mut session = self.session.lock().await;
        let checkpoint = match input.checkpoint {
            Some(checkpoint) => {
                session.rollback_to(&checkpoint).await?;
                checkpoint
            }
            None => {
                let checkpoint = session
                    .current_checkpoint()
                    .ok_or(RouterError::NoCurrentCheckpoint)?;
                session.rollback().await?;
                checkpoint
            }
        };

        info!(checkpoint_id = checkpoint.id, name = %checkpoint.name, "Rolled back");

        Ok(RollbackOutput {
            success: true,
            message: format!("Rolled back to savepoint '{}'", checkpoint.name),
            checkpoint,
        })
    }

    /// Handle the release_savepoint tool call.
    pub async fn release_savepoint(
        &self,
        input: ReleaseSavepointInput,
    ) -> RouterResult<ReleaseSavepointOutput> {
        let mut session = self.session.lock().await;
        session.release_savepoint(&input.checkpoint).await?;

        Ok(ReleaseSavepointOutput {
            success: true,
            message: format!("Savepoint '{}' released", input.checkpoint.name),
            checkpoint: input.checkpoint,
        })
    }
}
