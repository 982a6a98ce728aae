//! Backend registry tools.

use crate::error::RouterResult;
use crate::models::{BackendInfo, Warning};
use crate::tools::SharedSession;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Output for the list_backends tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListBackendsOutput {
    /// Backends in routing order
    pub backends: Vec<BackendInfo>,
    /// Number of backends
    pub count: usize,
}

/// Input for the set_default_backend tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SetDefaultBackendInput {
    /// Backend name from list_backends. Omit to clear the default
    #[serde(default)]
    pub backend: Option<String>,
}

/// Output from the set_default_backend tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SetDefaultBackendOutput {
    /// The new default, if any
    pub default: Option<String>,
    pub message: String,
}

/// Input for the warnings tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct WarningsInput {
    /// Clear the warnings on every backend after reading them
    #[serde(default)]
    pub clear: bool,
}

/// Output from the warnings tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WarningsOutput {
    pub warnings: Vec<Warning>,
    pub cleared: bool,
}

pub struct BackendToolHandler {
    session: SharedSession,
}

impl BackendToolHandler {
    pub fn new(session: SharedSession) -> Self {
        Self { session }
    }

    pub async fn list_backends(&self) -> ListBackendsOutput {
        let backends = self.session.lock().await.backends();
        let count = backends.len();
        ListBackendsOutput { backends, count }
    }

    pub async fn set_default_backend(
        &self,
        input: SetDefaultBackendInput,
    ) -> RouterResult<SetDefaultBackendOutput> {
        let mut session = self.session.lock().await;
        let message = match &input.backend {
            Some(name) => {
                session.set_default_backend(name)?;
                format!("Unmatched queries now run on '{}'", name)
            }
            None => {
                session.unset_default_backend()?;
                "Default backend cleared; unmatched queries are rejected".to_string()
            }
        };

        info!(default = ?input.backend, "Default backend changed");
        Ok(SetDefaultBackendOutput {
            default: input.backend,
            message,
        })
    }

    pub async fn warnings(&self, input: WarningsInput) -> RouterResult<WarningsOutput> {
        let mut session = self.session.lock().await;
        let warnings = session.warnings().await?;
        if input.clear {
            session.clear_warnings().await?;
        }
        Ok(WarningsOutput {
            warnings,
            cleared: input.clear,
        })
    }
}
