//! Routing and execution tools.
//!
//! - `route`: report which backend a query would run on
//! - `execute`: route a statement and run it there

use crate::error::RouterResult;
use crate::models::RoutedOutcome;
use crate::router::{StatementOptions, StatementProperty};
use crate::tools::SharedSession;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Input for the route tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RouteInput {
    /// SQL text to match against the backend patterns
    pub sql: String,
}

/// Output from the route tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RouteOutput {
    /// Backend the query would run on
    pub backend: String,
}

/// Input for the execute tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteInput {
    /// SQL statement. Routed by pattern unless `backend` is given
    pub sql: String,
    /// Run on this backend instead of routing
    #[serde(default)]
    pub backend: Option<String>,
    /// Statement options, e.g. `{"option": "max_rows", "value": 100}`
    #[serde(default)]
    pub options: Vec<StatementProperty>,
}

impl ExecuteInput {
    fn statement_options(&self) -> StatementOptions {
        self.options
            .iter()
            .fold(StatementOptions::new(), |opts, p| opts.with(*p))
    }
}

pub struct ExecuteToolHandler {
    session: SharedSession,
}

impl ExecuteToolHandler {
    pub fn new(session: SharedSession) -> Self {
        Self { session }
    }

    pub async fn route(&self, input: RouteInput) -> RouterResult<RouteOutput> {
        let session = self.session.lock().await;
        let backend = session.backend_for(&input.sql)?.to_string();
        Ok(RouteOutput { backend })
    }

    pub async fn execute(&self, input: ExecuteInput) -> RouterResult<RoutedOutcome> {
        let options = input.statement_options();
        let mut session = self.session.lock().await;
        let outcome = match &input.backend {
            Some(backend) => session.execute_on(backend, &input.sql, &options).await?,
            None => session.execute_with(&input.sql, &options).await?,
        };

        info!(
            backend = %outcome.backend,
            rows = outcome.outcome.row_count(),
            rows_affected = outcome.outcome.rows_affected,
            execution_time_ms = outcome.outcome.execution_time_ms,
            "Statement executed"
        );
        Ok(outcome)
    }
}
