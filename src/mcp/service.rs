//! MCP service implementation using rmcp.
//!
//! This module defines the RouterService struct with all routing tools
//! exposed via the MCP protocol using the rmcp framework's macros.
//! Every tool works on the single routed session the server was started with.

use crate::error::RouterError;
use crate::models::RoutedOutcome;
use crate::router::RoutedSession;
use crate::tools::backend::{
    BackendToolHandler, ListBackendsOutput, SetDefaultBackendInput, SetDefaultBackendOutput,
    WarningsInput, WarningsOutput,
};
use crate::tools::execute::{ExecuteInput, ExecuteToolHandler, RouteInput, RouteOutput};
use crate::tools::property::{
    GetPropertyInput, GetPropertyOutput, PropertyToolHandler, SetPropertyInput, SetPropertyOutput,
};
use crate::tools::transaction::{
    CommitOutput, ReleaseSavepointInput, ReleaseSavepointOutput, RollbackInput, RollbackOutput,
    SetSavepointInput, SetSavepointOutput, TransactionToolHandler,
};
use crate::tools::SharedSession;
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct RouterService {
    /// The routed session shared by every tool call
    session: SharedSession,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl RouterService {
    /// Create a service over an already shared session.
    pub fn new(session: SharedSession) -> Self {
        Self {
            session,
            tool_router: Self::tool_router(),
        }
    }

    /// Wrap a freshly opened session.
    pub fn from_session(session: RoutedSession) -> Self {
        Self::new(Arc::new(Mutex::new(session)))
    }

    pub fn session(&self) -> SharedSession {
        self.session.clone()
    }
}

#[tool_router]
impl RouterService {
    #[tool(
        description = "List the routed backends in routing order.\nReturns each backend's name, routing pattern, whether it is the default, and whether it is closed."
    )]
    async fn list_backends(&self) -> Json<ListBackendsOutput> {
        let handler = BackendToolHandler::new(self.session.clone());
        Json(handler.list_backends().await)
    }

    #[tool(
        description = "Show which backend a query would be routed to, without running it.\nFails if no pattern matches and there is no default, or if several patterns match."
    )]
    async fn route(
        &self,
        Parameters(input): Parameters<RouteInput>,
    ) -> Result<Json<RouteOutput>, McpError> {
        let handler = ExecuteToolHandler::new(self.session.clone());
        handler
            .route(input)
            .await
            .map(Json)
            .map_err(|e: RouterError| e.into())
    }

    #[tool(
        description = "Execute a SQL statement on the backend whose pattern matches it.\nPass `backend` to bypass routing. Returns rows for queries and rows_affected for writes.\nStatement options: max_rows, query_timeout (seconds), max_field_size (bytes), escape_processing, decode_binary."
    )]
    async fn execute(
        &self,
        Parameters(input): Parameters<ExecuteInput>,
    ) -> Result<Json<RoutedOutcome>, McpError> {
        let handler = ExecuteToolHandler::new(self.session.clone());
        handler
            .execute(input)
            .await
            .map(Json)
            .map_err(|e: RouterError| e.into())
    }

    #[tool(
        description = "Set a session property on every backend: auto_commit, read_only, schema, catalog, network_timeout (ms) or type_map.\nIf a backend rejects it, backends already changed are restored to their previous value."
    )]
    async fn set_property(
        &self,
        Parameters(input): Parameters<SetPropertyInput>,
    ) -> Result<Json<SetPropertyOutput>, McpError> {
        let handler = PropertyToolHandler::new(self.session.clone());
        handler
            .set_property(input)
            .await
            .map(Json)
            .map_err(|e: RouterError| e.into())
    }

    #[tool(
        description = "Read the last value of a session property confirmed on every backend.\nFails for properties never set, except type_map which defaults to empty."
    )]
    async fn get_property(
        &self,
        Parameters(input): Parameters<GetPropertyInput>,
    ) -> Result<Json<GetPropertyOutput>, McpError> {
        let handler = PropertyToolHandler::new(self.session.clone());
        handler
            .get_property(input)
            .await
            .map(Json)
            .map_err(|e: RouterError| e.into())
    }

    #[tool(
        description = "Create a savepoint on every backend and make it the current checkpoint.\nRequires auto_commit = false. Returns the checkpoint reference for rollback/release_savepoint."
    )]
    async fn set_savepoint(
        &self,
        Parameters(input): Parameters<SetSavepointInput>,
    ) -> Result<Json<SetSavepointOutput>, McpError> {
        let handler = TransactionToolHandler::new(self.session.clone());
        handler
            .set_savepoint(input)
            .await
            .map(Json)
            .map_err(|e: RouterError| e.into())
    }

    #[tool(
        description = "Roll every backend back to a checkpoint (the current one if omitted).\nStops at the first backend that fails; later checkpoints are discarded."
    )]
    async fn rollback(
        &self,
        Parameters(input): Parameters<RollbackInput>,
    ) -> Result<Json<RollbackOutput>, McpError> {
        let handler = TransactionToolHandler::new(self.session.clone());
        handler
            .rollback(input)
            .await
            .map(Json)
            .map_err(|e: RouterError| e.into())
    }

    #[tool(description = "Release a checkpoint on every backend.\nAll backends are attempted even if one fails.")]
    async fn release_savepoint(
        &self,
        Parameters(input): Parameters<ReleaseSavepointInput>,
    ) -> Result<Json<ReleaseSavepointOutput>, McpError> {
        let handler = TransactionToolHandler::new(self.session.clone());
        handler
            .release_savepoint(input)
            .await
            .map(Json)
            .map_err(|e: RouterError| e.into())
    }

    #[tool(
        description = "Commit every backend in routing order.\nStops at the first failure; backends committed before it stay committed."
    )]
    async fn commit(&self) -> Result<Json<CommitOutput>, McpError> {
        let handler = TransactionToolHandler::new(self.session.clone());
        handler
            .commit()
            .await
            .map(Json)
            .map_err(|e: RouterError| e.into())
    }

    #[tool(
        description = "Set the backend that runs queries no pattern matches.\nOmit `backend` to clear it, after which unmatched queries are rejected."
    )]
    async fn set_default_backend(
        &self,
        Parameters(input): Parameters<SetDefaultBackendInput>,
    ) -> Result<Json<SetDefaultBackendOutput>, McpError> {
        let handler = BackendToolHandler::new(self.session.clone());
        handler
            .set_default_backend(input)
            .await
            .map(Json)
            .map_err(|e: RouterError| e.into())
    }

    #[tool(description = "Collect warnings from every backend, tagged with the backend name.\nSet `clear` to clear them afterwards.")]
    async fn warnings(
        &self,
        Parameters(input): Parameters<WarningsInput>,
    ) -> Result<Json<WarningsOutput>, McpError> {
        let handler = BackendToolHandler::new(self.session.clone());
        handler
            .warnings(input)
            .await
            .map(Json)
            .map_err(|e: RouterError| e.into())
    }
}

#[tool_handler]
impl ServerHandler for RouterService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "db-router".to_owned(),
                title: Some("DB Router".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "One SQL session routed across several databases.\n\
                \n\
                ## Workflow\n\
                1. Call `list_backends` to see the backends and their routing patterns\n\
                2. Use `route` to check where a query would go, `execute` to run it\n\
                3. Properties (`set_property`) and transactions (`commit`, `set_savepoint`,\n\
                   `rollback`, `release_savepoint`) apply to every backend at once\n\
                \n\
                ## Routing\n\
                - Each backend's pattern is matched against the whole query text\n\
                - Exactly one match: the query runs there\n\
                - No match: the default backend runs it, or the query is rejected\n\
                - Several matches: the query is rejected as ambiguous\n\
                \n\
                ## Transactions\n\
                - Savepoints require `auto_commit` = false (`set_property`)\n\
                - Commit is not atomic across backends: it stops at the first failure\n\
                - Errors carry `inconsistent: true` when backends may now disagree"
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::testing::{backend, registry};

    async fn create_test_service() -> RouterService {
        let registry = registry(
            vec![backend("orders", "orders"), backend("reports", "^SELECT")],
            Some("reports"),
        )
        .await;
        RouterService::from_session(RoutedSession::new(registry))
    }

    #[tokio::test]
    async fn test_router_service_creation() {
        let service = create_test_service().await;
        let session = service.session();
        assert_eq!(session.lock().await.backends().len(), 2);
    }

    #[tokio::test]
    async fn test_list_backends() {
        let service = create_test_service().await;
        let Json(output) = service.list_backends().await;
        assert_eq!(output.count, 2);
        assert!(output.backends[1].is_default);
    }

    #[tokio::test]
    async fn test_route_and_ambiguous_match() {
        let service = create_test_service().await;
        let Json(output) = service
            .route(Parameters(RouteInput {
                sql: "INSERT INTO orders VALUES (1)".to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(output.backend, "orders");

        let err = service
            .route(Parameters(RouteInput {
                sql: "SELECT * FROM orders".to_string(),
            }))
            .await
            .err()
            .expect("expected route to fail for ambiguous match");
        assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_server_info() {
        let service = create_test_service().await;
        let info = service.get_info();
        assert_eq!(info.server_info.name, "db-router");
        assert!(info.capabilities.tools.is_some());
    }
}
