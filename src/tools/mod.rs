//! MCP tool implementations.
//!
//! Every handler works on the one routed session shared by the server:
//! - `execute`: `route` and `execute`
//! - `property`: `set_property` and `get_property`
//! - `transaction`: `commit`, `set_savepoint`, `rollback`, `release_savepoint`
//! - `backend`: `list_backends`, `set_default_backend`, `warnings`

pub mod backend;
pub mod execute;
pub mod property;
pub mod transaction;

use crate::router::RoutedSession;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The routed session shared by every tool call.
pub type SharedSession = Arc<Mutex<RoutedSession>>;

pub use backend::{
    BackendToolHandler, ListBackendsOutput, SetDefaultBackendInput, SetDefaultBackendOutput,
    WarningsInput, WarningsOutput,
};
pub use execute::{ExecuteInput, ExecuteToolHandler, RouteInput, RouteOutput};
pub use property::{
    GetPropertyInput, GetPropertyOutput, PropertyToolHandler, SetPropertyInput, SetPropertyOutput,
};
pub use transaction::{
    CommitOutput, ReleaseSavepointInput, ReleaseSavepointOutput, RollbackInput, RollbackOutput,
    SetSavepointInput, SetSavepointOutput, TransactionToolHandler,
};
