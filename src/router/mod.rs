//! The routing core.
//!
//! - `registry` / `backend`: the fixed set of named backends
//! - `dispatcher`: maps a query to exactly one backend
//! - `properties`: keeps session properties consistent across backends
//! - `checkpoint`: savepoints spanning every backend
//! - `session`: the unified facade tying it together
//! - `loader`: opens the configured backends

pub mod backend;
pub mod checkpoint;
pub mod dispatcher;
pub mod loader;
pub mod properties;
pub mod registry;
pub mod session;
pub mod statement;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::Backend;
pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointRef, CheckpointState};
pub use loader::{Connector, SqlxConnector, load_registry, open_session};
pub use properties::{PropertyCoordinator, PropertyStore};
pub use registry::Registry;
pub use session::{RoutedSession, SessionState};
pub use statement::{StatementOptions, StatementProperty};
