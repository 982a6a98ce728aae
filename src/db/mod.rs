//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The native connection capability the router talks to
//! - A dedicated sqlx connection per backend
//! - Row to JSON conversion honouring the session type map
//! - Database dispatch macros for reducing code duplication

pub mod connection;
#[macro_use]
pub mod macros;
pub mod native;
pub mod types;

pub use connection::{LiveConnection, SqlxConnection};
pub use native::{NativeConnection, SavepointHandle};
pub use types::{DecodeOptions, RowToJson};
