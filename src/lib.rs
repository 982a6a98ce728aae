//! DB Router Library
//!
//! Routes SQL statements across several databases (SQLite, PostgreSQL,
//! MySQL) behind one logical session, and serves that session to AI
//! assistants as MCP (Model Context Protocol) tools.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod router;
pub mod tools;
pub mod transport;

pub use config::{Config, ProxyConfig};
pub use error::{DbError, RouterError};
pub use mcp::RouterService;
pub use router::RoutedSession;
