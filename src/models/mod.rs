//! Data models for the DB router.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod property;
pub mod query;

// Re-export commonly used types
pub use connection::{BackendConfig, BackendConfigError, BackendInfo, DatabaseType};
pub use property::{PropertyKind, PropertyValue, TypeMap, ValueKind, timeout_from_millis};
pub use query::{ColumnMetadata, ExecuteOptions, ExecuteOutcome, RoutedOutcome, Warning};
