//! Query execution data models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Options a native connection honours for one statement.
///
/// `None` leaves the backend default in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub max_rows: Option<u64>,
    pub query_timeout: Option<Duration>,
    /// Longest text or binary value returned, in bytes; longer values are cut.
    pub max_field_size: Option<usize>,
    pub escape_processing: Option<bool>,
    /// Return binary columns as base64 strings instead of a byte count.
    pub decode_binary: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ColumnMetadata {
    pub name: String,
    /// Database-specific type (e.g., "int8", "varchar", "TEXT")
    pub type_name: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// What a native connection returns after running a statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteOutcome {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub rows_affected: u64,
    /// True when rows were dropped to honour `max_rows`.
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl ExecuteOutcome {
    /// Create a result for statements that return no rows.
    pub fn write_result(rows_affected: u64, execution_time_ms: u64) -> Self {
        Self {
            rows_affected,
            execution_time_ms,
            ..Default::default()
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// An execution outcome tagged with the backend that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RoutedOutcome {
    pub backend: String,
    #[serde(flatten)]
    pub outcome: ExecuteOutcome,
}

/// A warning reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Warning {
    /// Filled in by the session; native connections leave it empty.
    #[serde(default)]
    pub backend: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            backend: String::new(),
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}
