//! Error types for the DB router.
//!
//! Two layers, both built with `thiserror`:
//! - [`DbError`]: a failure reported by a single native backend connection.
//! - [`RouterError`]: a failure of the routing core. Multi-backend sweeps
//!   carry every per-backend failure as a [`BackendFailure`] record instead of
//!   stopping at the first one.

use crate::models::PropertyKind;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Timeout: {operation} exceeded {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("Unsupported by this backend: {operation}")]
    Unsupported { operation: String },

    #[error("Invalid connection state: {message}")]
    InvalidState { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms,
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for native backend operations.
pub type DbResult<T> = Result<T, DbError>;

/// One backend's contribution to a multi-backend failure.
#[derive(Debug, Clone)]
pub struct BackendFailure {
    pub backend: String,
    pub error: DbError,
    pub at: DateTime<Utc>,
}

impl BackendFailure {
    pub fn new(backend: impl Into<String>, error: DbError) -> Self {
        Self {
            backend: backend.into(),
            error,
            at: Utc::now(),
        }
    }
}

impl std::fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.backend,
            self.at.format("%d.%m.%Y %H:%M:%S"),
            self.error
        )
    }
}

/// Outcome of the restore sweep after a coordinated property write failed.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// Every backend already changed was put back to its prior value.
    Recovered,
    /// Some restores failed; the property's cross-backend value is unknown.
    Inconsistent { restore_failures: Vec<BackendFailure> },
}

impl std::fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recovered => write!(f, "prior values restored on all backends"),
            Self::Inconsistent { restore_failures } => write!(
                f,
                "restore failed, property is inconsistent: {}",
                describe_failures(restore_failures)
            ),
        }
    }
}

fn describe_failures(failures: &[BackendFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("No backend matches query and no default backend is set: {query}")]
    NoMatch { query: String },

    #[error("Query matches more than one backend ({}): {query}", .backends.join(", "))]
    AmbiguousMatch {
        query: String,
        /// Every matching backend, in registry order.
        backends: Vec<String>,
    },

    #[error("Unknown backend: {name}")]
    UnknownBackend { name: String },

    #[error("Backend name '{name}' is used more than once")]
    DuplicateBackend { name: String },

    #[error("Cannot set {property} on backend {backend}: {source}; {outcome}")]
    PartialApply {
        property: PropertyKind,
        backend: String,
        source: DbError,
        outcome: ApplyOutcome,
    },

    #[error(
        "Cannot set savepoint '{checkpoint}' on backend {backend}: {source}{}",
        release_note(.release_failures)
    )]
    PartialSavepoint {
        checkpoint: String,
        backend: String,
        source: DbError,
        release_failures: Vec<BackendFailure>,
    },

    #[error("Rollback to savepoint '{checkpoint}' failed on backend {backend}: {source}")]
    CheckpointRollback {
        checkpoint: String,
        backend: String,
        source: DbError,
    },

    #[error(
        "Cannot release savepoint '{checkpoint}': {}",
        describe_failures(.failures)
    )]
    CheckpointRelease {
        checkpoint: String,
        failures: Vec<BackendFailure>,
    },

    #[error("Savepoint '{name}' (id {id}) is not active")]
    InvalidCheckpoint { id: u64, name: String },

    #[error("No available savepoint to roll back to")]
    NoCurrentCheckpoint,

    #[error("Commit failed on backend {backend}: {source}")]
    Commit { backend: String, source: DbError },

    #[error("Failed to close backends: {}", describe_failures(.failures))]
    AggregatedClose { failures: Vec<BackendFailure> },

    #[error(
        "Session close did not complete, backends still open: {}",
        .backends.join(", ")
    )]
    CloseDegraded { backends: Vec<String> },

    #[error("Property {property} has not been set")]
    PropertyNotSet { property: PropertyKind },

    #[error("Routed session has already been closed")]
    SessionClosed,

    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    #[error("{operation} failed: {}", describe_failures(.failures))]
    Aggregated {
        operation: String,
        failures: Vec<BackendFailure>,
    },

    #[error("Backend {backend}: {source}")]
    Backend { backend: String, source: DbError },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

fn release_note(failures: &[BackendFailure]) -> String {
    if failures.is_empty() {
        String::new()
    } else {
        format!(
            "; releasing partial savepoints also failed: {}",
            describe_failures(failures)
        )
    }
}

impl RouterError {
    pub fn unknown_backend(name: impl Into<String>) -> Self {
        Self::UnknownBackend { name: name.into() }
    }

    pub fn backend(backend: impl Into<String>, source: DbError) -> Self {
        Self::Backend {
            backend: backend.into(),
            source,
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Every backend named by this error, in the order they are reported.
    pub fn backends(&self) -> Vec<&str> {
        match self {
            Self::AmbiguousMatch { backends, .. } | Self::CloseDegraded { backends } => {
                backends.iter().map(String::as_str).collect()
            }
            Self::PartialApply {
                backend, outcome, ..
            } => {
                let mut names = vec![backend.as_str()];
                if let ApplyOutcome::Inconsistent { restore_failures } = outcome {
                    names.extend(restore_failures.iter().map(|f| f.backend.as_str()));
                }
                names
            }
            Self::PartialSavepoint {
                backend,
                release_failures,
                ..
            } => {
                let mut names = vec![backend.as_str()];
                names.extend(release_failures.iter().map(|f| f.backend.as_str()));
                names
            }
            Self::CheckpointRollback { backend, .. }
            | Self::Commit { backend, .. }
            | Self::Backend { backend, .. } => vec![backend.as_str()],
            Self::CheckpointRelease { failures, .. }
            | Self::AggregatedClose { failures }
            | Self::Aggregated { failures, .. } => {
                failures.iter().map(|f| f.backend.as_str()).collect()
            }
            Self::UnknownBackend { name } | Self::DuplicateBackend { name } => vec![name.as_str()],
            _ => Vec::new(),
        }
    }

    /// True when the session can no longer vouch for cross-backend consistency.
    pub fn is_inconsistent(&self) -> bool {
        match self {
            Self::PartialApply { outcome, .. } => {
                matches!(outcome, ApplyOutcome::Inconsistent { .. })
            }
            Self::PartialSavepoint {
                release_failures, ..
            } => !release_failures.is_empty(),
            Self::CheckpointRollback { .. } | Self::Commit { .. } | Self::CloseDegraded { .. } => {
                true
            }
            _ => false,
        }
    }
}

/// Result type alias for routing-core operations.
pub type RouterResult<T> = Result<T, RouterError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Build the `data` payload for an error, listing the backends involved.
fn error_data(err: &RouterError, suggestion: Option<&str>) -> Option<serde_json::Value> {
    let backends = err.backends();
    if backends.is_empty() {
        return suggestion_data(suggestion);
    }
    let mut data = serde_json::json!({
        "backends": backends,
        "inconsistent": err.is_inconsistent(),
    });
    if let Some(s) = suggestion {
        data["suggestion"] = serde_json::Value::String(s.to_string());
    }
    Some(data)
}

/// Convert RouterError to MCP ErrorData for semantic error categorization.
impl From<RouterError> for rmcp::ErrorData {
    fn from(err: RouterError) -> Self {
        match &err {
            RouterError::NoMatch { .. } => rmcp::ErrorData::invalid_params(
                err.to_string(),
                error_data(
                    &err,
                    Some("Add a pattern that matches this query or set a default backend"),
                ),
            ),
            RouterError::AmbiguousMatch { .. } => rmcp::ErrorData::invalid_params(
                err.to_string(),
                error_data(&err, Some("Make the backend patterns disjoint")),
            ),
            RouterError::Unsupported { .. } | RouterError::PropertyNotSet { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), None)
            }

            RouterError::UnknownBackend { .. }
            | RouterError::InvalidCheckpoint { .. }
            | RouterError::NoCurrentCheckpoint => {
                rmcp::ErrorData::resource_not_found(err.to_string(), error_data(&err, None))
            }

            RouterError::Backend { source, .. } => {
                let msg = match source {
                    DbError::Database {
                        message,
                        sql_state: Some(code),
                        ..
                    } => format!("{} (SQLSTATE: {})", message, code),
                    _ => err.to_string(),
                };
                rmcp::ErrorData::invalid_params(msg, error_data(&err, source.suggestion()))
            }

            _ => rmcp::ErrorData::internal_error(err.to_string(), error_data(&err, None)),
        }
    }
}
