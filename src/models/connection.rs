//! Backend connection data models.
//!
//! This module defines the backend configuration read by the loader and the
//! summary reported back to callers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Parse database type from a `dbN_driver` value.
    pub fn from_driver(driver: &str) -> Option<Self> {
        match driver.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(Self::PostgreSQL),
            "mysql" | "mariadb" => Some(Self::MySQL),
            "sqlite" | "sqlite3" => Some(Self::SQLite),
            _ => None,
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Configuration for one routed backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    pub db_type: DatabaseType,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub url: String,
    /// Dispatch pattern, matched anywhere in the query text.
    pub pattern: String,
}

impl BackendConfig {
    /// Create a new backend configuration.
    ///
    /// When `driver` is given it must agree with the URL scheme.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        pattern: impl Into<String>,
        driver: Option<&str>,
    ) -> Result<Self, BackendConfigError> {
        let name = name.into();
        let url = url.into();
        let pattern = pattern.into();

        if name.trim().is_empty() {
            return Err(BackendConfigError::EmptyName);
        }

        let db_type = DatabaseType::from_connection_string(&url)
            .ok_or_else(|| BackendConfigError::UnknownDatabaseType(mask_url(&url)))?;

        if let Some(driver) = driver {
            let declared = DatabaseType::from_driver(driver)
                .ok_or_else(|| BackendConfigError::UnknownDriver(driver.to_string()))?;
            if declared != db_type {
                return Err(BackendConfigError::DriverMismatch {
                    name,
                    driver: declared,
                    url: db_type,
                });
            }
        }

        regex::Regex::new(&pattern).map_err(|e| BackendConfigError::InvalidPattern {
            name: name.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            name,
            db_type,
            url,
            pattern,
        })
    }

    /// Get a display-safe version of the URL (credentials masked).
    pub fn masked_url(&self) -> String {
        mask_url(&self.url)
    }
}

fn mask_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let prefix = &url[..colon_pos + 1];
            let suffix = &url[at_pos..];
            return format!("{}****{}", prefix, suffix);
        }
    }
    url.to_string()
}

/// Errors that can occur when creating a backend configuration.
#[derive(Debug, thiserror::Error)]
pub enum BackendConfigError {
    #[error("Backend name cannot be empty")]
    EmptyName,

    #[error("Unknown database type in URL: {0}")]
    UnknownDatabaseType(String),

    #[error("Unknown driver: {0}")]
    UnknownDriver(String),

    #[error("Backend '{name}' declares driver {driver} but its URL is for {url}")]
    DriverMismatch {
        name: String,
        driver: DatabaseType,
        url: DatabaseType,
    },

    #[error("Backend '{name}' has an invalid pattern: {message}")]
    InvalidPattern { name: String, message: String },
}

impl From<BackendConfigError> for crate::error::RouterError {
    fn from(err: BackendConfigError) -> Self {
        crate::error::RouterError::config(err.to_string())
    }
}

/// Summary of a registered backend.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackendInfo {
    pub name: String,
    pub pattern: String,
    pub is_default: bool,
    pub closed: bool,
}
