//! A named backend: dispatch pattern plus the native connection it owns.

use crate::db::NativeConnection;
use crate::error::{RouterError, RouterResult};
use crate::models::BackendInfo;
use regex::Regex;

pub struct Backend {
    name: String,
    pattern: Regex,
    connection: Box<dyn NativeConnection>,
}

impl Backend {
    pub fn new(
        name: impl Into<String>,
        pattern: Regex,
        connection: Box<dyn NativeConnection>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern,
            connection,
        }
    }

    /// Compile `pattern` and build the backend.
    pub fn with_pattern(
        name: impl Into<String>,
        pattern: &str,
        connection: Box<dyn NativeConnection>,
    ) -> RouterResult<Self> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|e| {
            RouterError::config(format!("Backend '{}' has an invalid pattern: {}", name, e))
        })?;
        Ok(Self::new(name, pattern, connection))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// True if the pattern occurs anywhere in `query`.
    pub fn matches(&self, query: &str) -> bool {
        self.pattern.is_match(query)
    }

    pub fn connection(&mut self) -> &mut dyn NativeConnection {
        self.connection.as_mut()
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    pub fn info(&self, is_default: bool) -> BackendInfo {
        BackendInfo {
            name: self.name.clone(),
            pattern: self.pattern.as_str().to_string(),
            is_default,
            closed: self.is_closed(),
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field("closed", &self.is_closed())
            .finish()
    }
}
