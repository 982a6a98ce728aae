//! Per-statement options replayed onto each routed execution.
//!
//! Options are recorded once and re-applied every time a statement is routed,
//! whichever backend ends up running it.

use crate::models::ExecuteOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "option", content = "value", rename_all = "snake_case")]
pub enum StatementProperty {
    /// 0 means no limit.
    MaxRows(u64),
    /// Seconds; 0 means no limit.
    QueryTimeout(u64),
    /// Bytes; 0 means no limit.
    MaxFieldSize(usize),
    EscapeProcessing(bool),
    DecodeBinary(bool),
}

impl StatementProperty {
    fn same_option(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    fn apply_to(&self, options: &mut ExecuteOptions) {
        match *self {
            Self::MaxRows(n) => options.max_rows = (n > 0).then_some(n),
            Self::QueryTimeout(secs) => {
                options.query_timeout = (secs > 0).then(|| Duration::from_secs(secs))
            }
            Self::MaxFieldSize(n) => options.max_field_size = (n > 0).then_some(n),
            Self::EscapeProcessing(on) => options.escape_processing = Some(on),
            Self::DecodeBinary(on) => options.decode_binary = on,
        }
    }
}

/// The options set on one logical statement, at most one per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StatementOptions {
    properties: Vec<StatementProperty>,
}

impl StatementOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an option, replacing an earlier value of the same kind.
    pub fn set(&mut self, property: StatementProperty) {
        match self.properties.iter_mut().find(|p| p.same_option(&property)) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }

    pub fn with(mut self, property: StatementProperty) -> Self {
        self.set(property);
        self
    }

    pub fn max_rows(&self) -> Option<u64> {
        self.properties.iter().find_map(|p| match p {
            StatementProperty::MaxRows(n) => Some(*n),
            _ => None,
        })
    }

    pub fn query_timeout(&self) -> Option<u64> {
        self.properties.iter().find_map(|p| match p {
            StatementProperty::QueryTimeout(secs) => Some(*secs),
            _ => None,
        })
    }

    pub fn max_field_size(&self) -> Option<usize> {
        self.properties.iter().find_map(|p| match p {
            StatementProperty::MaxFieldSize(n) => Some(*n),
            _ => None,
        })
    }

    pub fn escape_processing(&self) -> Option<bool> {
        self.properties.iter().find_map(|p| match p {
            StatementProperty::EscapeProcessing(on) => Some(*on),
            _ => None,
        })
    }

    /// Replay every recorded option onto a fresh set of execute options.
    pub fn apply_to(&self, options: &mut ExecuteOptions) {
        for property in &self.properties {
            property.apply_to(options);
        }
    }

    pub fn to_execute_options(&self) -> ExecuteOptions {
        let mut options = ExecuteOptions::default();
        self.apply_to(&mut options);
        options
    }
}
